//! Traits and machinery that are common to all orbiter crates.
//!
//! Glossary:
//!  - `address`: the immutable `/orbitdb/<root>/<path>` triple that
//!    identifies a database.
//!  - `root`: the content hash of a database manifest; the identity of the
//!    database.
//!  - `heads`: the current tips of a store's internal log, exchanged
//!    between replicas.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub mod access;
pub mod address;
pub mod cache;
pub mod entry;
pub mod identity;
pub mod object_store;
pub mod pubsub;
pub mod registry;
pub mod store;

pub use access::*;
pub use address::*;
pub use cache::*;
pub use entry::*;
pub use identity::*;
pub use object_store::*;
pub use pubsub::*;
pub use registry::*;
pub use store::*;

/// Stable string id of a peer, as reported by the object-store client.
pub type PeerId = String;

/// Content hash of an object in the content-addressed store.
pub type ObjectHash = String;

/// Raw payload carried by log entries and manifests.
pub type Object = serde_json::Value;

/// Immutable descriptor of a database, written once to the
/// content-addressed store. Its content hash is the `root` of every
/// address that refers to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,

    #[serde(rename = "type")]
    pub db_type: String,

    #[serde(rename = "accessController")]
    pub access_controller: String,

    /// Store-type-specific defaults frozen at creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Type-level bundle of the external collaborators a controller is wired
/// to. Concrete deployments (and the in-memory test rig) define one
/// implementation and plug their clients in as associated types.
pub trait Platform: Send + Sync + Sized + 'static {
    type ObjectStore: ObjectStore;
    type PubSub: PubSub;
    type Storage: LocalStorage + Default;
    type Keystore: Keystore;
    type IdentityProvider: IdentityProvider<Self::Keystore> + Default;
    type AccessFactory: AccessControllerFactory<Self>;
}

/// Cache store type produced by a platform's local storage adapter.
pub type CacheOf<P> = <<P as Platform>::Storage as LocalStorage>::Cache;

/// Resolved access controller, type-erased so stores of any kind can
/// consult it.
pub type SharedAccessController = Arc<dyn AccessController>;
