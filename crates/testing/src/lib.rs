//! In-memory collaborators for exercising the controller without a real
//! object store or overlay: a content-addressed store fake, a pubsub hub
//! with direct channels, toy stores for every built-in type, and toy
//! identity plumbing.

use orbiter_core::Platform;
use orbiter_redb::{RedbCache, RedbStorage};

pub mod access;
pub mod identity;
pub mod object_store;
pub mod pubsub;
pub mod stores;

pub use access::*;
pub use identity::*;
pub use object_store::*;
pub use pubsub::*;
pub use stores::*;

/// Platform wiring all the toy collaborators together. Caches persist
/// through redb so restart scenarios behave like a real deployment.
pub struct ToyPlatform;

impl Platform for ToyPlatform {
    type ObjectStore = MemoryObjectStore;
    type PubSub = MemoryPubSub;
    type Storage = RedbStorage;
    type Keystore = ToyKeystore;
    type IdentityProvider = ToyIdentityProvider;
    type AccessFactory = ToyAccessFactory;
}

/// Toy store type as it comes out of a [`ToyPlatform`] controller.
pub type ToyPlatformStore = ToyStore<RedbCache, MemoryObjectStore>;
