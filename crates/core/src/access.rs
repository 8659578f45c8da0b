use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Identity, ObjectStoreError, Platform};

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("unknown access controller type '{0}'")]
    UnknownType(String),

    #[error("access controller descriptor {0} not found")]
    NotFound(String),

    #[error(transparent)]
    ObjectStore(#[from] ObjectStoreError),

    #[error("internal error: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Policy object determining which identities may write to a store.
pub trait AccessController: Send + Sync {
    /// Identity ids allowed to append. The wildcard `*` grants everyone.
    fn write(&self) -> &[String];

    fn can_append(&self, identity_id: &str) -> bool {
        self.write().iter().any(|id| id == "*" || id == identity_id)
    }
}

/// Caller-supplied access controller parameters. Unset fields are
/// defaulted by the controller: `name` to the database name, `type` to
/// `ipfs`, `write` to the controller identity's id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ac_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<Vec<String>>,

    /// Accepted for forward compatibility; the controller does not consult
    /// read lists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<Vec<String>>,
}

/// Collaborator handles the factory needs to persist and load
/// descriptors. Deliberately not the controller itself.
pub struct AccessEnv<P: Platform> {
    pub object_store: P::ObjectStore,
    pub identity: Identity,
}

impl<P: Platform> Clone for AccessEnv<P> {
    fn clone(&self) -> Self {
        Self {
            object_store: self.object_store.clone(),
            identity: self.identity.clone(),
        }
    }
}

/// External factory for access controllers.
#[trait_variant::make(Send)]
pub trait AccessControllerFactory<P: Platform>: Clone + Send + Sync + 'static {
    /// Persist a new descriptor and return its object-store path
    /// (`/ipfs/<hash>`).
    async fn create(
        &self,
        env: &AccessEnv<P>,
        ac_type: &str,
        spec: &AccessSpec,
    ) -> Result<String, AccessError>;

    /// Load an existing descriptor.
    async fn resolve(
        &self,
        env: &AccessEnv<P>,
        path: &str,
        spec: &AccessSpec,
    ) -> Result<Arc<dyn AccessController>, AccessError>;
}
