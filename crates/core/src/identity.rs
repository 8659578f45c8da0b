use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("keystore is closed")]
    Closed,

    #[error("internal error: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl KeystoreError {
    pub fn internal<T>(value: T) -> Self
    where
        T: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        KeystoreError::Internal(value.into())
    }
}

/// An identity as consumed by the controller: a stable id plus the public
/// key material the provider derived for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,

    #[serde(rename = "publicKey")]
    pub pub_key: String,
}

/// Opaque handle over the key storage backing identities. Created under
/// `<directory>/<peerId>/keystore` by the controller.
#[trait_variant::make(Send)]
pub trait Keystore: Clone + Send + Sync + 'static {
    fn create(path: &Path) -> Result<Self, KeystoreError>
    where
        Self: Sized;

    async fn close(&self) -> Result<(), KeystoreError>;
}

/// Factory for identities bound to a keystore.
#[trait_variant::make(Send)]
pub trait IdentityProvider<K: Keystore>: Send + Sync + 'static {
    async fn create_identity(&self, id: &str, keystore: &K) -> Result<Identity, KeystoreError>;
}
