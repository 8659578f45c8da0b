use thiserror::Error;

use crate::{Object, ObjectHash, PeerId};

/// Default codec for controller-written objects.
pub const DAG_CBOR: &str = "dag-cbor";

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object {0} not found")]
    NotFound(ObjectHash),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("internal error: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ObjectStoreError {
    pub fn internal<T>(value: T) -> Self
    where
        T: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        ObjectStoreError::Internal(value.into())
    }
}

#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Compute the content hash without persisting the object.
    pub only_hash: bool,
}

/// Client for the content-addressed object store. Reading a hash that was
/// never written does not resolve until the object appears; callers that
/// cannot wait must check the local cache index first.
#[trait_variant::make(Send)]
pub trait ObjectStore: Clone + Send + Sync + 'static {
    async fn read(&self, hash: &str) -> Result<Object, ObjectStoreError>;

    async fn write(
        &self,
        codec: &str,
        value: &Object,
        options: &WriteOptions,
    ) -> Result<ObjectHash, ObjectStoreError>;

    async fn id(&self) -> Result<PeerId, ObjectStoreError>;
}
