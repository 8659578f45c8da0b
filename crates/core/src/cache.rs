use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store is closed")]
    Closed,

    #[error("internal error: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CacheError {
    pub fn internal<T>(value: T) -> Self
    where
        T: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        CacheError::Internal(value.into())
    }
}

/// Local key-value store scoped to a directory. A `None` value means "not
/// present".
#[trait_variant::make(Send)]
pub trait CacheStore: Clone + Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    async fn open(&self) -> Result<(), CacheError>;

    async fn close(&self) -> Result<(), CacheError>;
}

/// Adapter that materializes cache stores on demand, one per directory.
#[trait_variant::make(Send)]
pub trait LocalStorage: Clone + Send + Sync + 'static {
    type Cache: CacheStore;

    async fn create_store(&self, path: &Path) -> Result<Self::Cache, CacheError>;
}
