//! Local cache acquisition and the manifest index.
//!
//! The controller holds one default cache plus one per caller-supplied
//! directory; the index entry `<address>/_manifest → <root>` is the
//! predicate "we have this database locally".

use std::path::Path;

use orbiter_core::{Address, CacheError, CacheOf, CacheStore, LocalStorage, Platform};
use tracing::debug;

use crate::controller::Shared;

/// Cache key under which an address records its manifest root.
pub fn manifest_cache_key(address: &Address) -> String {
    format!("{address}/_manifest")
}

impl<P: Platform> Shared<P> {
    /// Acquire the cache for a directory, creating it on first use.
    /// `None` resolves to the controller's default cache directory.
    pub(crate) async fn load_cache(
        &self,
        directory: Option<&Path>,
    ) -> Result<CacheOf<P>, CacheError> {
        let dir = directory
            .map(|d| d.to_path_buf())
            .unwrap_or_else(|| self.default_cache_dir.clone());

        let mut caches = self.caches.lock().await;

        if let Some(cache) = caches.get(&dir) {
            return Ok(cache.clone());
        }

        debug!(directory = %dir.display(), "creating cache store");

        let cache = self.storage.create_store(&dir).await?;
        cache.open().await?;

        caches.insert(dir, cache.clone());

        Ok(cache)
    }

    /// Whether the cache index records this database as locally known.
    pub(crate) async fn have_local_data(
        cache: &CacheOf<P>,
        address: &Address,
    ) -> Result<bool, CacheError> {
        let value = cache.get(&manifest_cache_key(address)).await?;

        Ok(value.is_some())
    }

    /// Record the index entry for an address. Idempotent.
    pub(crate) async fn add_manifest_to_cache(
        cache: &CacheOf<P>,
        address: &Address,
    ) -> Result<(), CacheError> {
        cache
            .set(&manifest_cache_key(address), address.root())
            .await
    }
}
