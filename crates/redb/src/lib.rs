//! Default local storage adapter backed by redb.
//!
//! One redb database file per cache directory; the controller keeps one
//! cache per directory, so repeated opens with the same directory reuse
//! the same storage.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use redb::{ReadableDatabase, ReadableTable, TableDefinition};
use tracing::warn;

use orbiter_core::{CacheError, CacheStore, LocalStorage};

const CACHE: TableDefinition<&str, &str> = TableDefinition::new("cache");

const STORE_FILE: &str = "store.redb";

const DEFAULT_CACHE_SIZE_MB: usize = 32;

fn internal(error: impl Into<redb::Error>) -> CacheError {
    CacheError::internal(error.into())
}

/// Key-value cache over a single redb database.
#[derive(Clone)]
pub struct RedbCache {
    db: Arc<redb::Database>,
    closed: Arc<AtomicBool>,
}

impl RedbCache {
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let db = redb::Database::builder()
            .set_repair_callback(|x| {
                warn!(progress = x.progress() * 100f64, "cache db is repairing")
            })
            .set_cache_size(1024 * 1024 * DEFAULT_CACHE_SIZE_MB)
            .create(path)
            .map_err(internal)?;

        Self::from_db(db)
    }

    pub fn memory() -> Result<Self, CacheError> {
        let db = redb::Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(internal)?;

        Self::from_db(db)
    }

    fn from_db(db: redb::Database) -> Result<Self, CacheError> {
        // make sure the table exists so readers never race its creation
        let wx = db.begin_write().map_err(internal)?;
        let _ = wx.open_table(CACHE).map_err(internal)?;
        wx.commit().map_err(internal)?;

        Ok(Self {
            db: Arc::new(db),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    fn ensure_open(&self) -> Result<(), CacheError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::Closed);
        }

        Ok(())
    }
}

impl CacheStore for RedbCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.ensure_open()?;

        let rx = self.db.begin_read().map_err(internal)?;

        let table = rx.open_table(CACHE).map_err(internal)?;

        let value = table
            .get(key)
            .map_err(internal)?
            .map(|guard| guard.value().to_string());

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.ensure_open()?;

        let wx = self.db.begin_write().map_err(internal)?;

        {
            let mut table = wx.open_table(CACHE).map_err(internal)?;
            table.insert(key, value).map_err(internal)?;
        }

        wx.commit().map_err(internal)?;

        Ok(())
    }

    async fn open(&self) -> Result<(), CacheError> {
        self.ensure_open()
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Storage adapter that materializes one [`RedbCache`] per directory.
#[derive(Clone, Default)]
pub struct RedbStorage {
    ephemeral: bool,
}

impl RedbStorage {
    pub fn new() -> Self {
        Self { ephemeral: false }
    }

    /// Adapter whose caches live in memory and vanish on drop.
    pub fn memory() -> Self {
        Self { ephemeral: true }
    }
}

impl LocalStorage for RedbStorage {
    type Cache = RedbCache;

    async fn create_store(&self, path: &Path) -> Result<Self::Cache, CacheError> {
        if self.ephemeral {
            return RedbCache::memory();
        }

        std::fs::create_dir_all(path).map_err(CacheError::internal)?;

        RedbCache::open_file(path.join(STORE_FILE))
    }
}
