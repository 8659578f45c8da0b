//! Ordered, idempotent on-disk schema upgrades, applied before a store is
//! opened.

use std::path::Path;

use orbiter_core::Address;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration '{name}' failed: {source}")]
    Failed {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Filesystem context a migration inspects.
pub struct MigrationEnv<'a> {
    pub directory: &'a Path,
}

type Migration = fn(&MigrationEnv, &Address) -> std::io::Result<()>;

/// Migrations in application order. Each must be safe to run when
/// nothing needs doing.
const MIGRATIONS: &[(&str, Migration)] = &[("flat-cache-layout", flat_cache_layout)];

/// Apply every migration in order. A failure fails the whole
/// `create`/`open` call.
pub fn run(env: &MigrationEnv, address: &Address) -> Result<(), MigrationError> {
    for (name, migration) in MIGRATIONS {
        migration(env, address).map_err(|source| MigrationError::Failed { name, source })?;
    }

    Ok(())
}

/// Pre-schema layouts kept per-database data directly under
/// `<directory>/<path>`; the current layout nests it under the manifest
/// root. Moves the old directory into place when the new one does not
/// exist yet.
fn flat_cache_layout(env: &MigrationEnv, address: &Address) -> std::io::Result<()> {
    let legacy = env.directory.join(address.path());
    let current = env.directory.join(address.root()).join(address.path());

    if !legacy.is_dir() || current.exists() {
        return Ok(());
    }

    info!(
        from = %legacy.display(),
        to = %current.display(),
        "migrating database data to rooted layout"
    );

    if let Some(parent) = current.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::rename(&legacy, &current)?;

    Ok(())
}
