pub use orbiter_core::*;

use thiserror::Error;

use crate::migrations::MigrationError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid database type '{0}'")]
    InvalidType(String),

    #[error("given database name is a valid address, give only the name: {0}")]
    NameIsAddress(String),

    #[error("database '{0}' already exists")]
    AlreadyExists(String),

    #[error("database '{address}' is type '{actual}' but was opened as '{requested}'")]
    TypeMismatch {
        address: String,
        actual: String,
        requested: String,
    },

    #[error("'create' is not set, cannot open '{0}' by name")]
    CreateNotSet(String),

    #[error("database type not provided, give one of: {0}")]
    TypeMissing(String),

    #[error("database '{0}' does not exist locally")]
    NotFoundLocally(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    ObjectStore(#[from] ObjectStoreError),

    #[error(transparent)]
    PubSub(#[from] PubSubError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Keystore(#[from] KeystoreError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
