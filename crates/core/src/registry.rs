use std::sync::Arc;

use thiserror::Error;

use crate::{Platform, SharedStore, StoreContext, StoreError};

/// Canonical type tags of the built-in store kinds. Aliases (`log`,
/// `kvstore`, `docs`) exist only as convenience operations on the
/// controller.
pub mod tags {
    pub const COUNTER: &str = "counter";
    pub const EVENTLOG: &str = "eventlog";
    pub const FEED: &str = "feed";
    pub const DOCSTORE: &str = "docstore";
    pub const KEYVALUE: &str = "keyvalue";
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("database type '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// Constructor capability for one store type.
pub type StoreConstructor<P> =
    Arc<dyn Fn(StoreContext<P>) -> Result<SharedStore, StoreError> + Send + Sync>;

/// Mapping from type tag to store constructor. The registry is a field of
/// the controller's options; extend it with [`TypeRegistry::register`]
/// before the controller is instantiated.
pub struct TypeRegistry<P: Platform> {
    entries: Vec<(String, StoreConstructor<P>)>,
}

impl<P: Platform> TypeRegistry<P> {
    pub fn new() -> Self {
        Self { entries: vec![] }
    }

    /// Register a constructor under a tag. Fails if the tag is already
    /// present.
    pub fn register(
        &mut self,
        tag: impl Into<String>,
        ctor: StoreConstructor<P>,
    ) -> Result<(), RegistryError> {
        let tag = tag.into();

        if self.contains(&tag) {
            return Err(RegistryError::AlreadyRegistered(tag));
        }

        self.entries.push((tag, ctor));

        Ok(())
    }

    pub fn resolve(&self, tag: &str) -> Option<&StoreConstructor<P>> {
        self.entries
            .iter()
            .find(|(known, _)| known == tag)
            .map(|(_, ctor)| ctor)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.entries.iter().any(|(known, _)| known == tag)
    }

    /// Registered tags in registration order.
    pub fn tags(&self) -> Vec<&str> {
        self.entries.iter().map(|(tag, _)| tag.as_str()).collect()
    }
}

impl<P: Platform> Default for TypeRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Platform> Clone for TypeRegistry<P> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}
