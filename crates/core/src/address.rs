use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Literal tag every database address starts with.
pub const ADDRESS_PREFIX: &str = "orbitdb";

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("not a valid orbitdb address: {0}")]
    Malformed(String),
}

/// Immutable triple identifying a database: prefix, manifest root hash and
/// the human name given at creation. Equality is string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    root: String,
    path: String,
}

impl Address {
    pub fn new(root: impl Into<String>, path: impl Into<String>) -> Result<Self, AddressError> {
        let root = root.into();
        let path = path.into();

        if root.is_empty() || path.is_empty() {
            return Err(AddressError::Malformed(format!(
                "/{ADDRESS_PREFIX}/{root}/{path}"
            )));
        }

        Ok(Self { root, path })
    }

    /// Parse a `/orbitdb/<root>/<path>` string. Rejects inputs whose first
    /// segment is not the prefix, whose segment count is not three, or
    /// whose root is empty.
    pub fn parse(value: &str) -> Result<Self, AddressError> {
        let trimmed = value.trim_start_matches('/').trim_end_matches('/');

        let mut segments = trimmed.split('/');

        let prefix = segments.next();
        let root = segments.next();
        let path = segments.next();

        if segments.next().is_some() {
            return Err(AddressError::Malformed(value.to_string()));
        }

        match (prefix, root, path) {
            (Some(ADDRESS_PREFIX), Some(root), Some(path)) if !root.is_empty() && !path.is_empty() => {
                Ok(Self {
                    root: root.to_string(),
                    path: path.to_string(),
                })
            }
            _ => Err(AddressError::Malformed(value.to_string())),
        }
    }

    /// Boolean form of [`Address::parse`].
    pub fn is_valid(value: &str) -> bool {
        Self::parse(value).is_ok()
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{ADDRESS_PREFIX}/{}/{}", self.root, self.path)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
