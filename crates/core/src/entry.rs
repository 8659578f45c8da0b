use serde::{Deserialize, Serialize};

/// One record of a store's internal log. The tips of the log (entries no
/// other entry points at through `next`) are the heads exchanged between
/// replicas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub hash: String,

    pub payload: serde_json::Value,

    /// Lamport clock at append time. Ties are broken by hash.
    pub clock: u64,

    /// Id of the identity that signed the entry.
    pub identity: String,

    #[serde(default)]
    pub next: Vec<String>,
}

impl Entry {
    /// Total order used when materializing a log: clock first, hash as the
    /// tie breaker.
    pub fn sort_key(&self) -> (u64, &str) {
        (self.clock, &self.hash)
    }
}
