//! Coordinator for a peer-to-peer, eventually-consistent database
//! platform built atop a content-addressed object store and a
//! publish/subscribe overlay.
//!
//! The entry point is [`OrbitDb`]: it resolves names into immutable
//! manifest-backed addresses, instantiates the right store implementation
//! for a manifest's declared type, binds live stores to the pubsub
//! overlay, and keeps local cache state consistent across restarts.

pub mod caches;
pub mod controller;
pub mod exchange;
pub mod lifecycle;
pub mod manifests;
pub mod migrations;
pub mod prelude;

pub use controller::{OpenOptions, OrbitDb, OrbitDbOptions};
pub use prelude::Error;

// the batteries-included local storage adapter
pub use orbiter_redb::{RedbCache, RedbStorage};
