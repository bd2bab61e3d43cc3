//! Core types and logic for the chainwatch intel daemon.
//!
//! This crate provides:
//! - Chain topology snapshots built from the mapper API (signatures + wormholes)
//! - Relevance queries against the current chain graph ("in chain, or one hop out")
//! - An atomically-swapped snapshot store shared between the refresh task and
//!   the kill stream
//! - Wire types for the RedisQ kill feed and ESI killmail documents
//! - Prometheus metrics helpers

mod chain;
mod error;
mod killmail;
pub mod metrics;
mod store;

pub use chain::{
    ChainMetadata, ChainSnapshot, MIN_SYSTEM_ID, SignatureRecord, SystemId, TopologyDocument,
    UNKNOWN_SCOUT, WormholeRecord,
};
pub use error::{Error, Result};
pub use killmail::{FeedResponse, IntelKill, KillPackage, Killmail, Victim, ZkbMeta};
pub use store::ChainStore;
