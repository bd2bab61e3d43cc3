//! Live killboard intel daemon.
//!
//! Watches the zkillboard RedisQ feed, classifies each kill against the
//! currently scanned wormhole chain, and posts relevant kills to a Discord
//! webhook. Two independent tasks run for the process lifetime:
//!
//! - the kill stream ([`feed::KillStream`]), which long-polls the feed and
//!   classifies one kill at a time, and
//! - the chain refresh loop ([`chain::run_refresh_loop`]), which periodically
//!   rebuilds the chain snapshot from the mapper API.
//!
//! The only shared state is the published snapshot in
//! [`chainwatch_core::ChainStore`].

pub mod chain;
pub mod config;
pub mod error;
pub mod feed;
pub mod notify;
pub mod resolve;

pub use error::{Error, Result};
