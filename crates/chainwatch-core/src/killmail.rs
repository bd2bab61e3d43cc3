//! Wire types for the RedisQ kill feed and ESI killmail documents.
//!
//! RedisQ wraps each kill in a `package` object carrying the zkillboard
//! metadata (`zkb`) and, depending on feed version, the full killmail. When
//! the killmail is absent it is fetched separately via `zkb.href`.

use serde::Deserialize;

use crate::chain::{ChainMetadata, SystemId};

/// Top-level RedisQ response. `package` is null when the queue is empty.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedResponse {
    #[serde(default)]
    pub package: Option<KillPackage>,
}

/// One kill package from the feed.
#[derive(Debug, Clone, Deserialize)]
pub struct KillPackage {
    /// Kill id as assigned by zkillboard.
    #[serde(rename = "killID")]
    pub kill_id: u64,

    /// zkillboard metadata for the kill.
    pub zkb: ZkbMeta,

    /// Full killmail, when the feed embeds it.
    #[serde(default)]
    pub killmail: Option<Killmail>,
}

/// zkillboard metadata attached to a kill package.
#[derive(Debug, Clone, Deserialize)]
pub struct ZkbMeta {
    /// ESI link to the full killmail document.
    pub href: String,

    /// Estimated total ISK value of the loss.
    #[serde(rename = "totalValue", default)]
    pub total_value: f64,
}

/// Full killmail document as served by ESI.
#[derive(Debug, Clone, Deserialize)]
pub struct Killmail {
    pub killmail_id: u64,
    pub solar_system_id: SystemId,
    pub victim: Victim,
}

/// Victim references on a killmail. Structures and NPC losses can omit
/// any of these.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Victim {
    #[serde(default)]
    pub character_id: Option<u64>,
    #[serde(default)]
    pub corporation_id: Option<u64>,
    #[serde(default)]
    pub ship_type_id: Option<u32>,
}

/// A killmail classified as relevant, enriched with chain attribution.
///
/// This is what the ingestion loop hands to the notification sink; the
/// sink's delivery troubles are not the loop's concern.
#[derive(Debug, Clone)]
pub struct IntelKill {
    pub killmail: Killmail,
    pub zkb: ZkbMeta,
    pub chain: ChainMetadata,
}
