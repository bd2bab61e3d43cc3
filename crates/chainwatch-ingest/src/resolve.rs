//! ESI name resolution with in-memory caches.
//!
//! Ship types, corporations, and characters are resolved against ESI and
//! cached per category with moka. A lookup failure degrades to a
//! placeholder name and is not cached, so a later kill retries the lookup.
//! Solar system details come from a static universe map loaded once from
//! disk; ESI is never consulted for them.

use std::collections::HashMap;
use std::hash::Hash;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chainwatch_core::SystemId;
use moka::future::Cache;
use serde::Deserialize;

use crate::error::Result;

/// Placeholder names used when resolution fails or the id is absent.
pub const UNKNOWN_SHIP: &str = "Unknown Ship";
pub const UNKNOWN_CORP: &str = "Unknown Corp";
pub const UNKNOWN_PILOT: &str = "Unknown Pilot";
pub const UNKNOWN_SYSTEM: &str = "Unknown System";

/// Default ESI base URL.
pub const ESI_BASE_URL: &str = "https://esi.evetech.net/latest";

/// Entries kept per name cache. Names are stable, so there is no TTL.
const NAME_CACHE_CAPACITY: u64 = 10_000;

/// Static details for one solar system.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemInfo {
    pub name: String,

    /// Security status; J-space and unknown systems default to 0.0.
    #[serde(default)]
    pub security: f64,

    #[serde(default)]
    pub region: Option<String>,
}

/// Universe map: system id to static details.
pub type SystemMap = HashMap<SystemId, SystemInfo>;

/// Load the universe map from a JSON file (object keyed by system id).
pub fn load_system_map(path: &Path) -> Result<SystemMap> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Name resolver backed by ESI, with per-category caches.
pub struct EsiResolver {
    client: reqwest::Client,
    base_url: String,
    ships: Cache<u32, String>,
    corps: Cache<u64, String>,
    pilots: Cache<u64, String>,
    systems: Arc<SystemMap>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

impl EsiResolver {
    /// Create a resolver with the default ESI base URL.
    pub fn new(systems: Arc<SystemMap>) -> Result<Self> {
        Self::with_base_url(systems, ESI_BASE_URL.to_string())
    }

    /// Create a resolver against a specific ESI base URL.
    pub fn with_base_url(systems: Arc<SystemMap>, base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            ships: Cache::builder().max_capacity(NAME_CACHE_CAPACITY).build(),
            corps: Cache::builder().max_capacity(NAME_CACHE_CAPACITY).build(),
            pilots: Cache::builder().max_capacity(NAME_CACHE_CAPACITY).build(),
            systems,
        })
    }

    /// Ship type name, or a placeholder.
    pub async fn ship_name(&self, type_id: Option<u32>) -> String {
        let Some(id) = type_id else {
            return UNKNOWN_SHIP.to_string();
        };
        let url = format!("{}/universe/types/{}/", self.base_url, id);
        self.cached_name(&self.ships, id, url, UNKNOWN_SHIP).await
    }

    /// Corporation name, or a placeholder.
    pub async fn corporation_name(&self, corp_id: Option<u64>) -> String {
        let Some(id) = corp_id else {
            return UNKNOWN_CORP.to_string();
        };
        let url = format!("{}/corporations/{}/", self.base_url, id);
        self.cached_name(&self.corps, id, url, UNKNOWN_CORP).await
    }

    /// Character name, or a placeholder.
    pub async fn character_name(&self, character_id: Option<u64>) -> String {
        let Some(id) = character_id else {
            return UNKNOWN_PILOT.to_string();
        };
        let url = format!("{}/characters/{}/", self.base_url, id);
        self.cached_name(&self.pilots, id, url, UNKNOWN_PILOT).await
    }

    /// Static details for a system, if the universe map knows it.
    pub fn system_details(&self, system: SystemId) -> Option<&SystemInfo> {
        self.systems.get(&system)
    }

    /// System name, or a placeholder.
    pub fn system_name(&self, system: SystemId) -> String {
        self.system_details(system)
            .map(|info| info.name.clone())
            .unwrap_or_else(|| UNKNOWN_SYSTEM.to_string())
    }

    /// Check the cache, then fetch. Failures return the fallback without
    /// poisoning the cache.
    async fn cached_name<K>(
        &self,
        cache: &Cache<K, String>,
        key: K,
        url: String,
        fallback: &str,
    ) -> String
    where
        K: Hash + Eq + Copy + Send + Sync + 'static,
    {
        if let Some(name) = cache.get(&key).await {
            return name;
        }

        match self.fetch_name(&url).await {
            Ok(name) => {
                cache.insert(key, name.clone()).await;
                name
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "name lookup failed");
                fallback.to_string()
            }
        }
    }

    async fn fetch_name(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send().await?;
        let named: Named = resp.error_for_status()?.json().await?;
        Ok(named.name)
    }
}
