//! Periodic chain topology refresh.
//!
//! Fetches the mapper's topology document, builds a fresh snapshot, and
//! publishes it to the shared [`ChainStore`]. Any failure leaves the
//! previously published snapshot in force; the kill stream never sees an
//! empty graph just because one refresh failed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chainwatch_core::{ChainSnapshot, ChainStore, TopologyDocument};
use reqwest::StatusCode;

use crate::error::{Error, Result};
use crate::feed::SHORT_BACKOFF;
use crate::resolve::SystemMap;

/// Client for the mapper topology endpoint.
pub struct ChainClient {
    url: String,
    client: reqwest::Client,
    /// Universe map for logging system names on a successful sync.
    systems: Arc<SystemMap>,
}

impl ChainClient {
    /// Create a client for the given topology endpoint.
    pub fn new(url: String, systems: Arc<SystemMap>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            url,
            client,
            systems,
        })
    }

    /// Fetch the raw topology document.
    pub async fn fetch_topology(&self) -> Result<TopologyDocument> {
        let resp = self.client.get(&self.url).send().await?;
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited("mapper"));
        }
        Ok(resp.error_for_status()?.json().await?)
    }

    /// Fetch, build, and publish a new snapshot.
    ///
    /// Returns the number of scanned systems on success. On any error the
    /// store is left untouched.
    pub async fn refresh(&self, store: &ChainStore) -> Result<usize> {
        let doc = self.fetch_topology().await?;
        let snapshot = ChainSnapshot::from_topology(&doc)?;

        let system_count = snapshot.system_count();
        let connection_count = snapshot.connection_count();

        let names: Vec<&str> = snapshot
            .systems()
            .filter_map(|id| self.systems.get(&id).map(|info| info.name.as_str()))
            .collect();

        store.publish(snapshot);

        metrics::gauge!("chain_systems").set(system_count as f64);
        metrics::gauge!("chain_connections").set(connection_count as f64);
        tracing::info!(
            systems = system_count,
            connections = connection_count,
            names = ?names,
            "chain snapshot published"
        );

        Ok(system_count)
    }
}

/// Run the refresh loop until the running flag is cleared.
///
/// The first refresh is expected to have been awaited by the caller before
/// the kill stream starts; this loop only handles the steady state. A
/// rate-limited fetch retries once after the short backoff within the same
/// tick; any other failure waits for the next tick.
pub async fn run_refresh_loop(
    client: ChainClient,
    store: Arc<ChainStore>,
    period: Duration,
    running: Arc<AtomicBool>,
) {
    tracing::info!(period = ?period, "chain refresh loop started");

    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(period).await;
        if !running.load(Ordering::SeqCst) {
            break;
        }

        metrics::counter!("chain_refresh_total").increment(1);
        match client.refresh(&store).await {
            Ok(_) => {}
            Err(e) if e.is_rate_limited() => {
                tracing::warn!("mapper rate limited, retrying shortly");
                tokio::time::sleep(SHORT_BACKOFF).await;
                if let Err(e) = client.refresh(&store).await {
                    metrics::counter!("chain_refresh_failures_total").increment(1);
                    tracing::warn!(error = %e, "chain refresh retry failed, keeping previous snapshot");
                }
            }
            Err(e) => {
                metrics::counter!("chain_refresh_failures_total").increment(1);
                tracing::warn!(error = %e, "chain refresh failed, keeping previous snapshot");
            }
        }
    }

    tracing::info!("chain refresh loop stopped");
}
