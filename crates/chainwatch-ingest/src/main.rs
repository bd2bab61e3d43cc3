//! chainwatch live intel daemon.
//!
//! Watches the zkillboard RedisQ feed and posts kills that happen in, or one
//! wormhole jump away from, the currently scanned chain to a Discord webhook.
//! The chain is rebuilt from the mapper API on a fixed period; a failed
//! refresh keeps the last good snapshot.
//!
//! # Usage
//!
//! ```bash
//! CHAINWATCH_MAP_URL=https://mapper.example/api/chain \
//! INTEL_WEBHOOK_URL=https://discord.com/api/webhooks/... \
//! chainwatch-ingest
//! ```
//!
//! See [`chainwatch_ingest::config::Config::from_env`] for all variables.
//!
//! # Graceful Shutdown
//!
//! SIGINT (Ctrl+C) clears the shared running flag; the feed loop exits after
//! its in-flight poll completes and the refresh loop follows.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use chainwatch_core::ChainStore;
use chainwatch_core::metrics::{init_metrics, start_metrics_server};
use chainwatch_ingest::chain::{ChainClient, run_refresh_loop};
use chainwatch_ingest::config::Config;
use chainwatch_ingest::feed::{FeedConfig, KillStream};
use chainwatch_ingest::notify::{DiscordNotifier, NotifyConfig};
use chainwatch_ingest::resolve::{EsiResolver, SystemMap, load_system_map};
use metrics::gauge;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap())
                .add_directive("chainwatch_ingest=debug".parse().unwrap()),
        )
        .init();

    tracing::info!("chainwatch intel daemon starting...");

    let config = Config::from_env()?;

    if config.metrics_port > 0 {
        let metrics_handle = init_metrics();
        start_metrics_server(config.metrics_port, metrics_handle).await?;
        gauge!("watcher_running").set(1.0);
    }

    // Universe map is optional; without it system names degrade to
    // placeholders but classification is unaffected.
    let systems = Arc::new(match &config.systems_path {
        Some(path) => match load_system_map(path) {
            Ok(map) => {
                tracing::info!(systems = map.len(), "universe map loaded");
                map
            }
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "failed to load universe map, continuing without it");
                SystemMap::new()
            }
        },
        None => SystemMap::new(),
    });

    let store = Arc::new(ChainStore::new());
    let chain_client =
        ChainClient::new(config.map_url.clone(), Arc::clone(&systems)).context("mapper client")?;

    // First refresh happens before the stream starts. A failure here just
    // means the chain stays empty until the first successful refresh.
    if let Err(e) = chain_client.refresh(&store).await {
        tracing::warn!(error = %e, "initial chain refresh failed, starting with an empty chain");
    }

    let resolver = EsiResolver::new(Arc::clone(&systems)).context("ESI resolver")?;
    let notifier = DiscordNotifier::new(
        NotifyConfig {
            intel_webhook: config.intel_webhook.clone(),
            big_kill_webhook: config.big_kill_webhook.clone(),
            big_kill_threshold: config.big_kill_threshold,
        },
        resolver,
    )
    .context("Discord notifier")?;

    // Set up graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received, stopping gracefully...");
        running_clone.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let refresh_handle = tokio::spawn(run_refresh_loop(
        chain_client,
        Arc::clone(&store),
        config.refresh_period,
        Arc::clone(&running),
    ));

    let stream = KillStream::new(
        FeedConfig {
            endpoint: config.feed_url.clone(),
            queue_id: config.queue_id.clone(),
            poll_timeout: config.poll_timeout,
            ..FeedConfig::default()
        },
        Arc::clone(&running),
    )
    .context("kill stream")?;

    let stats = stream.run(&store, &notifier).await;

    // The refresh loop is likely mid-sleep; abort it rather than wait out
    // the period. Publishing a snapshot is not an await point, so the abort
    // cannot tear a swap.
    refresh_handle.abort();

    if config.metrics_port > 0 {
        gauge!("watcher_running").set(0.0);
    }

    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("SHUTDOWN COMPLETE");
    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("Polls issued:        {}", stats.polls);
    tracing::info!("Kills seen:          {}", stats.kills_seen);
    tracing::info!("Kills relevant:      {}", stats.kills_relevant);
    tracing::info!("Kills discarded:     {}", stats.kills_discarded);
    tracing::info!("Backoffs taken:      {}", stats.backoffs);

    Ok(())
}
