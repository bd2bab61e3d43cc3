//! Prometheus metrics helpers for the chainwatch daemon.
//!
//! This module provides centralized metrics initialization and the metric
//! descriptions shared across chainwatch components.
//!
//! # Metric Naming Conventions
//!
//! - Prefix: component name (`feed_`, `chain_`, `notify_`)
//! - Suffix: unit or type (`_total`, `_seconds`)
//! - Labels: used sparingly to keep cardinality low

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Initialize the Prometheus metrics recorder.
///
/// This must be called once at startup before any metrics are recorded.
/// Returns a handle that can be used with [`start_metrics_server`].
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_common_metrics();

    handle
}

/// Try to initialize the Prometheus metrics recorder.
///
/// Like [`init_metrics`] but returns `None` if the recorder is already
/// installed, instead of panicking. Useful for tests.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    PrometheusBuilder::new().install_recorder().ok()
}

/// Start the Prometheus metrics HTTP server.
///
/// Serves the `/metrics` endpoint on the specified port. This spawns a
/// background task and returns immediately.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "metrics server exited");
        }
    });

    Ok(())
}

/// Register descriptions for the metrics used across chainwatch.
///
/// Called automatically by [`init_metrics`].
fn register_common_metrics() {
    // =========================================================================
    // Kill Feed Metrics
    // =========================================================================

    describe_counter!("feed_polls_total", "Total long-poll requests to RedisQ");
    describe_counter!("feed_kills_total", "Kill packages received from the feed");
    describe_counter!(
        "feed_kills_relevant_total",
        "Kills classified as in or adjacent to the chain"
    );
    describe_counter!(
        "feed_kills_discarded_total",
        "Kills outside chain range and discarded"
    );
    describe_counter!(
        "feed_backoffs_total",
        "Backoff delays taken by the feed loop (label: kind)"
    );

    // =========================================================================
    // Chain Refresh Metrics
    // =========================================================================

    describe_counter!("chain_refresh_total", "Chain topology refresh attempts");
    describe_counter!(
        "chain_refresh_failures_total",
        "Chain refreshes that kept the previous snapshot"
    );
    describe_gauge!("chain_systems", "Scanned systems in the current snapshot");
    describe_gauge!(
        "chain_connections",
        "Wormhole connections in the current snapshot"
    );

    // =========================================================================
    // Notification Metrics
    // =========================================================================

    describe_counter!("notify_posts_total", "Intel embeds posted to Discord");
    describe_counter!(
        "notify_rate_limited_total",
        "Kills skipped because Discord rate limited the webhook"
    );

    describe_gauge!("watcher_running", "Whether the daemon is running (1=yes, 0=no)");
}
