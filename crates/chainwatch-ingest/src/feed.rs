//! RedisQ kill stream.
//!
//! Long-polls the zkillboard RedisQ endpoint and classifies each kill
//! against the current chain snapshot. The loop is an explicit state
//! machine:
//!
//! ```text
//! Polling -> Processing -> (Idle | Backoff) -> Polling
//! ```
//!
//! - A package in the response moves to `Processing`: fetch the full
//!   killmail if the feed didn't embed it, classify, and hand relevant
//!   kills to the sink.
//! - An empty response moves to `Idle` and straight back to `Polling`; the
//!   feed's own long-poll wait is the pacing, no extra delay is added.
//! - Any request error moves to `Backoff`: a 429 waits the short delay,
//!   anything else the long one. The loop never terminates on an error.
//!
//! Processing is strictly sequential: one kill is fully classified and
//! dispatched (or discarded) before the next poll. Shutdown is an external
//! flip of the shared running flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chainwatch_core::{ChainStore, IntelKill, KillPackage, Killmail};
use reqwest::StatusCode;

use crate::error::{Error, Result};

/// Backoff after an upstream 429.
pub const SHORT_BACKOFF: Duration = Duration::from_secs(2);

/// Backoff after any other transport or server error.
pub const LONG_BACKOFF: Duration = Duration::from_secs(5);

/// Pick the backoff delay for a failed request.
///
/// Rate limiting gets a quick retry; anything else waits out transient
/// transport trouble.
pub fn backoff_for(err: &Error) -> Duration {
    if err.is_rate_limited() {
        SHORT_BACKOFF
    } else {
        LONG_BACKOFF
    }
}

/// Configuration for the kill stream.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// RedisQ listen endpoint (without the queue id).
    pub endpoint: String,

    /// Queue id identifying this consumer to RedisQ.
    pub queue_id: String,

    /// Client-side timeout for the long-poll and detail requests.
    pub poll_timeout: Duration,

    /// Log a liveness line every this many discarded kills.
    pub liveness_interval: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://zkillredisq.stream/listen.php".to_string(),
            queue_id: "chainwatch".to_string(),
            poll_timeout: Duration::from_secs(15),
            liveness_interval: 500,
        }
    }
}

/// Sink consuming classified, enriched kills.
///
/// Delivery failures (including downstream rate limiting) are the sink's
/// concern; the stream logs them and keeps polling. Tests inject a
/// recording sink.
#[allow(async_fn_in_trait)]
pub trait IntelSink {
    /// Deliver one relevant kill.
    async fn deliver(&self, kill: &IntelKill) -> Result<()>;
}

/// Counters from a stream run.
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    /// Long-poll requests issued.
    pub polls: u64,

    /// Kill packages received.
    pub kills_seen: u64,

    /// Kills delivered to the sink.
    pub kills_relevant: u64,

    /// Kills outside chain range.
    pub kills_discarded: u64,

    /// Backoff delays taken.
    pub backoffs: u64,
}

/// States of the polling loop.
///
/// `Processing` has no variant of its own: a poll that yields a package is
/// processed inside [`KillStream::step`] before the next state is returned,
/// so the machine only ever parks in one of these three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Polling,
    Idle,
    Backoff(Duration),
}

/// Live kill stream.
pub struct KillStream {
    config: FeedConfig,
    client: reqwest::Client,
    running: Arc<AtomicBool>,
}

impl KillStream {
    /// Create a new stream.
    ///
    /// The running flag is shared with the caller: flipping it to `false`
    /// stops the loop after the in-flight poll completes.
    pub fn new(config: FeedConfig, running: Arc<AtomicBool>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.poll_timeout)
            .build()?;

        Ok(Self {
            config,
            client,
            running,
        })
    }

    fn listen_url(&self) -> String {
        format!("{}?queueID={}", self.config.endpoint, self.config.queue_id)
    }

    /// One long-poll against RedisQ. `None` means the queue was empty.
    async fn poll(&self) -> Result<Option<KillPackage>> {
        let resp = self.client.get(self.listen_url()).send().await?;
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited("feed"));
        }
        let feed: chainwatch_core::FeedResponse = resp.error_for_status()?.json().await?;
        Ok(feed.package)
    }

    /// Full killmail for a package, fetching via `zkb.href` when the feed
    /// didn't embed it.
    async fn fetch_killmail(&self, package: &KillPackage) -> Result<Killmail> {
        if let Some(killmail) = &package.killmail {
            return Ok(killmail.clone());
        }

        let resp = self.client.get(&package.zkb.href).send().await?;
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited("esi"));
        }
        Ok(resp.error_for_status()?.json().await?)
    }

    /// Run the stream until the running flag is cleared.
    pub async fn run<S: IntelSink>(&self, store: &ChainStore, sink: &S) -> StreamStats {
        tracing::info!(
            endpoint = %self.config.endpoint,
            queue_id = %self.config.queue_id,
            "starting kill stream"
        );

        let mut stats = StreamStats::default();
        let mut state = LoopState::Polling;

        while self.running.load(Ordering::SeqCst) {
            state = match state {
                LoopState::Polling => self.step(store, sink, &mut stats).await,
                // The feed's long-poll wait is the pacing; poll again
                // immediately.
                LoopState::Idle => LoopState::Polling,
                LoopState::Backoff(delay) => {
                    stats.backoffs += 1;
                    tokio::time::sleep(delay).await;
                    LoopState::Polling
                }
            };
        }

        tracing::info!(
            polls = stats.polls,
            kills_seen = stats.kills_seen,
            kills_relevant = stats.kills_relevant,
            kills_discarded = stats.kills_discarded,
            "kill stream stopped"
        );

        stats
    }

    /// One `Polling -> Processing` step, returning the next state.
    async fn step<S: IntelSink>(
        &self,
        store: &ChainStore,
        sink: &S,
        stats: &mut StreamStats,
    ) -> LoopState {
        stats.polls += 1;
        metrics::counter!("feed_polls_total").increment(1);

        let package = match self.poll().await {
            Ok(Some(package)) => package,
            Ok(None) => return LoopState::Idle,
            Err(e) => return self.backoff("poll", &e),
        };

        stats.kills_seen += 1;
        metrics::counter!("feed_kills_total").increment(1);

        let killmail = match self.fetch_killmail(&package).await {
            Ok(killmail) => killmail,
            Err(e) => return self.backoff("detail", &e),
        };

        classify(store, sink, package, killmail, self.config.liveness_interval, stats).await;
        LoopState::Polling
    }

    fn backoff(&self, stage: &'static str, err: &Error) -> LoopState {
        let delay = backoff_for(err);
        if err.is_rate_limited() {
            tracing::warn!(stage, delay = ?delay, "rate limited, backing off");
            metrics::counter!("feed_backoffs_total", "kind" => "rate_limit").increment(1);
        } else {
            tracing::warn!(stage, error = %err, delay = ?delay, "request failed, backing off");
            metrics::counter!("feed_backoffs_total", "kind" => "transport").increment(1);
        }
        LoopState::Backoff(delay)
    }
}

/// Classify one kill against the current snapshot and dispatch it.
///
/// The snapshot is read once and used for both the relevance check and the
/// attribution lookup, so a refresh landing mid-classification cannot mix
/// two graphs.
async fn classify<S: IntelSink>(
    store: &ChainStore,
    sink: &S,
    package: KillPackage,
    killmail: Killmail,
    liveness_interval: u64,
    stats: &mut StreamStats,
) {
    let snapshot = store.current();
    let system = killmail.solar_system_id;

    if !snapshot.is_relevant(system) {
        stats.kills_discarded += 1;
        metrics::counter!("feed_kills_discarded_total").increment(1);
        if liveness_interval > 0 && stats.kills_discarded % liveness_interval == 0 {
            tracing::info!(
                scanned = stats.kills_discarded,
                chain_systems = snapshot.system_count(),
                "stream alive, nothing in chain range"
            );
        }
        return;
    }

    let chain = snapshot.metadata(system);
    let kill = IntelKill {
        killmail,
        zkb: package.zkb,
        chain,
    };

    stats.kills_relevant += 1;
    metrics::counter!("feed_kills_relevant_total").increment(1);
    tracing::debug!(
        kill_id = kill.killmail.killmail_id,
        system,
        adjacent = kill.chain.is_adjacent,
        "kill in chain range"
    );

    if let Err(e) = sink.deliver(&kill).await {
        // Delivery is the sink's concern; the stream keeps going.
        tracing::warn!(
            kill_id = kill.killmail.killmail_id,
            error = %e,
            "intel delivery failed"
        );
    }
}
