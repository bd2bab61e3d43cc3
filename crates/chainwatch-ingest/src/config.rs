//! Daemon configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// RedisQ listen endpoint.
    pub feed_url: String,

    /// Queue id identifying this consumer to RedisQ.
    pub queue_id: String,

    /// Mapper topology endpoint.
    pub map_url: String,

    /// Period between chain refreshes.
    pub refresh_period: Duration,

    /// Client-side timeout for feed requests.
    pub poll_timeout: Duration,

    /// Path to the static universe map JSON (optional).
    pub systems_path: Option<PathBuf>,

    /// Webhook for ordinary chain intel (optional).
    pub intel_webhook: Option<String>,

    /// Webhook for big kills (optional).
    pub big_kill_webhook: Option<String>,

    /// ISK value at which a kill counts as big.
    pub big_kill_threshold: f64,

    /// Metrics HTTP server port (0 to disable).
    pub metrics_port: u16,
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match optional(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{key} has an unparseable value: {raw}")),
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `CHAINWATCH_MAP_URL`: Mapper topology endpoint
    ///
    /// Optional environment variables:
    /// - `CHAINWATCH_FEED_URL`: RedisQ endpoint (default: "https://zkillredisq.stream/listen.php")
    /// - `CHAINWATCH_QUEUE_ID`: RedisQ queue id (default: "chainwatch")
    /// - `CHAINWATCH_REFRESH_SECS`: Chain refresh period (default: 60)
    /// - `CHAINWATCH_POLL_TIMEOUT_SECS`: Feed request timeout (default: 15)
    /// - `CHAINWATCH_SYSTEMS_PATH`: Universe map JSON file
    /// - `INTEL_WEBHOOK_URL`: Discord webhook for chain intel
    /// - `BIG_KILLS_WEBHOOK_URL`: Discord webhook for big kills
    /// - `MIN_ISK_FOR_BIG_KILL`: Big-kill ISK threshold (default: 1000000000)
    /// - `CHAINWATCH_METRICS_PORT`: Metrics port, 0 disables (default: 9090)
    pub fn from_env() -> anyhow::Result<Self> {
        let map_url = optional("CHAINWATCH_MAP_URL")
            .ok_or_else(|| anyhow::anyhow!("CHAINWATCH_MAP_URL environment variable is required"))?;

        let feed_url = optional("CHAINWATCH_FEED_URL")
            .unwrap_or_else(|| "https://zkillredisq.stream/listen.php".to_string());

        let queue_id = optional("CHAINWATCH_QUEUE_ID").unwrap_or_else(|| "chainwatch".to_string());

        let refresh_period = Duration::from_secs(parsed("CHAINWATCH_REFRESH_SECS", 60u64)?);
        let poll_timeout = Duration::from_secs(parsed("CHAINWATCH_POLL_TIMEOUT_SECS", 15u64)?);

        let systems_path = optional("CHAINWATCH_SYSTEMS_PATH").map(PathBuf::from);

        let intel_webhook = optional("INTEL_WEBHOOK_URL");
        let big_kill_webhook = optional("BIG_KILLS_WEBHOOK_URL");
        let big_kill_threshold = parsed("MIN_ISK_FOR_BIG_KILL", 1_000_000_000.0f64)?;

        let metrics_port = parsed("CHAINWATCH_METRICS_PORT", 9090u16)?;

        if intel_webhook.is_none() && big_kill_webhook.is_none() {
            tracing::warn!("no webhook configured, relevant kills will only be logged");
        }

        tracing::info!(
            feed_url = %feed_url,
            queue_id = %queue_id,
            map_url = %map_url,
            refresh_secs = refresh_period.as_secs(),
            systems_path = ?systems_path,
            metrics_port,
            "configuration loaded"
        );

        Ok(Self {
            feed_url,
            queue_id,
            map_url,
            refresh_period,
            poll_timeout,
            systems_path,
            intel_webhook,
            big_kill_webhook,
            big_kill_threshold,
            metrics_port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize config tests that manipulate env vars.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "CHAINWATCH_MAP_URL",
        "CHAINWATCH_FEED_URL",
        "CHAINWATCH_QUEUE_ID",
        "CHAINWATCH_REFRESH_SECS",
        "CHAINWATCH_POLL_TIMEOUT_SECS",
        "CHAINWATCH_SYSTEMS_PATH",
        "INTEL_WEBHOOK_URL",
        "BIG_KILLS_WEBHOOK_URL",
        "MIN_ISK_FOR_BIG_KILL",
        "CHAINWATCH_METRICS_PORT",
    ];

    /// Helper to run config tests with isolated env vars.
    /// Uses a mutex to prevent concurrent env var races.
    fn with_env_vars<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = ENV_MUTEX.lock().unwrap();

        let saved: Vec<_> = ENV_KEYS
            .iter()
            .map(|k| (*k, std::env::var(k).ok()))
            .collect();

        // SAFETY: Serialized by mutex; only test code touches these vars.
        unsafe {
            for k in ENV_KEYS {
                std::env::remove_var(k);
            }
            for (k, v) in vars {
                std::env::set_var(k, v);
            }
        }

        f();

        // SAFETY: Restoring original env state.
        unsafe {
            for (k, v) in &saved {
                match v {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }
    }

    #[test]
    fn config_requires_map_url() {
        with_env_vars(&[], || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn config_defaults() {
        with_env_vars(&[("CHAINWATCH_MAP_URL", "https://map.test/api")], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.map_url, "https://map.test/api");
            assert_eq!(config.feed_url, "https://zkillredisq.stream/listen.php");
            assert_eq!(config.queue_id, "chainwatch");
            assert_eq!(config.refresh_period, Duration::from_secs(60));
            assert_eq!(config.poll_timeout, Duration::from_secs(15));
            assert!(config.systems_path.is_none());
            assert!(config.intel_webhook.is_none());
            assert!(config.big_kill_webhook.is_none());
            assert_eq!(config.big_kill_threshold, 1_000_000_000.0);
            assert_eq!(config.metrics_port, 9090);
        });
    }

    #[test]
    fn config_custom_values() {
        with_env_vars(
            &[
                ("CHAINWATCH_MAP_URL", "https://map.test/api"),
                ("CHAINWATCH_FEED_URL", "https://feed.test/listen.php"),
                ("CHAINWATCH_QUEUE_ID", "my-queue"),
                ("CHAINWATCH_REFRESH_SECS", "120"),
                ("CHAINWATCH_SYSTEMS_PATH", "/data/systems.json"),
                ("INTEL_WEBHOOK_URL", "https://discord.test/intel"),
                ("BIG_KILLS_WEBHOOK_URL", "https://discord.test/big"),
                ("MIN_ISK_FOR_BIG_KILL", "500000000"),
                ("CHAINWATCH_METRICS_PORT", "0"),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.feed_url, "https://feed.test/listen.php");
                assert_eq!(config.queue_id, "my-queue");
                assert_eq!(config.refresh_period, Duration::from_secs(120));
                assert_eq!(
                    config.systems_path.as_deref(),
                    Some(std::path::Path::new("/data/systems.json"))
                );
                assert_eq!(
                    config.intel_webhook.as_deref(),
                    Some("https://discord.test/intel")
                );
                assert_eq!(config.big_kill_threshold, 500_000_000.0);
                assert_eq!(config.metrics_port, 0);
            },
        );
    }

    #[test]
    fn config_rejects_unparseable_numbers() {
        with_env_vars(
            &[
                ("CHAINWATCH_MAP_URL", "https://map.test/api"),
                ("CHAINWATCH_REFRESH_SECS", "soon"),
            ],
            || {
                assert!(Config::from_env().is_err());
            },
        );
    }

    #[test]
    fn config_empty_vars_fall_back_to_defaults() {
        with_env_vars(
            &[
                ("CHAINWATCH_MAP_URL", "https://map.test/api"),
                ("CHAINWATCH_QUEUE_ID", ""),
                ("INTEL_WEBHOOK_URL", "  "),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.queue_id, "chainwatch");
                assert!(config.intel_webhook.is_none());
            },
        );
    }
}
