//! Discord webhook delivery.
//!
//! Builds an embed for each relevant kill and posts it to the configured
//! webhook. Kills at or above the big-kill ISK threshold route to a
//! separate webhook when one is configured. A 429 from Discord skips the
//! kill with a warning; no delivery failure ever propagates into the feed
//! loop as anything but a log line.

use std::time::Duration;

use chainwatch_core::IntelKill;
use reqwest::StatusCode;

use crate::error::Result;
use crate::feed::IntelSink;
use crate::resolve::EsiResolver;

/// Webhook routing configuration.
#[derive(Debug, Clone, Default)]
pub struct NotifyConfig {
    /// Webhook for ordinary chain intel.
    pub intel_webhook: Option<String>,

    /// Webhook for kills at or above the big-kill threshold.
    pub big_kill_webhook: Option<String>,

    /// ISK value at which a kill counts as big.
    pub big_kill_threshold: f64,
}

/// Resolved display names for one kill.
#[derive(Debug, Clone)]
struct KillNames {
    ship: String,
    pilot: String,
    corp: String,
    system: String,
    region: String,
    security: f64,
}

/// Discord webhook sink.
pub struct DiscordNotifier {
    config: NotifyConfig,
    client: reqwest::Client,
    resolver: EsiResolver,
}

impl DiscordNotifier {
    pub fn new(config: NotifyConfig, resolver: EsiResolver) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            config,
            client,
            resolver,
        })
    }

    /// Pick the webhook for a kill of this value.
    ///
    /// Big kills fall back to the intel webhook when no dedicated one is
    /// configured. Returns `None` when no webhook applies at all.
    fn webhook_for(&self, total_value: f64) -> Option<(&str, bool)> {
        let is_big = self.config.big_kill_threshold > 0.0
            && total_value >= self.config.big_kill_threshold;

        if is_big && let Some(url) = self.config.big_kill_webhook.as_deref() {
            return Some((url, true));
        }
        self.config.intel_webhook.as_deref().map(|url| (url, is_big))
    }

    async fn resolve_names(&self, kill: &IntelKill) -> KillNames {
        let victim = &kill.killmail.victim;
        let system = kill.killmail.solar_system_id;
        let details = self.resolver.system_details(system);

        KillNames {
            ship: self.resolver.ship_name(victim.ship_type_id).await,
            pilot: self.resolver.character_name(victim.character_id).await,
            corp: self.resolver.corporation_name(victim.corporation_id).await,
            system: self.resolver.system_name(system),
            region: details
                .and_then(|d| d.region.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            security: details.map(|d| d.security).unwrap_or(0.0),
        }
    }

    fn build_embed(kill: &IntelKill, names: &KillNames) -> serde_json::Value {
        let millions = kill.zkb.total_value / 1_000_000.0;
        let footer = if kill.chain.is_adjacent {
            format!("Adjacent to chain \u{2022} scanned by {}", kill.chain.scanned_by)
        } else {
            format!("In chain \u{2022} scanned by {}", kill.chain.scanned_by)
        };

        serde_json::json!({
            "title": format!("\u{1f4a5} {} | {:.2}m ISK", names.ship, millions),
            "description": format!("**Victim:** {} ({})", names.pilot, names.corp),
            "url": format!("https://zkillboard.com/kill/{}/", kill.killmail.killmail_id),
            "color": security_color(names.security),
            "fields": [
                { "name": "System", "value": names.system, "inline": true },
                { "name": "Region", "value": names.region, "inline": true },
            ],
            "footer": { "text": footer },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })
    }
}

impl IntelSink for DiscordNotifier {
    async fn deliver(&self, kill: &IntelKill) -> Result<()> {
        let Some((url, is_big)) = self.webhook_for(kill.zkb.total_value) else {
            tracing::debug!(
                kill_id = kill.killmail.killmail_id,
                "no webhook configured, dropping intel"
            );
            return Ok(());
        };

        let names = self.resolve_names(kill).await;
        let payload = serde_json::json!({ "embeds": [Self::build_embed(kill, &names)] });

        let resp = self.client.post(url).json(&payload).send().await?;
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            metrics::counter!("notify_rate_limited_total").increment(1);
            tracing::warn!(
                kill_id = kill.killmail.killmail_id,
                "discord webhook rate limited, skipping kill"
            );
            return Ok(());
        }
        resp.error_for_status()?;

        metrics::counter!("notify_posts_total").increment(1);
        tracing::info!(
            kill_id = kill.killmail.killmail_id,
            system = %names.system,
            big_kill = is_big,
            adjacent = kill.chain.is_adjacent,
            "intel posted"
        );
        Ok(())
    }
}

/// Embed accent color from the system's security status: green for highsec,
/// yellow for lowsec, red for nullsec and J-space.
fn security_color(security: f64) -> u32 {
    if security >= 0.5 {
        0x2ecc71
    } else if security > 0.0 {
        0xf1c40f
    } else {
        0xe74c3c
    }
}
