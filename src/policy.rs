//! Cache freshness and the merge rule applied after a recrawl.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::config::CacheConfig;
use crate::contact::{Contact, ContactRecord, ProbeResult};

/// Longest window accepted from config, keeps date arithmetic in range.
const MAX_STALENESS_DAYS: i64 = 365 * 100;

#[derive(Debug, Clone)]
pub struct FreshnessPolicy {
    staleness_window: Duration,
    min_confidence: u8,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl FreshnessPolicy {
    pub fn new(staleness_days: i64, min_confidence: u8) -> Self {
        Self {
            staleness_window: Duration::days(staleness_days.clamp(0, MAX_STALENESS_DAYS)),
            min_confidence: min_confidence.min(100),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.staleness_days, config.min_confidence)
    }

    /// A record must be recrawled if it was never checked, is older than the
    /// staleness window, or is below the minimum confidence.
    pub fn is_stale(&self, record: &ContactRecord, now: DateTime<Utc>) -> bool {
        let Some(checked_at) = record.checked_at else {
            return true;
        };
        if now.signed_duration_since(checked_at) > self.staleness_window {
            return true;
        }
        record.confidence < self.min_confidence
    }

    /// Combine a fresh probe with the prior record for `domain`.
    ///
    /// A prior good email survives a probe that is not an equally good email
    /// unless `allow_downgrade` is set; only `checked_at` and `meta` move.
    /// Bounce fields always come from the prior record.
    pub fn merge(
        &self,
        prior: Option<&ContactRecord>,
        probe: ProbeResult,
        domain: &str,
        now: DateTime<Utc>,
        allow_downgrade: bool,
    ) -> ContactRecord {
        let fresh_is_good_email =
            matches!(probe.contact, Contact::Email(_)) && probe.confidence >= self.min_confidence;

        let keep_prior = prior
            .filter(|p| !allow_downgrade && p.is_good_email(self.min_confidence) && !fresh_is_good_email);

        let mut merged = match keep_prior {
            Some(prior) => {
                info!(
                    "Keeping verified contact for {} ({} at {}); recrawl found {} at {}",
                    domain,
                    prior.value().unwrap_or("-"),
                    prior.confidence,
                    probe.contact_type(),
                    probe.confidence
                );
                let mut kept = prior.clone();
                kept.domain = domain.to_string();
                kept.checked_at = Some(now);
                kept.meta = probe.meta;
                kept
            }
            None => {
                let mut record = ContactRecord::new(domain, probe.contact, probe.confidence, Some(now));
                record.meta = probe.meta;
                record
            }
        };

        if let Some(prior) = prior {
            merged.carry_bounce_state(prior);
        }

        debug!(
            "Merged record for {}: {} (confidence {})",
            domain,
            merged.contact_type(),
            merged.confidence
        );
        merged
    }
}
