//! Monitor configuration

use crate::classifier::DEFAULT_TECHNICAL_KEYWORDS;
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Timing thresholds and heuristics of the outage state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Heartbeat silence after which the site is suspected offline (seconds)
    pub silence_timeout_secs: u64,

    /// Offline time after which the outage is confirmed and announced (minutes)
    pub confirmation_threshold_minutes: f64,

    /// Reported uptime at or below this is not trusted for back-dating (seconds)
    pub reboot_uptime_floor_secs: u64,

    /// Back-dating applied when the reported uptime is not trusted (seconds)
    pub reboot_backdate_floor_secs: u64,

    /// Assumed outage lead when recovering from an outage whose start was never observed (seconds)
    pub unobserved_outage_lead_secs: u64,

    /// "Was on for" is only reported above this (seconds)
    pub min_reported_on_secs: u64,

    /// Restart reason fragments that mark a technical fault
    pub technical_keywords: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            silence_timeout_secs: 180,
            confirmation_threshold_minutes: 5.0,
            reboot_uptime_floor_secs: 60,
            reboot_backdate_floor_secs: 120,
            unobserved_outage_lead_secs: 60,
            min_reported_on_secs: 300,
            technical_keywords: DEFAULT_TECHNICAL_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

impl MonitorConfig {
    pub fn silence_timeout(&self) -> Duration {
        Duration::seconds(self.silence_timeout_secs as i64)
    }

    pub fn confirmation_threshold(&self) -> Duration {
        Duration::milliseconds((self.confirmation_threshold_minutes * 60_000.0).round() as i64)
    }

    pub fn reboot_backdate_floor(&self) -> Duration {
        Duration::seconds(self.reboot_backdate_floor_secs as i64)
    }

    pub fn unobserved_outage_lead(&self) -> Duration {
        Duration::seconds(self.unobserved_outage_lead_secs as i64)
    }

    pub fn min_reported_on(&self) -> Duration {
        Duration::seconds(self.min_reported_on_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = MonitorConfig::default();
        assert_eq!(config.silence_timeout(), Duration::seconds(180));
        assert_eq!(config.confirmation_threshold(), Duration::minutes(5));
        assert_eq!(config.technical_keywords.len(), 5);
    }

    #[test]
    fn test_fractional_confirmation_threshold() {
        let config = MonitorConfig {
            confirmation_threshold_minutes: 2.5,
            ..Default::default()
        };
        assert_eq!(config.confirmation_threshold(), Duration::seconds(150));
    }
}
