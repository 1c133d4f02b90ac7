//! Alert Limiter
//!
//! Cooldown and hourly cap for repeatable self-alerts, keyed by alert kind.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Limiter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Minimum gap between two alerts of the same kind (seconds)
    pub cooldown_seconds: u64,
    /// Maximum alerts per hour across all kinds
    pub max_alerts_per_hour: usize,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: 300, // 5 minutes
            max_alerts_per_hour: 12,
        }
    }
}

/// State of one alert kind
#[derive(Debug, Clone)]
pub struct AlertState {
    /// Last time this alert was fired
    pub last_fired: Instant,
    /// Number of times fired
    pub fire_count: usize,
    /// Number of times suppressed since the last fire
    pub suppressed: usize,
}

/// Cooldown tracker for self-alerts
pub struct AlertLimiter {
    config: LimiterConfig,
    states: HashMap<String, AlertState>,
    hourly_count: usize,
    hour_start: Option<Instant>,
}

impl AlertLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        info!("Creating alert limiter with config: {:?}", config);
        Self {
            config,
            states: HashMap::new(),
            hourly_count: 0,
            hour_start: None,
        }
    }

    /// Check whether an alert of `kind` may fire at `now`
    pub fn should_fire(&mut self, kind: &str, now: Instant) -> bool {
        // Reset hourly counter if needed
        match self.hour_start {
            Some(start) if now.saturating_duration_since(start) <= Duration::from_secs(3600) => {}
            _ => {
                self.hourly_count = 0;
                self.hour_start = Some(now);
            }
        }

        if self.hourly_count >= self.config.max_alerts_per_hour {
            warn!("Alert throttled: max alerts per hour reached");
            return false;
        }

        if let Some(state) = self.states.get(kind) {
            let cooldown = Duration::from_secs(self.config.cooldown_seconds);
            if now.saturating_duration_since(state.last_fired) < cooldown {
                debug!("Alert {} suppressed: in cooldown period", kind);
                return false;
            }
        }

        true
    }

    /// Record that an alert of `kind` fired at `now`
    pub fn record_fire(&mut self, kind: &str, now: Instant) {
        self.hourly_count += 1;

        let state = self.states.entry(kind.to_string()).or_insert(AlertState {
            last_fired: now,
            fire_count: 0,
            suppressed: 0,
        });
        state.last_fired = now;
        state.fire_count += 1;
        state.suppressed = 0;

        info!("Alert recorded: {} (count: {})", kind, state.fire_count);
    }

    /// Fire if allowed, counting suppressions otherwise. Returns whether the
    /// caller should send the alert.
    pub fn try_fire(&mut self, kind: &str, now: Instant) -> bool {
        if self.should_fire(kind, now) {
            self.record_fire(kind, now);
            true
        } else {
            if let Some(state) = self.states.get_mut(kind) {
                state.suppressed += 1;
            }
            false
        }
    }

    pub fn state(&self, kind: &str) -> Option<&AlertState> {
        self.states.get(kind)
    }

    pub fn hourly_count(&self) -> usize {
        self.hourly_count
    }
}

impl Default for AlertLimiter {
    fn default() -> Self {
        Self::new(LimiterConfig::default())
    }
}
