//! Current status summary

use crate::format::{format_duration, DisplayZone};
use chrono::{DateTime, Duration, Utc};
use monitor_state::{MonitorState, Phase};
use serde::Serialize;

/// What the monitor believes right now and for how long.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSummary {
    pub phase: Phase,
    pub since: DateTime<Utc>,
    pub duration_secs: i64,
}

impl StatusSummary {
    pub fn from_state(state: &MonitorState, now: DateTime<Utc>) -> Self {
        let since = match state.phase() {
            Phase::Online => state.online_since,
            Phase::Suspect | Phase::OfflineConfirmed => state.outage_started_at.unwrap_or(now),
        };
        Self {
            phase: state.phase(),
            since,
            duration_secs: (now - since).num_seconds().max(0),
        }
    }

    /// Two-line human description.
    pub fn render(&self, zone: DisplayZone) -> String {
        let duration = format_duration(Duration::seconds(self.duration_secs));
        let since = zone.clock_and_date(self.since);
        match self.phase {
            Phase::Online => format!("🟢 Power on for {}\n⏰ Came on at {}", duration, since),
            Phase::Suspect => format!("🟡 No connection for {} (checking...)\n⏰ Lost at {}", duration, since),
            Phase::OfflineConfirmed => format!("🔴 Power off for {}\n⏰ Went off at {}", duration, since),
        }
    }
}
