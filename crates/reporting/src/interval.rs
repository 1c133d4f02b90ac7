//! Outage intervals, completed or in progress

use chrono::{DateTime, Duration, Utc};
use monitor_state::MonitorState;
use serde::Serialize;
use storage::OutageRecord;

/// An outage as shown to people. `end` is `None` while in progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutageInterval {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub duration_minutes: f64,
    pub is_active: bool,
}

impl OutageInterval {
    /// End instant, with an in-progress outage treated as ending at `now`.
    pub fn end_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.end.unwrap_or(now)
    }

    pub fn duration(&self) -> Duration {
        Duration::milliseconds((self.duration_minutes * 60_000.0).round() as i64)
    }

    /// Length of the part of this outage inside `[from, to]`.
    pub fn overlap_with(&self, from: DateTime<Utc>, to: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        let start = self.start.max(from);
        let end = self.end_or(now).min(to);
        if end > start {
            end - start
        } else {
            Duration::zero()
        }
    }
}

impl From<&OutageRecord> for OutageInterval {
    fn from(record: &OutageRecord) -> Self {
        Self {
            start: record.started_at,
            end: Some(record.ended_at),
            duration_minutes: record.duration_minutes,
            is_active: false,
        }
    }
}

/// The confirmed outage in progress, if any. A suspected outage that has
/// not crossed the confirmation threshold is not reported.
pub fn active_outage(state: &MonitorState, now: DateTime<Utc>) -> Option<OutageInterval> {
    if !state.has_active_outage() {
        return None;
    }
    let start = state.outage_started_at?;
    let millis = (now - start).num_milliseconds().max(0);
    Some(OutageInterval {
        start,
        end: None,
        duration_minutes: millis as f64 / 60_000.0,
        is_active: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_active_outage_only_when_confirmed() {
        let mut state = MonitorState::fresh(at(8, 0));
        assert!(active_outage(&state, at(9, 0)).is_none());

        state.is_online = false;
        state.outage_started_at = Some(at(8, 0));
        assert!(active_outage(&state, at(9, 0)).is_none());

        state.outage_notified = true;
        let active = active_outage(&state, at(9, 30)).unwrap();
        assert!(active.is_active);
        assert_eq!(active.end, None);
        assert!((active.duration_minutes - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_overlap_clipping() {
        let interval = OutageInterval::from(&OutageRecord::new(at(1, 0), at(3, 0)));
        assert_eq!(interval.overlap_with(at(2, 0), at(5, 0), at(6, 0)), Duration::hours(1));
        assert_eq!(interval.overlap_with(at(4, 0), at(5, 0), at(6, 0)), Duration::zero());

        let active = OutageInterval {
            start: at(5, 0),
            end: None,
            duration_minutes: 0.0,
            is_active: true,
        };
        assert_eq!(active.overlap_with(at(0, 0), at(23, 0), at(5, 45)), Duration::minutes(45));
    }
}
