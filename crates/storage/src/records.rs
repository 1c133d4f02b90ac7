//! Record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A confirmed, user-visible power loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutageRecord {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_minutes: f64,
}

impl OutageRecord {
    /// Build a record, deriving the duration from the two instants.
    pub fn new(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> Self {
        let millis = (ended_at - started_at).num_milliseconds().max(0);
        Self {
            started_at,
            ended_at,
            duration_minutes: millis as f64 / 60_000.0,
        }
    }

    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.started_at <= to && self.ended_at >= from
    }
}

/// A technical blip (link loss or device self-reset) that is not counted
/// as a power outage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEventRecord {
    pub occurred_at: DateTime<Utc>,
    pub duration_minutes: f64,
    /// Human-readable cause
    pub reason: String,
    /// Cause code as reported by the device
    pub raw_reason: String,
}

/// Device network address observed at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceIdentityRecord {
    pub observed_at: DateTime<Utc>,
    pub address: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_outage_duration_in_minutes() {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap();
        let record = OutageRecord::new(start, start + Duration::seconds(5430));
        assert!((record.duration_minutes - 90.5).abs() < 1e-9);
    }

    #[test]
    fn test_outage_overlap() {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap();
        let record = OutageRecord::new(start, start + Duration::hours(2));

        assert!(record.overlaps(start - Duration::hours(1), start));
        assert!(record.overlaps(start + Duration::hours(2), start + Duration::hours(3)));
        assert!(!record.overlaps(start + Duration::hours(3), start + Duration::hours(4)));
    }
}
