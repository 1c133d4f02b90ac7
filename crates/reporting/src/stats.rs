//! Availability statistics over a date range

use crate::format::{format_duration, DisplayZone};
use crate::interval::{active_outage, OutageInterval};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use monitor_state::MonitorState;
use serde::Serialize;
use storage::OutageRecord;

const DEFAULT_WINDOW_DAYS: i64 = 7;

/// Resolved query window `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl StatsWindow {
    /// Resolve optional `YYYY-MM-DD` bounds.
    ///
    /// Both dates must parse, otherwise the last seven days up to `now` are
    /// used. Explicit dates cover `start 00:00:00` through `end 23:59:59`.
    /// The start never precedes `floor`.
    pub fn resolve(
        start: Option<&str>,
        end: Option<&str>,
        now: DateTime<Utc>,
        zone: DisplayZone,
        floor: NaiveDate,
    ) -> Self {
        let parse = |s: &str| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok();
        let explicit = match (start.and_then(parse), end.and_then(parse)) {
            (Some(start), Some(end)) => Some((zone.start_of_day(start), zone.end_of_day(end))),
            _ => None,
        };

        let (from, to) = explicit.unwrap_or((now - Duration::days(DEFAULT_WINDOW_DAYS), now));
        Self {
            from: from.max(zone.start_of_day(floor)),
            to,
        }
    }

    /// Window length in minutes, at least one so percentages stay finite.
    fn minutes(&self) -> f64 {
        let minutes = (self.to - self.from).num_seconds() as f64 / 60.0;
        if minutes <= 0.0 {
            1.0
        } else {
            minutes
        }
    }
}

/// Outage as serialized by the statistics endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutageView {
    pub start: String,
    pub end: Option<String>,
    pub duration_min: f64,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSummary {
    pub on_percent: f64,
    pub off_percent: f64,
    pub on_hours: f64,
    pub off_hours: f64,
    pub total_events: usize,
    pub avg_duration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsMeta {
    pub display_range: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub is_online: bool,
    pub last_update: String,
    pub stats: StatsSummary,
    pub meta: StatsMeta,
    pub outages: Vec<OutageView>,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Aggregate on/off time for `window`.
///
/// `records` are the completed outages overlapping the window, newest first.
/// The confirmed outage in progress, if any, is listed first. Off time is
/// clipped to the window and capped at 100%.
pub fn compute_stats(
    state: &MonitorState,
    records: &[OutageRecord],
    window: StatsWindow,
    now: DateTime<Utc>,
    zone: DisplayZone,
) -> StatsReport {
    let intervals: Vec<OutageInterval> = active_outage(state, now)
        .into_iter()
        .chain(records.iter().map(OutageInterval::from))
        .collect();

    let off_minutes: f64 = intervals
        .iter()
        .map(|i| i.overlap_with(window.from, window.to, now).num_seconds() as f64 / 60.0)
        .sum();
    let range_minutes = window.minutes();
    let off_minutes = off_minutes.min(range_minutes);
    let off_percent = (off_minutes / range_minutes * 100.0).min(100.0);

    let avg_duration = if intervals.is_empty() {
        "0".to_string()
    } else {
        let total: f64 = intervals.iter().map(|i| i.duration_minutes).sum();
        let avg_secs = total * 60.0 / intervals.len() as f64;
        format_duration(Duration::seconds(avg_secs.round() as i64))
    };

    let local_iso = |t: DateTime<Utc>| zone.to_local(t).format("%Y-%m-%dT%H:%M:%S%:z").to_string();
    let outages = intervals
        .iter()
        .map(|i| OutageView {
            start: local_iso(i.start),
            end: i.end.map(local_iso),
            duration_min: round_to(i.duration_minutes, 2),
            is_active: i.is_active,
        })
        .collect();

    StatsReport {
        is_online: state.is_online,
        last_update: zone.to_local(now).format("%Y-%m-%dT%H:%M:%S").to_string(),
        stats: StatsSummary {
            on_percent: round_to(100.0 - off_percent, 1),
            off_percent: round_to(off_percent, 1),
            on_hours: round_to((range_minutes - off_minutes) / 60.0, 1),
            off_hours: round_to(off_minutes / 60.0, 1),
            total_events: intervals.len(),
            avg_duration,
        },
        meta: StatsMeta {
            display_range: format!(
                "{} - {}",
                zone.to_local(window.from).format("%d.%m"),
                zone.to_local(window.to).format("%d.%m")
            ),
        },
        outages,
    }
}
