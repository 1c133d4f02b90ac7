//! Recent outage history

use crate::format::{format_duration, DisplayZone};
use crate::interval::{active_outage, OutageInterval};
use chrono::{DateTime, Duration, Utc};
use monitor_state::MonitorState;
use storage::OutageRecord;

/// Number of entries shown, including an in-progress outage.
pub const HISTORY_LIMIT: usize = 10;

/// The latest outages, newest first. An in-progress outage takes the first
/// slot and pushes the oldest completed one out.
pub fn recent_history(
    state: &MonitorState,
    records: &[OutageRecord],
    now: DateTime<Utc>,
) -> Vec<OutageInterval> {
    let active = active_outage(state, now);
    let completed_slots = HISTORY_LIMIT - usize::from(active.is_some());

    active
        .into_iter()
        .chain(records.iter().take(completed_slots).map(OutageInterval::from))
        .collect()
}

/// Plain-text table for chat messages.
pub fn render_history_text(entries: &[OutageInterval], zone: DisplayZone) -> String {
    if entries.is_empty() {
        return "No records.".to_string();
    }

    let mut text = String::new();
    for entry in entries {
        let start = zone.to_local(entry.start).format("%d.%m %H:%M");
        let line = match entry.end {
            Some(end) => format!(
                "{}-{} | {}\n",
                start,
                zone.to_local(end).format("%H:%M"),
                format_duration(entry.duration())
            ),
            None => format!("{}- ...  | {}\n", start, format_duration(entry.duration())),
        };
        text.push_str(&line);
    }
    text
}
