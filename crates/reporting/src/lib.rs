//! Reporting
//!
//! Read-side views over the monitor state and the outage history:
//! - Range statistics (on/off percentages, outage list)
//! - Daily report rendered as a standalone HTML document
//! - Recent outage history
//! - Current status summary
//!
//! Everything here is pure: callers fetch records from the event store and
//! pass them in together with `now`.

mod daily;
mod format;
mod history;
mod interval;
mod stats;
mod status;

pub use daily::{DailyReport, DayEntry};
pub use format::{escape_html, format_duration, DisplayZone, ZoneParseError};
pub use history::{recent_history, render_history_text, HISTORY_LIMIT};
pub use interval::{active_outage, OutageInterval};
pub use stats::{compute_stats, OutageView, StatsMeta, StatsReport, StatsSummary, StatsWindow};
pub use status::StatusSummary;
