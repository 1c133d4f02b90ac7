//! Daily report
//!
//! Today's on/off split is computed against the full 24 hours of the day,
//! so hours still ahead count as "on" until proven otherwise.

use crate::format::{escape_html, format_duration, DisplayZone};
use crate::interval::{active_outage, OutageInterval};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use monitor_state::MonitorState;
use storage::OutageRecord;

const DAY_SECONDS: f64 = 86_400.0;

/// One outage as it affected today
#[derive(Debug, Clone, PartialEq)]
pub struct DayEntry {
    pub start: DateTime<FixedOffset>,
    pub end: Option<DateTime<FixedOffset>>,
    /// Part of the outage that fell within today
    pub today: Duration,
    pub started_previous_day: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub generated_at: DateTime<FixedOffset>,
    pub on_percent: f64,
    pub off_percent: f64,
    pub on_time: Duration,
    pub off_time: Duration,
    /// In-progress outage first, then completed ones newest first
    pub entries: Vec<DayEntry>,
}

impl DailyReport {
    /// Build today's report. `records` should cover every completed outage
    /// overlapping today; anything outside today is ignored.
    pub fn build(
        state: &MonitorState,
        records: &[OutageRecord],
        now: DateTime<Utc>,
        zone: DisplayZone,
    ) -> Self {
        let date = zone.date_of(now);
        let day_start = zone.start_of_day(date);

        let mut completed: Vec<OutageInterval> = records.iter().map(OutageInterval::from).collect();
        completed.sort_by(|a, b| b.start.cmp(&a.start));

        let mut entries = Vec::new();
        let mut off_time = Duration::zero();
        for interval in active_outage(state, now).into_iter().chain(completed) {
            let today = interval.overlap_with(day_start, now, now);
            if today <= Duration::zero() {
                continue;
            }
            off_time = off_time + today;
            entries.push(DayEntry {
                start: zone.to_local(interval.start),
                end: interval.end.map(|e| zone.to_local(e)),
                today,
                started_previous_day: interval.start < day_start,
                is_active: interval.is_active,
            });
        }

        let off_percent = (off_time.num_seconds() as f64 / DAY_SECONDS * 100.0).min(100.0);
        let on_time = (Duration::days(1) - off_time).max(Duration::zero());

        Self {
            date,
            generated_at: zone.to_local(now),
            on_percent: 100.0 - off_percent,
            off_percent,
            on_time,
            off_time,
            entries,
        }
    }

    /// Attachment name, e.g. `report_01_02.html`
    pub fn file_name(&self) -> String {
        format!("report_{}.html", self.date.format("%d_%m"))
    }

    /// Self-contained HTML document.
    pub fn render_html(&self, location: Option<&str>) -> String {
        let title = location.filter(|l| !l.is_empty()).unwrap_or("Power monitor");

        let mut rows = String::new();
        for entry in &self.entries {
            rows.push_str(&render_entry(entry));
        }
        if rows.is_empty() {
            rows = "<div class=\"empty\">No outages today!</div>".to_string();
        }

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<title>Report {date}</title>
<style>
body {{ font-family: sans-serif; background: #f4f4f5; padding: 20px; color: #333; }}
.card {{ background: white; border-radius: 12px; padding: 20px; box-shadow: 0 2px 5px rgba(0,0,0,0.1); margin-bottom: 15px; }}
h2 {{ margin-top: 0; color: #2563eb; }}
.stats-grid {{ display: grid; grid-template-columns: 1fr 1fr; gap: 10px; margin-bottom: 20px; }}
.stat-box {{ padding: 15px; border-radius: 8px; text-align: center; }}
.stat-val {{ font-size: 24px; font-weight: bold; display: block; }}
.stat-label {{ font-size: 12px; color: #666; }}
.red {{ color: #dc2626; background: #fef2f2; }}
.green {{ color: #16a34a; background: #dcfce7; }}
.event-row {{ display: flex; align-items: center; padding: 10px 0; border-bottom: 1px solid #eee; }}
.event-row:last-child {{ border-bottom: none; }}
.time {{ font-weight: bold; }}
.dur {{ font-size: 13px; color: #666; }}
.active {{ background: #fff1f2; padding: 10px; border-radius: 8px; border: 1px solid #fecdd3; }}
.empty {{ text-align: center; color: #999; }}
</style>
</head>
<body>
<div class="card">
<h2>Report: {title}</h2>
<div>Date: <b>{date}</b></div>
<div>Generated at: {time}</div>
</div>
<div class="stats-grid">
<div class="stat-box green"><span class="stat-val">{on_pct:.1}%</span><span class="stat-label">Power on</span><br><small>{on_time}</small></div>
<div class="stat-box red"><span class="stat-val">{off_pct:.1}%</span><span class="stat-label">Power off</span><br><small>{off_time}</small></div>
</div>
<div class="card">
<h3>Today</h3>
{rows}
</div>
</body>
</html>
"#,
            title = escape_html(title),
            date = self.date.format("%d.%m.%Y"),
            time = self.generated_at.format("%H:%M"),
            on_pct = self.on_percent,
            off_pct = self.off_percent,
            on_time = format_duration(self.on_time),
            off_time = format_duration(self.off_time),
            rows = rows,
        )
    }
}

fn render_entry(entry: &DayEntry) -> String {
    let end = match entry.end {
        Some(end) => end.format("%H:%M").to_string(),
        None => "...".to_string(),
    };
    let note = if entry.started_previous_day {
        format!("<br><small>(started {})</small>", entry.start.format("%d.%m"))
    } else {
        String::new()
    };
    let (class, label) = if entry.is_active {
        ("event-row active", "Ongoing for")
    } else {
        ("event-row", "Duration")
    };

    format!(
        "<div class=\"{class}\"><div class=\"info\"><div class=\"time\">{start} - {end}{note}</div><div class=\"dur\">{label}: {dur} (today)</div></div></div>\n",
        class = class,
        start = entry.start.format("%H:%M"),
        end = end,
        note = note,
        label = label,
        dur = format_duration(entry.today),
    )
}
