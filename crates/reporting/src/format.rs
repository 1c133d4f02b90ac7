//! Duration and time-of-day formatting

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use std::fmt;
use thiserror::Error;

/// Render a duration as `"2h 5m"`, or `"5m"` under an hour. Negative
/// durations render as zero.
pub fn format_duration(duration: Duration) -> String {
    let minutes = duration.num_seconds().max(0) / 60;
    let hours = minutes / 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else {
        format!("{}m", minutes)
    }
}

#[derive(Debug, Error)]
#[error("invalid UTC offset {0:?}, expected e.g. \"+02:00\" or \"local\"")]
pub struct ZoneParseError(String);

/// Time zone used for everything shown to people: day boundaries, clock
/// times in messages and reports.
///
/// Either a fixed UTC offset or the host's local zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayZone {
    fixed: Option<FixedOffset>,
}

impl DisplayZone {
    pub fn local() -> Self {
        Self { fixed: None }
    }

    pub fn fixed(offset: FixedOffset) -> Self {
        Self {
            fixed: Some(offset),
        }
    }

    /// Parse `"local"`, `"Z"`, `"+02:00"`, `"-0330"` or `"+3"`.
    pub fn parse(spec: &str) -> Result<Self, ZoneParseError> {
        let spec = spec.trim();
        let err = || ZoneParseError(spec.to_string());
        if spec.is_empty() || spec.eq_ignore_ascii_case("local") {
            return Ok(Self::local());
        }
        if spec.eq_ignore_ascii_case("z") || spec.eq_ignore_ascii_case("utc") {
            return FixedOffset::east_opt(0).map(Self::fixed).ok_or_else(err);
        }

        let (sign, rest) = match spec.as_bytes().first() {
            Some(b'+') => (1, &spec[1..]),
            Some(b'-') => (-1, &spec[1..]),
            _ => return Err(err()),
        };
        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        let (hours, minutes) = match digits.len() {
            1 | 2 => (digits.parse::<i32>().map_err(|_| err())?, 0),
            4 => (
                digits[..2].parse::<i32>().map_err(|_| err())?,
                digits[2..].parse::<i32>().map_err(|_| err())?,
            ),
            _ => return Err(err()),
        };
        if hours > 14 || minutes > 59 {
            return Err(err());
        }

        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(Self::fixed)
            .ok_or_else(err)
    }

    /// Offset in effect at `instant`
    pub fn offset_at(&self, instant: DateTime<Utc>) -> FixedOffset {
        match self.fixed {
            Some(offset) => offset,
            None => Local.offset_from_utc_datetime(&instant.naive_utc()),
        }
    }

    pub fn to_local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset_at(instant))
    }

    /// Calendar date of `instant` in this zone
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.to_local(instant).date_naive()
    }

    /// UTC instant of `time` on `date` in this zone.
    pub fn at(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let naive = date.and_time(time);
        // The offset is taken at the naive instant; good enough around DST
        // changes for minute-resolution reporting.
        let offset = self.offset_at(Utc.from_utc_datetime(&naive));
        Utc.from_utc_datetime(&(naive - Duration::seconds(offset.local_minus_utc() as i64)))
    }

    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        self.at(date, NaiveTime::default())
    }

    /// Last whole second of `date`
    pub fn end_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        self.start_of_day(date) + Duration::days(1) - Duration::seconds(1)
    }

    /// `HH:MM, dd.mm`
    pub fn clock_and_date(&self, instant: DateTime<Utc>) -> String {
        self.to_local(instant).format("%H:%M, %d.%m").to_string()
    }
}

/// Escape text for HTML bodies and Telegram's HTML parse mode.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

impl fmt::Display for DisplayZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fixed {
            Some(offset) => write!(f, "{}", offset),
            None => write!(f, "local"),
        }
    }
}
