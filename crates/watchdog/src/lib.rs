//! Watchdog Timer
//!
//! A single background task that wakes at a fixed interval and lets the
//! outage state machine check for overdue heartbeats.

mod timer;

pub use timer::{Watchdog, WatchdogConfig};
