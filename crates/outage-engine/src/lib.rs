//! Outage Engine
//!
//! Decides, from device heartbeats and a periodic watchdog tick, whether the
//! site has power:
//! - Two-threshold debouncing (silence timeout, then confirmation)
//! - Hard-reboot back-dating of the recovery instant
//! - Technical-fault filtering by restart reason
//!
//! All transitions go through [`OutageStateMachine`], shared as a
//! [`SharedMonitor`] so heartbeat ingestion and the watchdog serialize on
//! one lock.

mod classifier;
mod clock;
mod config;
mod heartbeat;
mod machine;

pub use classifier::{
    describe_reason, KeywordClassifier, RestartClassifier, RestartKind, DEFAULT_TECHNICAL_KEYWORDS,
    NO_REASON,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MonitorConfig;
pub use heartbeat::Heartbeat;
pub use machine::{OutageStateMachine, SharedMonitor, Transition};
