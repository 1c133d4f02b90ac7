//! Persistent Monitor State
//!
//! Holds the monitor's single belief about the site (online or not, since
//! when, which device session last reported) and persists it between runs.

mod snapshot;
mod state;

pub use snapshot::{MemorySnapshots, SnapshotStore, StateFile};
pub use state::{MessageRef, MonitorState, Phase};

use thiserror::Error;

/// Snapshot persistence errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Snapshot store unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}
