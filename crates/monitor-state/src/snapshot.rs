//! Snapshot persistence

use crate::{MessageRef, MonitorState, PersistenceError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Durable home of the monitor state.
pub trait SnapshotStore: Send + Sync {
    /// Last saved snapshot, or the default belief as of `now`.
    fn load(&self, now: DateTime<Utc>) -> MonitorState;

    /// Replace the stored snapshot.
    fn save(&self, state: &MonitorState) -> Result<(), PersistenceError>;
}

/// On-disk form. Every field is optional so snapshots written by older
/// builds still load, with missing keys taken from the default.
#[derive(Debug, Default, Deserialize)]
struct StoredState {
    is_online: Option<bool>,
    last_heartbeat_at: Option<DateTime<Utc>>,
    outage_started_at: Option<DateTime<Utc>>,
    online_since: Option<DateTime<Utc>>,
    last_boot_id: Option<String>,
    last_device_ip: Option<String>,
    last_restart_reason: Option<String>,
    outage_notified: Option<bool>,
    open_notification_ref: Option<MessageRef>,
}

impl StoredState {
    fn into_state(self, now: DateTime<Utc>) -> MonitorState {
        let defaults = MonitorState::fresh(now);
        MonitorState {
            is_online: self.is_online.unwrap_or(defaults.is_online),
            last_heartbeat_at: self.last_heartbeat_at.unwrap_or(defaults.last_heartbeat_at),
            outage_started_at: self.outage_started_at,
            online_since: self.online_since.unwrap_or(defaults.online_since),
            last_boot_id: self.last_boot_id,
            last_device_ip: self.last_device_ip,
            last_restart_reason: self.last_restart_reason,
            outage_notified: self.outage_notified.unwrap_or(defaults.outage_notified),
            open_notification_ref: self.open_notification_ref,
        }
    }
}

/// JSON snapshot file, replaced via write-then-rename.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn read(&self, now: DateTime<Utc>) -> Result<Option<MonitorState>, PersistenceError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredState = serde_json::from_slice(&bytes)?;
        Ok(Some(stored.into_state(now)))
    }
}

impl SnapshotStore for StateFile {
    fn load(&self, now: DateTime<Utc>) -> MonitorState {
        let mut state = match self.read(now) {
            Ok(Some(state)) => {
                info!("Loaded monitor state from {}", self.path.display());
                state
            }
            Ok(None) => {
                info!("No state snapshot at {}, starting fresh", self.path.display());
                MonitorState::fresh(now)
            }
            Err(e) => {
                warn!("Unreadable state snapshot {}: {}, starting fresh", self.path.display(), e);
                MonitorState::fresh(now)
            }
        };

        if state.repair() {
            warn!("State snapshot violated invariants and was repaired");
        }
        state
    }

    fn save(&self, state: &MonitorState) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let payload = serde_json::to_vec_pretty(state)?;
        let temp = self.temp_path();
        {
            let mut file = File::create(&temp)?;
            file.write_all(&payload)?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;

        debug!("Saved monitor state to {}", self.path.display());
        Ok(())
    }
}

/// In-process snapshot store for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySnapshots {
    saved: Mutex<Option<MonitorState>>,
    save_count: Mutex<usize>,
    failing: Mutex<bool>,
}

impl MemorySnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an existing snapshot.
    pub fn with_state(state: MonitorState) -> Self {
        Self {
            saved: Mutex::new(Some(state)),
            ..Self::default()
        }
    }

    /// Make subsequent saves fail.
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut flag) = self.failing.lock() {
            *flag = failing;
        }
    }

    pub fn latest(&self) -> Option<MonitorState> {
        self.saved.lock().ok().and_then(|s| s.clone())
    }

    pub fn save_count(&self) -> usize {
        self.save_count.lock().map(|c| *c).unwrap_or(0)
    }
}

impl SnapshotStore for MemorySnapshots {
    fn load(&self, now: DateTime<Utc>) -> MonitorState {
        let mut state = self.latest().unwrap_or_else(|| MonitorState::fresh(now));
        state.repair();
        state
    }

    fn save(&self, state: &MonitorState) -> Result<(), PersistenceError> {
        if self.failing.lock().map(|f| *f).unwrap_or(false) {
            return Err(PersistenceError::Unavailable("save disabled".to_string()));
        }

        let mut saved = self
            .saved
            .lock()
            .map_err(|e| PersistenceError::Unavailable(format!("Lock error: {}", e)))?;
        *saved = Some(state.clone());

        if let Ok(mut count) = self.save_count.lock() {
            *count += 1;
        }
        Ok(())
    }
}
