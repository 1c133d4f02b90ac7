//! Monitor state and its invariants

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque handle to a delivered chat message, used to thread replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageRef(i64);

impl MessageRef {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

/// Derived phase of the outage state machine.
///
/// `Suspect` covers the window where heartbeats are overdue but the
/// confirmation threshold has not yet been crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Online,
    Suspect,
    OfflineConfirmed,
}

/// The monitor's current belief about the site.
///
/// Invariants:
/// - `outage_started_at` is set iff `is_online` is false
/// - `outage_notified` is true only while offline
/// - `open_notification_ref` is set only while `outage_notified`
/// - `online_since <= last_heartbeat_at` while online
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorState {
    pub is_online: bool,
    pub last_heartbeat_at: DateTime<Utc>,
    pub outage_started_at: Option<DateTime<Utc>>,
    /// Start of the current uninterrupted powered period. Technical
    /// glitches do not reset it.
    pub online_since: DateTime<Utc>,
    pub last_boot_id: Option<String>,
    pub last_device_ip: Option<String>,
    pub last_restart_reason: Option<String>,
    pub outage_notified: bool,
    pub open_notification_ref: Option<MessageRef>,
}

impl MonitorState {
    /// Default belief for a site with no history: online as of `now`.
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            is_online: true,
            last_heartbeat_at: now,
            outage_started_at: None,
            online_since: now,
            last_boot_id: None,
            last_device_ip: None,
            last_restart_reason: None,
            outage_notified: false,
            open_notification_ref: None,
        }
    }

    pub fn phase(&self) -> Phase {
        match (self.is_online, self.outage_notified) {
            (true, _) => Phase::Online,
            (false, false) => Phase::Suspect,
            (false, true) => Phase::OfflineConfirmed,
        }
    }

    /// True while a confirmed (user-visible) outage is in progress.
    pub fn has_active_outage(&self) -> bool {
        self.phase() == Phase::OfflineConfirmed
    }

    pub fn is_consistent(&self) -> bool {
        let outage_start_ok = self.outage_started_at.is_some() != self.is_online;
        let notified_ok = !self.outage_notified || !self.is_online;
        let ref_ok = self.open_notification_ref.is_none() || self.outage_notified;
        let online_since_ok = !self.is_online || self.online_since <= self.last_heartbeat_at;
        outage_start_ok && notified_ok && ref_ok && online_since_ok
    }

    /// Bring a snapshot back in line with the invariants. Returns whether
    /// anything had to change.
    pub fn repair(&mut self) -> bool {
        let before = self.clone();

        if self.is_online {
            self.outage_started_at = None;
            self.outage_notified = false;
            if self.online_since > self.last_heartbeat_at {
                self.online_since = self.last_heartbeat_at;
            }
        } else if self.outage_started_at.is_none() {
            self.outage_started_at = Some(self.last_heartbeat_at);
        }

        if !self.outage_notified {
            self.open_notification_ref = None;
        }

        *self != before
    }
}
