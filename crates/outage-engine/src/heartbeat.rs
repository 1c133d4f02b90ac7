//! Heartbeat input

use crate::classifier::NO_REASON;
use chrono::{DateTime, Utc};

/// An authenticated heartbeat from the device.
#[derive(Debug, Clone, PartialEq)]
pub struct Heartbeat {
    pub received_at: DateTime<Utc>,
    /// Session id; changes across reboots
    pub boot_id: Option<String>,
    pub device_ip: Option<String>,
    /// First heartbeat since the device booted
    pub first_boot: bool,
    /// Device-reported cause of its last restart
    pub raw_reason: String,
    /// Seconds since the device booted
    pub uptime_secs: u64,
}

impl Heartbeat {
    pub fn new(received_at: DateTime<Utc>) -> Self {
        Self {
            received_at,
            boot_id: None,
            device_ip: None,
            first_boot: false,
            raw_reason: NO_REASON.to_string(),
            uptime_secs: 0,
        }
    }

    pub fn with_boot_id(mut self, boot_id: impl Into<String>) -> Self {
        self.boot_id = Some(boot_id.into());
        self
    }

    pub fn with_device_ip(mut self, ip: impl Into<String>) -> Self {
        self.device_ip = Some(ip.into());
        self
    }

    pub fn first_boot(mut self, first: bool) -> Self {
        self.first_boot = first;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.raw_reason = reason.into();
        self
    }

    pub fn with_uptime(mut self, uptime_secs: u64) -> Self {
        self.uptime_secs = uptime_secs;
        self
    }
}
