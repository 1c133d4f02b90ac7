//! In-memory event store

use crate::{DeviceIdentityRecord, EventStore, OutageRecord, StorageError, SystemEventRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Event store kept in process memory. Used for dry runs and tests.
pub struct MemoryRepository {
    outages: Mutex<Vec<OutageRecord>>,
    system_events: Mutex<Vec<SystemEventRecord>>,
    device_history: Mutex<Vec<DeviceIdentityRecord>>,
}

fn locked<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))
}

impl MemoryRepository {
    pub fn new() -> Self {
        info!("Creating in-memory event store");
        Self {
            outages: Mutex::new(Vec::new()),
            system_events: Mutex::new(Vec::new()),
            device_history: Mutex::new(Vec::new()),
        }
    }

    pub fn outage_count(&self) -> usize {
        self.outages.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn system_event_count(&self) -> usize {
        self.system_events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn device_history_count(&self) -> usize {
        self.device_history.lock().map(|d| d.len()).unwrap_or(0)
    }

    /// All outages in insertion order
    pub fn outages(&self) -> Vec<OutageRecord> {
        self.outages.lock().map(|o| o.clone()).unwrap_or_default()
    }

    /// All system events in insertion order
    pub fn system_events(&self) -> Vec<SystemEventRecord> {
        self.system_events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for MemoryRepository {
    async fn append_outage(&self, record: &OutageRecord) -> Result<(), StorageError> {
        locked(&self.outages)?.push(record.clone());
        debug!("Stored outage starting {}", record.started_at);
        Ok(())
    }

    async fn append_system_event(&self, record: &SystemEventRecord) -> Result<(), StorageError> {
        locked(&self.system_events)?.push(record.clone());
        Ok(())
    }

    async fn append_device_identity(
        &self,
        record: &DeviceIdentityRecord,
    ) -> Result<(), StorageError> {
        locked(&self.device_history)?.push(record.clone());
        Ok(())
    }

    async fn outages_overlapping(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OutageRecord>, StorageError> {
        let mut found: Vec<_> = locked(&self.outages)?
            .iter()
            .filter(|o| o.overlaps(from, to))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(found)
    }

    async fn recent_outages(&self, limit: usize) -> Result<Vec<OutageRecord>, StorageError> {
        let mut all = locked(&self.outages)?.clone();
        all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all.truncate(limit);
        Ok(all)
    }

    async fn system_events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SystemEventRecord>, StorageError> {
        let mut found: Vec<_> = locked(&self.system_events)?
            .iter()
            .filter(|e| e.occurred_at >= from && e.occurred_at <= to)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        Ok(found)
    }

    async fn device_history(&self, limit: usize) -> Result<Vec<DeviceIdentityRecord>, StorageError> {
        Ok(locked(&self.device_history)?
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}
