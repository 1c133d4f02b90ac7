//! Storage Layer
//!
//! Append-only event store for completed outages, technical system events
//! and device address history. Records are written once and never updated.

mod memory;
mod records;
mod sqlite;

pub use memory::MemoryRepository;
pub use records::{DeviceIdentityRecord, OutageRecord, SystemEventRecord};
pub use sqlite::SqliteRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::DatabaseError(err.to_string())
    }
}

/// Append-only sink and range queries over monitor history.
///
/// Query results are ordered newest first.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append_outage(&self, record: &OutageRecord) -> Result<(), StorageError>;

    async fn append_system_event(&self, record: &SystemEventRecord) -> Result<(), StorageError>;

    async fn append_device_identity(
        &self,
        record: &DeviceIdentityRecord,
    ) -> Result<(), StorageError>;

    /// Outages with `start <= to` and `end >= from`.
    async fn outages_overlapping(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OutageRecord>, StorageError>;

    async fn recent_outages(&self, limit: usize) -> Result<Vec<OutageRecord>, StorageError>;

    async fn system_events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SystemEventRecord>, StorageError>;

    async fn device_history(&self, limit: usize) -> Result<Vec<DeviceIdentityRecord>, StorageError>;
}
