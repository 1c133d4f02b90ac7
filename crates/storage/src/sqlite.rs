//! SQLite event store

use crate::{DeviceIdentityRecord, EventStore, OutageRecord, StorageError, SystemEventRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS outages (
        start_ms INTEGER NOT NULL,
        end_ms INTEGER NOT NULL,
        duration_minutes REAL NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_outages_start ON outages (start_ms)",
    "CREATE TABLE IF NOT EXISTS system_events (
        event_ms INTEGER NOT NULL,
        duration_minutes REAL NOT NULL,
        reason TEXT NOT NULL,
        raw_reason TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_system_events_time ON system_events (event_ms)",
    "CREATE TABLE IF NOT EXISTS ip_history (
        observed_ms INTEGER NOT NULL,
        ip TEXT NOT NULL
    )",
];

/// Event store backed by a SQLite database.
///
/// Timestamps are stored as UTC epoch milliseconds.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StorageError::CorruptRecord(format!("timestamp out of range: {}", ms)))
}

fn outage_from_row(row: &SqliteRow) -> Result<OutageRecord, StorageError> {
    Ok(OutageRecord {
        started_at: from_millis(row.try_get("start_ms")?)?,
        ended_at: from_millis(row.try_get("end_ms")?)?,
        duration_minutes: row.try_get("duration_minutes")?,
    })
}

impl SqliteRepository {
    /// Open (creating if missing) the database at `url` and apply the schema.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // A single connection keeps writes ordered and makes `sqlite::memory:`
        // refer to one database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let repo = Self { pool };
        repo.migrate().await?;
        info!("Opened event store at {}", url);
        Ok(repo)
    }

    /// Fresh in-memory database
    pub async fn in_memory() -> Result<Self, StorageError> {
        Self::connect("sqlite::memory:").await
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl EventStore for SqliteRepository {
    async fn append_outage(&self, record: &OutageRecord) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO outages (start_ms, end_ms, duration_minutes) VALUES (?, ?, ?)")
            .bind(record.started_at.timestamp_millis())
            .bind(record.ended_at.timestamp_millis())
            .bind(record.duration_minutes)
            .execute(&self.pool)
            .await?;
        debug!("Stored outage {} - {}", record.started_at, record.ended_at);
        Ok(())
    }

    async fn append_system_event(&self, record: &SystemEventRecord) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO system_events (event_ms, duration_minutes, reason, raw_reason)
             VALUES (?, ?, ?, ?)",
        )
        .bind(record.occurred_at.timestamp_millis())
        .bind(record.duration_minutes)
        .bind(&record.reason)
        .bind(&record.raw_reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_device_identity(
        &self,
        record: &DeviceIdentityRecord,
    ) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO ip_history (observed_ms, ip) VALUES (?, ?)")
            .bind(record.observed_at.timestamp_millis())
            .bind(&record.address)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn outages_overlapping(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OutageRecord>, StorageError> {
        let rows = sqlx::query(
            "SELECT start_ms, end_ms, duration_minutes FROM outages
             WHERE start_ms <= ? AND end_ms >= ?
             ORDER BY start_ms DESC",
        )
        .bind(to.timestamp_millis())
        .bind(from.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(outage_from_row).collect()
    }

    async fn recent_outages(&self, limit: usize) -> Result<Vec<OutageRecord>, StorageError> {
        let rows = sqlx::query(
            "SELECT start_ms, end_ms, duration_minutes FROM outages
             ORDER BY start_ms DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(outage_from_row).collect()
    }

    async fn system_events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SystemEventRecord>, StorageError> {
        let rows = sqlx::query(
            "SELECT event_ms, duration_minutes, reason, raw_reason FROM system_events
             WHERE event_ms >= ? AND event_ms <= ?
             ORDER BY event_ms DESC",
        )
        .bind(from.timestamp_millis())
        .bind(to.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<SystemEventRecord, StorageError> {
                Ok(SystemEventRecord {
                    occurred_at: from_millis(row.try_get("event_ms")?)?,
                    duration_minutes: row.try_get("duration_minutes")?,
                    reason: row.try_get("reason")?,
                    raw_reason: row.try_get("raw_reason")?,
                })
            })
            .collect()
    }

    async fn device_history(&self, limit: usize) -> Result<Vec<DeviceIdentityRecord>, StorageError> {
        let rows = sqlx::query(
            "SELECT observed_ms, ip FROM ip_history ORDER BY observed_ms DESC, rowid DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<DeviceIdentityRecord, StorageError> {
                Ok(DeviceIdentityRecord {
                    observed_at: from_millis(row.try_get("observed_ms")?)?,
                    address: row.try_get("ip")?,
                })
            })
            .collect()
    }
}
