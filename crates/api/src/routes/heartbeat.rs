//! Heartbeat ingestion

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
};
use outage_engine::{Heartbeat, NO_REASON};
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{ApiError, AppState};

/// Fields of a heartbeat body, before authentication.
///
/// Devices send loosely typed JSON: numbers may arrive as strings and the
/// first-boot flag as `1`, `"1"` or `true`.
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatPayload {
    pub key: Option<String>,
    pub uptime_secs: u64,
    pub boot_id: Option<String>,
    pub first_boot: bool,
    pub ip: Option<String>,
    pub reason: String,
}

impl HeartbeatPayload {
    pub fn parse(body: &[u8]) -> Result<Self, ApiError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ApiError::MalformedInput(format!("invalid JSON: {}", e)))?;
        let fields = match value {
            Value::Object(fields) if !fields.is_empty() => fields,
            _ => return Err(ApiError::MalformedInput("No JSON".to_string())),
        };

        Ok(Self {
            key: text(&fields, "key"),
            uptime_secs: uptime(&fields)?,
            boot_id: text(&fields, "boot_id"),
            first_boot: flag(&fields, "first"),
            ip: text(&fields, "ip"),
            reason: text(&fields, "reason").unwrap_or_else(|| NO_REASON.to_string()),
        })
    }

    pub fn into_heartbeat(self, received_at: chrono::DateTime<chrono::Utc>) -> Heartbeat {
        Heartbeat {
            received_at,
            boot_id: self.boot_id,
            device_ip: self.ip,
            first_boot: self.first_boot,
            raw_reason: self.reason,
            uptime_secs: self.uptime_secs,
        }
    }
}

fn text(fields: &Map<String, Value>, name: &str) -> Option<String> {
    match fields.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn flag(fields: &Map<String, Value>, name: &str) -> bool {
    match fields.get(name) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => matches!(s.trim(), "1" | "true" | "True"),
        _ => false,
    }
}

fn uptime(fields: &Map<String, Value>) -> Result<u64, ApiError> {
    let invalid = || ApiError::MalformedInput("uptime must be a number".to_string());
    let seconds = match fields.get("uptime") {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n.as_f64().ok_or_else(invalid)?,
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| invalid())?,
        Some(_) => return Err(invalid()),
    };
    if !seconds.is_finite() {
        return Err(invalid());
    }
    Ok(seconds.max(0.0) as u64)
}

/// Address reported in auth alerts: the proxy's `X-Real-IP`, else the peer.
fn source_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// `POST /ping`
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let payload = match HeartbeatPayload::parse(&body) {
        Ok(payload) => payload,
        Err(e) => {
            metrics::counter!("powerwatch_heartbeats_malformed_total").increment(1);
            debug!("Rejected heartbeat: {}", e);
            return Err(e);
        }
    };

    if payload.key.as_deref() != Some(state.site.api_secret.as_str()) {
        metrics::counter!("powerwatch_heartbeats_unauthorized_total").increment(1);
        let source = source_address(&headers, peer.map(|ConnectInfo(addr)| addr));
        warn!("Heartbeat with invalid key from {}", source);
        state.notifier.send_auth_alert(&source).await;
        return Err(ApiError::Unauthorized);
    }

    let mut monitor = state.monitor.lock().await;
    let heartbeat = payload.into_heartbeat(state.clock.now());
    if let Some(transition) = monitor.on_heartbeat(&heartbeat).await {
        debug!("Heartbeat ended offline period: {}", transition.kind());
    }
    metrics::counter!("powerwatch_heartbeats_total").increment(1);

    Ok(StatusCode::NO_CONTENT)
}
