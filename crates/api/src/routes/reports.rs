//! Read-only queries

use axum::{
    extract::{Query, State},
    http::header,
    response::{Html, IntoResponse},
    Json,
};
use reporting::{compute_stats, OutageInterval, StatsReport, StatsWindow, StatusSummary};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{ApiError, AppState};

/// Query parameters for the statistics endpoint
#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    /// `YYYY-MM-DD`, inclusive
    pub start: Option<String>,
    /// `YYYY-MM-DD`, inclusive
    pub end: Option<String>,
}

/// `GET /api/stats`
pub async fn stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatsQuery>,
) -> Result<Json<StatsReport>, ApiError> {
    let site = &state.site;
    let (monitor, now) = state.current_state().await;
    let window = StatsWindow::resolve(
        params.start.as_deref(),
        params.end.as_deref(),
        now,
        site.zone,
        site.history_floor,
    );

    let records = state.events.outages_overlapping(window.from, window.to).await?;
    Ok(Json(compute_stats(&monitor, &records, window, now, site.zone)))
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub data: Vec<OutageInterval>,
    pub count: usize,
}

/// `GET /api/history`
pub async fn history(State(state): State<Arc<AppState>>) -> Result<Json<HistoryResponse>, ApiError> {
    let data = state.history().await?;
    Ok(Json(HistoryResponse {
        count: data.len(),
        data,
    }))
}

/// `GET /api/report`
pub async fn daily_report(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let report = state.daily_report().await?;
    let disposition = format!("inline; filename=\"{}\"", report.file_name());
    let html = report.render_html(state.site.location_name.as_deref());
    Ok(([(header::CONTENT_DISPOSITION, disposition)], Html(html)))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub summary: StatusSummary,
    pub text: String,
    pub last_heartbeat_at: chrono::DateTime<chrono::Utc>,
}

/// `GET /api/status`
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let (monitor, now) = state.current_state().await;
    let summary = StatusSummary::from_state(&monitor, now);
    Json(StatusResponse {
        text: summary.render(state.site.zone),
        summary,
        last_heartbeat_at: monitor.last_heartbeat_at,
    })
}
