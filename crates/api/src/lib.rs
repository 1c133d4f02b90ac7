//! Power Monitor Service
//!
//! HTTP surface and process bootstrap:
//! - `POST /ping` heartbeat ingestion
//! - Statistics, history, daily report and status queries
//! - Health and Prometheus metrics
//! - Optional Telegram command listener

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use monitor_state::{MonitorState, StateFile};
use reporting::{recent_history, DailyReport, DisplayZone, OutageInterval, HISTORY_LIMIT};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use storage::{EventStore, SqliteRepository, StorageError};
use tower_governor::GovernorLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use alerting::{ChatTransport, MemoryTransport, NotificationDispatcher, TelegramTransport};
use outage_engine::{Clock, OutageStateMachine, SharedMonitor, SystemClock};
use watchdog::Watchdog;

pub mod commands;
pub mod error;
pub mod rate_limit;
mod routes;
pub mod settings;

pub use error::ApiError;
pub use settings::{LoggingSettings, Settings, SettingsError};

use rate_limit::{create_governor_config, RateLimitConfig};

/// Site-specific values handlers need
#[derive(Debug, Clone)]
pub struct SiteContext {
    pub api_secret: String,
    pub location_name: Option<String>,
    pub zone: DisplayZone,
    pub history_floor: NaiveDate,
}

/// Application state shared across handlers
pub struct AppState {
    pub monitor: SharedMonitor,
    pub events: Arc<dyn EventStore>,
    pub notifier: Arc<NotificationDispatcher>,
    pub clock: Arc<dyn Clock>,
    pub site: SiteContext,
    /// Prometheus handle, when the recorder is installed
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        monitor: SharedMonitor,
        events: Arc<dyn EventStore>,
        notifier: Arc<NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        site: SiteContext,
    ) -> Self {
        Self {
            monitor,
            events,
            notifier,
            clock,
            site,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Copy of the monitor state and the instant it was taken
    pub async fn current_state(&self) -> (MonitorState, DateTime<Utc>) {
        let monitor = self.monitor.lock().await;
        (monitor.state().clone(), self.clock.now())
    }

    /// The most recent outages, the in-progress one first
    pub async fn history(&self) -> Result<Vec<OutageInterval>, StorageError> {
        let records = self.events.recent_outages(HISTORY_LIMIT).await?;
        let (state, now) = self.current_state().await;
        Ok(recent_history(&state, &records, now))
    }

    pub async fn daily_report(&self) -> Result<DailyReport, StorageError> {
        let (state, now) = self.current_state().await;
        let zone = self.site.zone;
        let day_start = zone.start_of_day(zone.date_of(now));
        let records = self.events.outages_overlapping(day_start, now).await?;
        Ok(DailyReport::build(&state, &records, now, zone))
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentStatus,
}

#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub monitor: ComponentHealth,
    pub database: ComponentHealth,
}

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub detail: Option<String>,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>, ping_limit: &RateLimitConfig) -> Router {
    let ping = match create_governor_config(ping_limit) {
        Some(config) => post(routes::heartbeat::ingest).layer(GovernorLayer { config }),
        None => {
            warn!("Invalid heartbeat rate limit {:?}, limiting disabled", ping_limit);
            post(routes::heartbeat::ingest)
        }
    };

    Router::new()
        .route("/ping", ping)
        .route("/api/stats", get(routes::reports::stats))
        .route("/api/history", get(routes::reports::history))
        .route("/api/report", get(routes::reports::daily_report))
        .route("/api/status", get(routes::reports::status))
        .route("/api/v1/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (monitor, now) = state.current_state().await;
    let database = match state.events.recent_outages(1).await {
        Ok(_) => ComponentHealth {
            status: "ok".to_string(),
            detail: None,
        },
        Err(e) => ComponentHealth {
            status: "error".to_string(),
            detail: Some(e.to_string()),
        },
    };
    let healthy = database.status == "ok";

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        timestamp: now.timestamp(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: ComponentStatus {
            monitor: ComponentHealth {
                status: "ok".to_string(),
                detail: Some(format!("{:?} since last heartbeat at {}", monitor.phase(), monitor.last_heartbeat_at)),
            },
            database,
        },
    };

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response))
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}

/// Initialize logging. `RUST_LOG` overrides the configured level.
pub fn init_logging(settings: &LoggingSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&settings.level))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let result = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))
}

/// Wire every component from `settings` and serve until Ctrl-C.
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let zone = settings.zone()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let repository = Arc::new(SqliteRepository::connect(&settings.storage.database_url).await?);
    let events: Arc<dyn EventStore> = repository.clone();
    let snapshots = Arc::new(StateFile::new(&settings.storage.state_file));

    let telegram = match settings.telegram.bot() {
        Some(config) => Some(Arc::new(TelegramTransport::new(config)?)),
        None => {
            warn!("Telegram not configured, notifications are only logged");
            None
        }
    };
    let transport: Arc<dyn ChatTransport> = match &telegram {
        Some(bot) => bot.clone(),
        None => Arc::new(MemoryTransport::new()),
    };

    let notifier = Arc::new(NotificationDispatcher::new(
        transport,
        settings.site.location_name.clone(),
        zone,
    ));
    let monitor = OutageStateMachine::new(
        settings.monitor.engine(),
        events.clone(),
        snapshots,
        notifier.clone(),
        clock.now(),
    )
    .into_shared();

    let watchdog = Arc::new(Watchdog::new(monitor.clone(), clock.clone(), settings.monitor.watchdog()));
    let watchdog_task = watchdog.clone().spawn();

    let site = SiteContext {
        api_secret: settings.site.api_secret.clone(),
        location_name: settings.site.location_name.clone(),
        zone,
        history_floor: settings.site.history_floor,
    };
    let mut app_state = AppState::new(monitor, events, notifier, clock, site);
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => app_state = app_state.with_metrics(handle),
        Err(e) => warn!("Metrics recorder not installed: {}", e),
    }
    let app_state = Arc::new(app_state);

    if let (Some(bot), true) = (telegram, settings.telegram.commands) {
        let handler = commands::CommandHandler::new(app_state.clone());
        tokio::spawn(commands::run_listener(bot, handler));
    }

    let app = create_router(app_state, &settings.ping_rate_limit());

    info!("Starting API server on {}", settings.server.bind);
    let listener = tokio::net::TcpListener::bind(&settings.server.bind).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    watchdog.stop();
    watchdog_task.abort();
    repository.close().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
