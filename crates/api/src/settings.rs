//! Layered settings
//!
//! Built-in defaults, then an optional TOML file (`powerwatch.toml`, or the
//! path in `POWERWATCH_CONFIG`), then `POWERWATCH__SECTION__KEY` environment
//! variables.

use crate::rate_limit::RateLimitConfig;
use alerting::TelegramConfig;
use chrono::NaiveDate;
use config::{Config, Environment, File};
use outage_engine::MonitorConfig;
use reporting::DisplayZone;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;
use watchdog::WatchdogConfig;

const DEFAULT_CONFIG_FILE: &str = "powerwatch.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub site: SiteSettings,
    pub monitor: MonitorSettings,
    pub storage: StorageSettings,
    pub telegram: TelegramSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    /// Seconds to replenish one heartbeat request per client address
    pub ping_per_second: u64,
    pub ping_burst: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
            ping_per_second: 1,
            ping_burst: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    /// Shared secret the device sends as `key`
    pub api_secret: String,
    /// Shown at the top of every notification
    pub location_name: Option<String>,
    /// Fixed display offset such as `+02:00`; host local time when unset
    pub utc_offset: Option<String>,
    /// Statistics never reach back before this day
    pub history_floor: NaiveDate,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            api_secret: String::new(),
            location_name: None,
            utc_offset: None,
            history_floor: NaiveDate::from_ymd_opt(2026, 1, 26).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub silence_timeout_secs: u64,
    pub confirmation_threshold_minutes: f64,
    pub watchdog_interval_secs: u64,
    pub reboot_uptime_floor_secs: u64,
    pub reboot_backdate_floor_secs: u64,
    pub unobserved_outage_lead_secs: u64,
    pub min_reported_on_secs: u64,
    pub technical_keywords: Vec<String>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        let engine = MonitorConfig::default();
        Self {
            silence_timeout_secs: engine.silence_timeout_secs,
            confirmation_threshold_minutes: engine.confirmation_threshold_minutes,
            watchdog_interval_secs: WatchdogConfig::default().interval_secs,
            reboot_uptime_floor_secs: engine.reboot_uptime_floor_secs,
            reboot_backdate_floor_secs: engine.reboot_backdate_floor_secs,
            unobserved_outage_lead_secs: engine.unobserved_outage_lead_secs,
            min_reported_on_secs: engine.min_reported_on_secs,
            technical_keywords: engine.technical_keywords,
        }
    }
}

impl MonitorSettings {
    pub fn engine(&self) -> MonitorConfig {
        MonitorConfig {
            silence_timeout_secs: self.silence_timeout_secs,
            confirmation_threshold_minutes: self.confirmation_threshold_minutes,
            reboot_uptime_floor_secs: self.reboot_uptime_floor_secs,
            reboot_backdate_floor_secs: self.reboot_backdate_floor_secs,
            unobserved_outage_lead_secs: self.unobserved_outage_lead_secs,
            min_reported_on_secs: self.min_reported_on_secs,
            technical_keywords: self.technical_keywords.clone(),
        }
    }

    pub fn watchdog(&self) -> WatchdogConfig {
        WatchdogConfig {
            interval_secs: self.watchdog_interval_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub database_url: String,
    pub state_file: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://power_monitor.db".to_string(),
            state_file: PathBuf::from("system_state.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    pub token: Option<String>,
    pub chat_id: Option<i64>,
    /// Answer chat commands and buttons
    pub commands: bool,
    pub api_base: String,
    /// Upper bound on sends, edits and uploads
    pub request_timeout_secs: u64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            token: None,
            chat_id: None,
            commands: true,
            api_base: "https://api.telegram.org".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl TelegramSettings {
    /// Bot configuration, when both token and chat are set
    pub fn bot(&self) -> Option<TelegramConfig> {
        let token = self.token.as_deref().filter(|t| !t.trim().is_empty())?;
        let chat_id = self.chat_id?;
        let mut config = TelegramConfig::new(token, chat_id);
        config.api_base = self.api_base.clone();
        config.request_timeout_secs = self.request_timeout_secs;
        Some(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter, overridden by `RUST_LOG`
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Settings {
    /// Load from the default file location and the environment
    pub fn load() -> Result<Self, SettingsError> {
        let path = std::env::var("POWERWATCH_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self, SettingsError> {
        let settings: Settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("POWERWATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.site.api_secret.trim().is_empty() {
            return Err(SettingsError::Invalid("site.api_secret must be set".to_string()));
        }
        if self.monitor.confirmation_threshold_minutes < 0.0 {
            return Err(SettingsError::Invalid(
                "monitor.confirmation_threshold_minutes must not be negative".to_string(),
            ));
        }
        self.zone()?;
        Ok(())
    }

    pub fn zone(&self) -> Result<DisplayZone, SettingsError> {
        match &self.site.utc_offset {
            Some(offset) => DisplayZone::parse(offset).map_err(|e| SettingsError::Invalid(e.to_string())),
            None => Ok(DisplayZone::local()),
        }
    }

    pub fn ping_rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            per_second: self.server.ping_per_second.max(1),
            burst_size: self.server.ping_burst.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.bind, "0.0.0.0:5000");
        assert_eq!(settings.monitor.engine(), MonitorConfig::default());
        assert_eq!(settings.monitor.watchdog().interval_secs, 10);
        assert_eq!(settings.site.history_floor, NaiveDate::from_ymd_opt(2026, 1, 26).unwrap());
        assert!(settings.telegram.bot().is_none());
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let err = Settings::default().validate().unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(_)));
    }

    #[test]
    fn test_bad_offset_is_rejected() {
        let mut settings = Settings::default();
        settings.site.api_secret = "s".to_string();
        settings.site.utc_offset = Some("Mars/Olympus".to_string());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[site]
api_secret = "hunter2"
location_name = "Cottage"
utc_offset = "+02:00"

[monitor]
silence_timeout_secs = 240

[telegram]
token = "123:abc"
chat_id = -1001
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let settings = Settings::load_from(&path).unwrap();

        assert_eq!(settings.site.api_secret, "hunter2");
        assert_eq!(settings.site.location_name.as_deref(), Some("Cottage"));
        assert_eq!(settings.monitor.silence_timeout_secs, 240);
        assert_eq!(settings.monitor.confirmation_threshold_minutes, 5.0);
        let bot = settings.telegram.bot().unwrap();
        assert_eq!(bot.chat_id, -1001);
        assert_eq!(bot.request_timeout_secs, 10);
        assert_eq!(settings.zone().unwrap(), DisplayZone::parse("+02:00").unwrap());
    }
}
