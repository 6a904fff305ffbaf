//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `host.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! ```text
//!     this is the HOST's own configuration (paths, cadence, ports). the
//!     fridge settings (target temperature, pid gains) live in the settings
//!     file managed by settings.rs and change at runtime.
//! ```
//!
//! structure:
//!     - PollingConfig: How often the sampler ticks.
//!     - StorageConfig: Where settings and daily logs live, and which calendar names the days.
//!     - RetentionConfig: How long daily logs are kept and how they are pruned.
//!     - SensorsConfig: Which sensor source to use and its named channels.
//!     - ServerConfig: Bind address and control endpoint policy.
//!     - LoggingConfig: Level and output format.
//!
//! ==============================================================================

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use tracing::{info, warn};

/// env var that points at an explicit host.toml
pub const CONFIG_ENV: &str = "FRIDGE_CONFIG";

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HostConfig {
    pub polling: PollingConfig,
    pub storage: StorageConfig,
    pub retention: RetentionConfig,
    pub sensors: SensorsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

/// which calendar decides the day a record belongs to
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CalendarZone {
    #[default]
    Local,
    Utc,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub settings_path: PathBuf,
    pub log_dir: PathBuf,
    pub calendar: CalendarZone,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            settings_path: PathBuf::from("/etc/fridge.json"),
            log_dir: PathBuf::from("logs"),
            calendar: CalendarZone::Local,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetentionStrategy {
    /// delete every day log on or before the cutoff
    #[default]
    Scan,
    /// delete only the log dated exactly `days` ago
    ExactDay,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetentionConfig {
    pub days: u32,
    pub sweep_interval_hours: u64,
    pub strategy: RetentionStrategy,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: 7,
            sweep_interval_hours: 24,
            strategy: RetentionStrategy::Scan,
        }
    }
}

impl RetentionConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_hours.max(1) * 3600)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SensorSource {
    /// 1-wire probes under /sys/bus/w1/devices
    W1,
    /// status json written by the controller process
    Context,
    #[default]
    Mock,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ChannelConfig {
    pub name: String,
    /// 1-wire device id (e.g. "10-0008039a5582") or an absolute w1_slave path
    pub device: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SensorsConfig {
    pub source: SensorSource,
    pub inside_channel: String,
    pub outside_channel: String,
    pub w1_root: PathBuf,
    pub context_path: PathBuf,
    pub channels: Vec<ChannelConfig>,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            source: SensorSource::Mock,
            inside_channel: "inside".to_string(),
            outside_channel: "outside".to_string(),
            w1_root: PathBuf::from("/sys/bus/w1/devices"),
            context_path: PathBuf::from("/var/log/fridge-status.json"),
            channels: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// reject control requests that leave out any of the four settings
    pub require_all_fields: bool,
    /// env var holding the control api key
    pub api_key_env: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            require_all_fields: false,
            api_key_env: "API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl HostConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: HostConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;

        Ok(config)
    }

    /// Load with default fallback
    ///
    /// an explicit `FRIDGE_CONFIG` path must load; the well-known paths are
    /// best effort. runs before logging is set up, so the outcome is
    /// returned as a note for the caller to log.
    pub fn load_or_default() -> anyhow::Result<(Self, String)> {
        if let Ok(explicit) = std::env::var(CONFIG_ENV) {
            let config = Self::load(&explicit)?;
            return Ok((config, format!("loaded from {explicit}")));
        }

        let paths = [
            PathBuf::from("config").join("host.toml"),
            PathBuf::from("..").join("config").join("host.toml"),
        ];

        let mut failures = Vec::new();
        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => return Ok((config, format!("loaded from {}", path.display()))),
                    Err(e) => failures.push(format!("{e:#}")),
                }
            }
        }

        if failures.is_empty() {
            Ok((Self::default(), "no config file found, using defaults".to_string()))
        } else {
            Ok((Self::default(), format!("{}; using defaults", failures.join("; "))))
        }
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        info!(
            interval_ms = self.polling.interval_ms,
            settings = %self.storage.settings_path.display(),
            log_dir = %self.storage.log_dir.display(),
            retention_days = self.retention.days,
            sensors = ?self.sensors.source,
            bind = %self.server.bind,
            "host configuration"
        );
        if self.sensors.source == SensorSource::Mock {
            warn!("using mock sensors (no hardware access)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: HostConfig = toml::from_str("").unwrap();
        assert_eq!(config.polling.interval_ms, 1000);
        assert_eq!(config.retention.days, 7);
        assert_eq!(config.retention.strategy, RetentionStrategy::Scan);
        assert_eq!(config.storage.calendar, CalendarZone::Local);
        assert_eq!(config.server.bind, "0.0.0.0:3000");
    }

    #[test]
    fn parses_a_full_host_toml() {
        let config: HostConfig = toml::from_str(
            r#"
            [polling]
            interval_ms = 500

            [storage]
            settings_path = "/home/pi/fridge.json"
            log_dir = "/var/lib/fridge/logs"
            calendar = "utc"

            [retention]
            days = 14
            strategy = "exact_day"

            [sensors]
            source = "w1"

            [[sensors.channels]]
            name = "inside"
            device = "10-0008039a5582"

            [[sensors.channels]]
            name = "outside"
            device = "10-0008039e9723"

            [server]
            require_all_fields = true

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.polling.interval(), Duration::from_millis(500));
        assert_eq!(config.storage.calendar, CalendarZone::Utc);
        assert_eq!(config.retention.days, 14);
        assert_eq!(config.retention.strategy, RetentionStrategy::ExactDay);
        assert_eq!(config.retention.sweep_interval(), Duration::from_secs(24 * 3600));
        assert_eq!(config.sensors.source, SensorSource::W1);
        assert_eq!(config.sensors.channels.len(), 2);
        assert_eq!(config.sensors.channels[1].device, "10-0008039e9723");
        assert!(config.server.require_all_fields);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn load_reports_the_failing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.toml");
        std::fs::write(&path, "[polling]\ninterval_ms = \"fast\"\n").unwrap();
        let err = HostConfig::load(&path).unwrap_err();
        assert!(format!("{err}").contains("host.toml"));
    }
}
