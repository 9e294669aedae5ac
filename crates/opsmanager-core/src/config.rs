//! Sentinel configuration system.
//!
//! Every section has serde defaults, so an empty or partial
//! `config.toml` still yields the stock dashboard cadence.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{OpsError, Result};

/// Fastest supported virtual clock, in virtual seconds per wall-clock second.
pub const MAX_TIME_SCALE: f64 = 1_000.0;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentinelConfig {
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl SentinelConfig {
    /// Load config from the default path (~/.opsmanager/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load and validate config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| OpsError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| OpsError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        tracing::debug!("⚙️ Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save config to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| OpsError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the OpsManager home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".opsmanager")
    }

    /// Reject values the timer components cannot honor.
    pub fn validate(&self) -> Result<()> {
        check_interval("stream.interval_secs", self.stream.interval_secs)?;
        check_interval("notifications.interval_secs", self.notifications.interval_secs)?;
        check_interval("notifications.ttl_secs", self.notifications.ttl_secs)?;
        check_interval("audit.duration_secs", self.audit.duration_secs)?;
        check_probability("stream.warning_probability", self.stream.warning_probability)?;
        check_probability("notifications.emit_probability", self.notifications.emit_probability)?;
        check_probability("notifications.alert_probability", self.notifications.alert_probability)?;

        if self.stream.capacity == 0 {
            return Err(OpsError::Config("stream.capacity must be at least 1".into()));
        }
        if self.runtime.resolution_ms == 0 {
            return Err(OpsError::Config("runtime.resolution_ms must be at least 1".into()));
        }
        let scale = self.runtime.time_scale;
        if !(scale.is_finite() && scale > 0.0 && scale <= MAX_TIME_SCALE) {
            return Err(OpsError::Config(format!(
                "runtime.time_scale must be within (0, {MAX_TIME_SCALE}], got {scale}"
            )));
        }
        Ok(())
    }
}

fn check_interval(name: &str, secs: u64) -> Result<()> {
    if secs == 0 {
        return Err(OpsError::Config(format!("{name} must be greater than zero")));
    }
    Ok(())
}

fn check_probability(name: &str, p: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&p) {
        return Err(OpsError::Config(format!("{name} must be within [0, 1], got {p}")));
    }
    Ok(())
}

/// Workflow event feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_stream_interval")]
    pub interval_secs: u64,
    /// Number of most recent events kept on screen.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_warning_probability")]
    pub warning_probability: f64,
    #[serde(default = "default_max_latency")]
    pub max_latency_minutes: u32,
}

fn default_stream_interval() -> u64 { 4 }
fn default_capacity() -> usize { 8 }
fn default_warning_probability() -> f64 { 0.15 }
fn default_max_latency() -> u32 { 59 }

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_stream_interval(),
            capacity: default_capacity(),
            warning_probability: default_warning_probability(),
            max_latency_minutes: default_max_latency(),
        }
    }
}

impl StreamConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Transient AI-finding notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_notify_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_emit_probability")]
    pub emit_probability: f64,
    #[serde(default = "default_alert_probability")]
    pub alert_probability: f64,
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
}

fn default_notify_interval() -> u64 { 10 }
fn default_emit_probability() -> f64 { 0.3 }
fn default_alert_probability() -> f64 { 0.5 }
fn default_ttl() -> u64 { 5 }

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_notify_interval(),
            emit_probability: default_emit_probability(),
            alert_probability: default_alert_probability(),
            ttl_secs: default_ttl(),
        }
    }
}

impl NotificationConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Simulated global audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_audit_duration")]
    pub duration_secs: u64,
}

fn default_audit_duration() -> u64 { 2 }

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_audit_duration(),
        }
    }
}

impl AuditConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

/// Wall-clock driver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// How often the driver advances the virtual timeline.
    #[serde(default = "default_resolution_ms")]
    pub resolution_ms: u64,
    /// Virtual seconds per wall-clock second.
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,
    /// Fixed RNG seed; random when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_resolution_ms() -> u64 { 250 }
fn default_time_scale() -> f64 { 1.0 }

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            resolution_ms: default_resolution_ms(),
            time_scale: default_time_scale(),
            seed: None,
        }
    }
}

impl RuntimeConfig {
    pub fn resolution(&self) -> Duration {
        Duration::from_millis(self.resolution_ms)
    }
}
