//! Configuration for RelayKit
//!
//! Provides configuration file handling and validation.
//! Supports JSON and TOML file formats; the default location is in the
//! platform config directory.
//!
//! Configuration is organized into logical sections:
//! - RAM log geometry and capture level
//! - Event bus pool and queue sizes
//! - Scheduler tick interval
//! - Output and input channel tables

use relaykit_core::event_bus::{EventBusConfig, DEFAULT_MAX_MESSAGE_LEN, DEFAULT_POOL_SIZE, DEFAULT_QUEUE_DEPTH};
use relaykit_core::gpio::{validate_table, InputSpec, OutputSpec};
use relaykit_core::ramlog::{DEFAULT_CAPACITY, DEFAULT_SLOT_SIZE, MAX_CAPACITY, MIN_SLOT_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult, SettingsError, SettingsResult};

/// RAM log settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RamLogSettings {
    /// Ring buffer size in bytes
    pub capacity_bytes: usize,
    /// Slot size in bytes, header included
    pub slot_size: usize,
    /// Least severe level written to the ring (`error` .. `trace`)
    pub capture_level: String,
    /// Longest formatted log line in bytes
    pub max_line_len: usize,
}

impl Default for RamLogSettings {
    fn default() -> Self {
        Self {
            capacity_bytes: DEFAULT_CAPACITY,
            slot_size: DEFAULT_SLOT_SIZE,
            capture_level: "info".to_string(),
            max_line_len: 256,
        }
    }
}

impl RamLogSettings {
    /// Parsed capture level
    pub fn level(&self) -> ConfigResult<tracing::Level> {
        self.capture_level
            .parse()
            .map_err(|_| ConfigError::ValueOutOfRange {
                key: "ramlog.capture_level".to_string(),
                value: self.capture_level.clone(),
            })
    }
}

/// Event bus settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSettings {
    /// Number of push channels
    pub pool_size: usize,
    /// Message queue depth
    pub queue_depth: usize,
    /// Longest message payload in bytes
    pub max_message_len: usize,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }
}

impl From<&BusSettings> for EventBusConfig {
    fn from(settings: &BusSettings) -> Self {
        EventBusConfig {
            pool_size: settings.pool_size,
            queue_depth: settings.queue_depth,
            max_message_len: settings.max_message_len,
        }
    }
}

/// Scheduler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Interval between output ticks in milliseconds
    pub tick_interval_ms: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
        }
    }
}

impl SchedulerSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// RAM log settings
    pub ramlog: RamLogSettings,
    /// Event bus settings
    pub bus: BusSettings,
    /// Scheduler settings
    pub scheduler: SchedulerSettings,
    /// Output table
    pub outputs: Vec<OutputSpec>,
    /// Input table
    pub inputs: Vec<InputSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ramlog: RamLogSettings::default(),
            bus: BusSettings::default(),
            scheduler: SchedulerSettings::default(),
            outputs: vec![
                OutputSpec::new("led1", "GPIOB", 0),
                OutputSpec::new("led2", "GPIOE", 1),
                OutputSpec::new("led3", "GPIOB", 14),
            ],
            inputs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> ConfigResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// `<config dir>/relaykit/config.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        let dir = dirs::config_dir().ok_or_else(|| {
            SettingsError::ConfigDirectory("no platform config directory".to_string())
        })?;
        Ok(dir.join("relaykit").join("config.toml"))
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = Format::of(path)?;
        let content = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::LoadError(format!("{}: {}", path.display(), e)))?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load config from `path`, or use defaults if the file does not exist
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        // RAM log geometry
        let ramlog = &self.ramlog;
        if ramlog.slot_size < MIN_SLOT_SIZE {
            return Err(out_of_range("ramlog.slot_size", ramlog.slot_size));
        }
        if ramlog.capacity_bytes == 0
            || ramlog.capacity_bytes > MAX_CAPACITY
            || ramlog.capacity_bytes % ramlog.slot_size != 0
        {
            return Err(out_of_range("ramlog.capacity_bytes", ramlog.capacity_bytes));
        }
        if ramlog.max_line_len < 2 {
            return Err(out_of_range("ramlog.max_line_len", ramlog.max_line_len));
        }
        ramlog.level()?;

        // Event bus
        if self.bus.pool_size == 0 {
            return Err(out_of_range("bus.pool_size", self.bus.pool_size));
        }
        if self.bus.queue_depth == 0 {
            return Err(out_of_range("bus.queue_depth", self.bus.queue_depth));
        }
        if self.bus.max_message_len < 4 {
            return Err(out_of_range("bus.max_message_len", self.bus.max_message_len));
        }

        if self.scheduler.tick_interval_ms == 0 {
            return Err(out_of_range("scheduler.tick_interval_ms", 0));
        }

        // Channel tables
        validate_table(self.outputs.iter().map(|o| (o.name.as_str(), o.pin))).map_err(|source| {
            ConfigError::InvalidChannel {
                table: "outputs".to_string(),
                source,
            }
        })?;
        validate_table(self.inputs.iter().map(|i| (i.name.as_str(), i.pin))).map_err(|source| {
            ConfigError::InvalidChannel {
                table: "inputs".to_string(),
                source,
            }
        })?;

        Ok(())
    }

    /// Event bus configuration for this config
    pub fn bus_config(&self) -> EventBusConfig {
        EventBusConfig::from(&self.bus)
    }
}

fn out_of_range(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::ValueOutOfRange {
        key: key.to_string(),
        value: value.to_string(),
    }
}
