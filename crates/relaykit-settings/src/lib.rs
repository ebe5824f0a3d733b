//! RelayKit Settings Crate
//!
//! Handles runtime configuration: file loading and saving, defaults and
//! validation.

pub mod config;
pub mod error;

pub use config::{BusSettings, Config, RamLogSettings, SchedulerSettings};
pub use error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
