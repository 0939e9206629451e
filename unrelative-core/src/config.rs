//! Configuration loading and persistence
//!
//! Configuration is loaded from `~/.config/unrelative/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/unrelative/` (~/.config/unrelative/)
//! - State/Logs: `$XDG_STATE_HOME/unrelative/` (~/.local/state/unrelative/)
//!
//! The `[display]` section holds the user-facing timestamp settings. It is
//! written only by the settings panel; every open page session reads it once
//! at startup and afterwards receives changes as [`SettingsUpdate`] messages.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Time-of-day rendering mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeFormat {
    /// 12-hour only when the locale language is English
    #[default]
    #[serde(rename = "auto")]
    Auto,
    /// Force 12-hour with meridiem marker (`3:05PM`)
    #[serde(rename = "12h")]
    Hour12,
    /// Force 24-hour (`15:05`)
    #[serde(rename = "24h")]
    Hour24,
}

impl TimeFormat {
    /// Stable string form, used for display and for settings fingerprints.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFormat::Auto => "auto",
            TimeFormat::Hour12 => "12h",
            TimeFormat::Hour24 => "24h",
        }
    }
}

/// User-facing timestamp display settings (the `[display]` config section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Time-of-day rendering mode
    #[serde(default)]
    pub time_format: TimeFormat,

    /// Date pattern: `"auto"` for locale-aware short numeric, otherwise a
    /// token template using `YY`/`M`/`MM`/`D`/`DD`
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Tint each timestamp by its calendar day
    #[serde(default)]
    pub color_by_day: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            time_format: TimeFormat::default(),
            date_format: default_date_format(),
            color_by_day: false,
        }
    }
}

fn default_date_format() -> String {
    "auto".to_string()
}

impl Settings {
    /// Validate settings before persisting.
    ///
    /// Custom date patterns may only use the 2-digit year token; `YYYY` is
    /// rejected with the same message the settings panel shows.
    pub fn validate(&self) -> Result<()> {
        if self.date_format != "auto" && self.date_format.contains("YYYY") {
            return Err(Error::Config(
                "use YY (2-digit year) instead of YYYY".to_string(),
            ));
        }
        Ok(())
    }

    /// Merge only the fields present in an update message.
    pub fn apply_update(&mut self, update: &SettingsUpdate) {
        if let Some(time_format) = update.time_format {
            self.time_format = time_format;
        }
        if let Some(ref date_format) = update.date_format {
            self.date_format = date_format.clone();
        }
        if let Some(color_by_day) = update.color_by_day {
            self.color_by_day = color_by_day;
        }
    }

    /// Canonical single-line form, hashed into per-element fingerprints.
    pub fn canonical(&self) -> String {
        format!(
            "time={};date={};color={}",
            self.time_format.as_str(),
            self.date_format,
            self.color_by_day
        )
    }
}

/// Settings update broadcast to open page sessions after a successful save.
///
/// Every field is optional; receivers overwrite only the fields present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub time_format: Option<TimeFormat>,
    pub date_format: Option<String>,
    pub color_by_day: Option<bool>,
}

impl SettingsUpdate {
    /// Full update carrying every field, as the settings panel broadcasts.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            time_format: Some(settings.time_format),
            date_format: Some(settings.date_format.clone()),
            color_by_day: Some(settings.color_by_day),
        }
    }
}

/// Main configuration struct
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Timestamp display settings
    #[serde(default)]
    pub display: Settings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Persist configuration to the default path
    ///
    /// Validates first; nothing is written when validation fails, so open
    /// sessions keep whatever settings they had.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Persist configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.display.validate()?;

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;

        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/unrelative/config.toml` (~/.config/unrelative/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("unrelative").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/unrelative/` (~/.local/state/unrelative/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("unrelative")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/unrelative/unrelative.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("unrelative.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
