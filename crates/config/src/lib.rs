//! Configuration loading, validation, and management for Troupe.
//!
//! Loads configuration from `~/.troupe/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.troupe/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding the SQLite store and cached artifacts.
    /// Created on first use if absent.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory bare character filenames are resolved against.
    #[serde(default = "default_characters_dir")]
    pub characters_dir: PathBuf,

    /// Direct Client (local message API) configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Memory watchdog configuration.
    #[serde(default)]
    pub watchdog: WatchdogConfig,

    /// Bring-up pacing configuration.
    #[serde(default)]
    pub bringup: BringupConfig,

    /// Console loop configuration.
    #[serde(default)]
    pub console: ConsoleConfig,

    /// Process-wide settings bag — the fallback source for provider
    /// tokens when a character's own secrets don't carry one.
    #[serde(default)]
    pub settings: HashMap<String, String>,
}

fn default_data_dir() -> PathBuf {
    dirs_home().join(".troupe").join("data")
}

fn default_characters_dir() -> PathBuf {
    PathBuf::from("characters")
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("data_dir", &self.data_dir)
            .field("characters_dir", &self.characters_dir)
            .field("server", &self.server)
            .field("watchdog", &self.watchdog)
            .field("bringup", &self.bringup)
            .field("console", &self.console)
            .field("settings", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Seconds between periodic memory samples.
    #[serde(default = "default_watchdog_interval")]
    pub interval_secs: u64,

    /// Bytes of resident memory at which a warning (and a cache-trim
    /// hint) fires.
    #[serde(default = "default_warning_bytes")]
    pub warning_bytes: u64,

    /// Bytes of resident memory at which the process tears down and
    /// exits non-zero.
    #[serde(default = "default_critical_bytes")]
    pub critical_bytes: u64,
}

fn default_watchdog_interval() -> u64 {
    60
}
fn default_warning_bytes() -> u64 {
    350 * 1024 * 1024
}
fn default_critical_bytes() -> u64 {
    375 * 1024 * 1024
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_watchdog_interval(),
            warning_bytes: default_warning_bytes(),
            critical_bytes: default_critical_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BringupConfig {
    /// Milliseconds to sleep between consecutive agent bring-ups, to
    /// bound burst resource use.
    #[serde(default = "default_agent_delay_ms")]
    pub agent_delay_ms: u64,
}

fn default_agent_delay_ms() -> u64 {
    2000
}

impl Default for BringupConfig {
    fn default() -> Self {
        Self {
            agent_delay_ms: default_agent_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Milliseconds to wait before re-arming the prompt after a round.
    #[serde(default = "default_rearm_delay_ms")]
    pub rearm_delay_ms: u64,
}

fn default_rearm_delay_ms() -> u64 {
    100
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            rearm_delay_ms: default_rearm_delay_ms(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.troupe/config.toml).
    ///
    /// Environment overrides applied after the file:
    /// - `TROUPE_DATA_DIR` replaces `data_dir`
    /// - `TROUPE_CHARACTERS_DIR` replaces `characters_dir`
    /// - `TROUPE_PORT` replaces `server.port`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(dir) = std::env::var("TROUPE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("TROUPE_CHARACTERS_DIR") {
            config.characters_dir = PathBuf::from(dir);
        }
        if let Ok(port) = std::env::var("TROUPE_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::ValidationError(format!("invalid TROUPE_PORT: {port}")))?;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".troupe")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.watchdog.warning_bytes >= self.watchdog.critical_bytes {
            return Err(ConfigError::ValidationError(
                "watchdog.warning_bytes must be below watchdog.critical_bytes".into(),
            ));
        }

        if self.watchdog.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "watchdog.interval_secs must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Look up a process-wide setting, preferring the config file's
    /// settings bag, then the environment.
    pub fn setting(&self, key: &str) -> Option<String> {
        self.settings
            .get(key)
            .cloned()
            .or_else(|| std::env::var(key).ok())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            characters_dir: default_characters_dir(),
            server: ServerConfig::default(),
            watchdog: WatchdogConfig::default(),
            bringup: BringupConfig::default(),
            console: ConsoleConfig::default(),
            settings: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
