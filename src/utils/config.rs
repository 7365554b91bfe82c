//! Configuration management for playcore
//!
//! This module handles loading and managing controller configuration
//! from various sources including config files and environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::utils::error::{PlayCoreError, Result};

/// Main controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Buffering timeout configuration
    pub timeout: TimeoutConfig,

    /// Playback defaults
    pub playback: PlaybackConfig,

    /// Media cache configuration
    pub cache: CacheConfig,

    /// General settings
    pub general: GeneralConfig,
}

/// Buffering timeout configuration
///
/// When enabled, a deadline is armed at prepare time and whenever the
/// engine reports that network buffering started. If the deadline elapses
/// the listener receives a synthesized error event with the reserved
/// timeout code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Enable the external buffering watchdog
    pub enabled: bool,

    /// Deadline in milliseconds
    pub millis: u64,
}

/// Playback defaults applied to new requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Default playback speed multiplier
    pub default_speed: f32,

    /// Loop playback by default
    pub looping: bool,

    /// Start every engine muted
    pub mute_on_start: bool,
}

/// Media cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable local caching of network streams
    pub enabled: bool,

    /// Cache directory; None selects the backend default
    pub directory: Option<PathBuf>,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: TimeoutConfig::default(),
            playback: PlaybackConfig::default(),
            cache: CacheConfig::default(),
            general: GeneralConfig::default(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            millis: 8000,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_speed: 1.0,
            looping: false,
            mute_on_start: false,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: None,
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from various sources
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. System config file (/etc/playcore/config.toml on Linux)
    /// 3. User config file (~/.config/playcore/config.toml on Linux)
    /// 4. Environment variables (PLAYCORE_* prefix)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Try to load system config
        if let Some(system_path) = Self::system_config_path() {
            if system_path.exists() {
                config.merge_from_file(&system_path)?;
            }
        }

        // Try to load user config
        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                config.merge_from_file(&user_path)?;
            }
        }

        // Apply environment variable overrides
        config.apply_env_overrides()?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to user config file
    pub fn save(&self) -> Result<()> {
        let path = Self::user_config_path()
            .ok_or_else(|| PlayCoreError::Config("Cannot determine user config path".to_string()))?;

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PlayCoreError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let toml = toml::to_string_pretty(self)
            .map_err(|e| PlayCoreError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&path, toml)
            .map_err(|e| PlayCoreError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Merge configuration from a TOML file
    pub fn merge_from_file(&mut self, path: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| PlayCoreError::Config(format!("Failed to read config file: {}", e)))?;

        let file_config: Config = toml::from_str(&contents)
            .map_err(|e| PlayCoreError::Config(format!("Failed to parse config file: {}", e)))?;

        // TODO: Implement proper merging logic instead of full replacement
        *self = file_config;

        Ok(())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        // Example: PLAYCORE_TIMEOUT_MILLIS=12000
        if let Ok(millis) = std::env::var("PLAYCORE_TIMEOUT_MILLIS") {
            self.timeout.millis = millis.parse()
                .map_err(|_| PlayCoreError::Config("Invalid PLAYCORE_TIMEOUT_MILLIS".to_string()))?;
        }

        if let Ok(enabled) = std::env::var("PLAYCORE_TIMEOUT_ENABLED") {
            self.timeout.enabled = enabled.parse()
                .map_err(|_| PlayCoreError::Config("Invalid PLAYCORE_TIMEOUT_ENABLED".to_string()))?;
        }

        if let Ok(speed) = std::env::var("PLAYCORE_DEFAULT_SPEED") {
            self.playback.default_speed = speed.parse()
                .map_err(|_| PlayCoreError::Config("Invalid PLAYCORE_DEFAULT_SPEED".to_string()))?;
        }

        if let Ok(dir) = std::env::var("PLAYCORE_CACHE_DIR") {
            self.cache.directory = Some(PathBuf::from(dir));
        }

        if let Ok(log_level) = std::env::var("PLAYCORE_LOG_LEVEL") {
            self.general.log_level = log_level;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate timeout deadline
        if self.timeout.millis == 0 {
            return Err(PlayCoreError::Config("Timeout must be non-zero".to_string()));
        }

        // Validate playback speed
        if !(self.playback.default_speed > 0.0 && self.playback.default_speed.is_finite()) {
            return Err(PlayCoreError::Config("Default speed must be a positive number".to_string()));
        }

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.general.log_level.as_str()) {
            return Err(PlayCoreError::Config(format!(
                "Invalid log level '{}', must be one of: {:?}",
                self.general.log_level,
                valid_log_levels
            )));
        }

        Ok(())
    }

    /// Get system config file path
    fn system_config_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        return Some(PathBuf::from("/etc/playcore/config.toml"));

        #[cfg(target_os = "windows")]
        return std::env::var("PROGRAMDATA").ok()
            .map(|p| PathBuf::from(p).join("playcore").join("config.toml"));

        #[cfg(target_os = "macos")]
        return Some(PathBuf::from("/Library/Application Support/playcore/config.toml"));

        #[allow(unreachable_code)]
        None
    }

    /// Get user config file path
    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("playcore").join("config.toml"))
    }
}
