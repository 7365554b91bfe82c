//! Utility module for playcore
//!
//! This module provides common utilities used throughout the library:
//! - Error handling with custom error types
//! - Configuration management
//! - Common helper functions

pub mod config;
pub mod error;

// Re-export commonly used items
pub use config::{Config, TimeoutConfig, PlaybackConfig, CacheConfig, GeneralConfig};
pub use error::{PlayCoreError, Result};

/// Initialize the controller configuration
///
/// Loads configuration from:
/// 1. Default values
/// 2. System configuration file
/// 3. User configuration file
/// 4. Environment variables
///
/// # Returns
///
/// Returns the loaded configuration or an error if loading fails
pub fn load_config() -> Result<Config> {
    Config::load()
}

/// Format a millisecond position for display
///
/// # Arguments
///
/// * `position_ms` - Position in milliseconds
///
/// # Returns
///
/// Formatted string in the format "HH:MM:SS" or "MM:SS" for positions under an hour
pub fn format_position(position_ms: i64) -> String {
    let total_secs = position_ms.max(0) / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
