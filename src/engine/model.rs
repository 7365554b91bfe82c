//! Playback request and engine option types for playcore
//!
//! This module defines the data carried into an engine when playback is
//! prepared: the immutable playback request built per prepare call, and
//! the ordered engine-specific option list that backends apply verbatim.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// A single playback request
///
/// Built once per prepare call and consumed exactly once by the prepare
/// command. The URL must be non-empty; prepare silently ignores requests
/// with an empty URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackRequest {
    /// Media URL (file path, HTTP(S) stream, ...)
    pub url: String,

    /// Request headers forwarded to network backends
    pub headers: HashMap<String, String>,

    /// Restart playback automatically at end of media
    pub looping: bool,

    /// Playback speed multiplier, must be positive
    pub speed: f32,

    /// Cache the stream locally while playing
    pub cache_enabled: bool,

    /// Cache directory; None selects the backend default
    pub cache_dir: Option<PathBuf>,

    /// Container extension override for URLs without a usable one
    pub forced_extension: Option<String>,
}

impl PlaybackRequest {
    /// Create a request for a URL with default settings
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            looping: false,
            speed: 1.0,
            cache_enabled: false,
            cache_dir: None,
            forced_extension: None,
        }
    }

    /// Set request headers
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Enable or disable looping
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Set the playback speed multiplier
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Enable caching, optionally into a specific directory
    pub fn with_cache(mut self, enabled: bool, dir: Option<PathBuf>) -> Self {
        self.cache_enabled = enabled;
        self.cache_dir = dir;
        self
    }

    /// Override the container extension
    pub fn with_forced_extension<S: Into<String>>(mut self, extension: S) -> Self {
        self.forced_extension = Some(extension.into());
        self
    }
}

/// Value of an engine option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OptionValue {
    /// Integer-valued option
    Int(i64),

    /// String-valued option
    Text(String),
}

/// A single engine-specific option
///
/// Options are opaque to the controller: they are stored in order and
/// handed to the engine verbatim at prepare time, never validated or
/// inspected here. The category namespace is defined by each backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOption {
    /// Backend-defined option category
    pub category: i32,

    /// Option name
    pub name: String,

    /// Option value
    pub value: OptionValue,
}

impl EngineOption {
    /// Create an integer-valued option
    pub fn int<S: Into<String>>(category: i32, name: S, value: i64) -> Self {
        Self {
            category,
            name: name.into(),
            value: OptionValue::Int(value),
        }
    }

    /// Create a string-valued option
    pub fn text<S: Into<String>, V: Into<String>>(category: i32, name: S, value: V) -> Self {
        Self {
            category,
            name: name.into(),
            value: OptionValue::Text(value.into()),
        }
    }
}
