//! Error types for playcore
//!
//! This module defines custom error types used throughout the library.
//! We use thiserror for convenient error type definitions and anyhow for
//! application-level error handling in the demo binary.
//!
//! Runtime playback failures never travel through these types: engine
//! faults and buffering timeouts reach the listener as error events, and
//! invalid call arguments are silent no-ops. This enum covers the
//! library's own fallible plumbing (configuration, worker startup, engine
//! instantiation).

use thiserror::Error;

/// Main error type for playcore
#[derive(Error, Debug)]
pub enum PlayCoreError {
    /// Engine backend errors (factory creation, prepare submission)
    #[error("Engine error: {0}")]
    Engine(String),

    /// Command or delivery worker errors
    #[error("Queue error: {0}")]
    Queue(String),

    /// Buffering watchdog errors
    #[error("Watchdog error: {0}")]
    Watchdog(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File error: {0}")]
    FileIO(#[from] std::io::Error),

    /// Generic error for unexpected situations
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlayCoreError {
    /// Create an engine error from string
    pub fn engine_error<S: Into<String>>(msg: S) -> Self {
        PlayCoreError::Engine(msg.into())
    }
}

/// Convenience type alias for Results in playcore
pub type Result<T> = std::result::Result<T, PlayCoreError>;

/// Extension trait for converting other errors to PlayCoreError
pub trait IntoCoreError<T> {
    /// Convert this error into a PlayCoreError with the given context
    fn engine_err(self, context: &str) -> Result<T>;
    fn queue_err(self, context: &str) -> Result<T>;
    fn watchdog_err(self, context: &str) -> Result<T>;
    fn config_err(self, context: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> IntoCoreError<T> for std::result::Result<T, E> {
    fn engine_err(self, context: &str) -> Result<T> {
        self.map_err(|e| PlayCoreError::Engine(format!("{}: {}", context, e)))
    }

    fn queue_err(self, context: &str) -> Result<T> {
        self.map_err(|e| PlayCoreError::Queue(format!("{}: {}", context, e)))
    }

    fn watchdog_err(self, context: &str) -> Result<T> {
        self.map_err(|e| PlayCoreError::Watchdog(format!("{}: {}", context, e)))
    }

    fn config_err(self, context: &str) -> Result<T> {
        self.map_err(|e| PlayCoreError::Config(format!("{}: {}", context, e)))
    }
}

/// Helper macro for creating internal errors with file and line information
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::utils::error::PlayCoreError::Internal(
            format!("{} at {}:{}", $msg, file!(), line!())
        )
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::utils::error::PlayCoreError::Internal(
            format!("{} at {}:{}", format!($fmt, $($arg)*), file!(), line!())
        )
    };
}
