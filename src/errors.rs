// SPDX-License-Identifier: GPL-3.0-only

//! Error types for burst capture

use std::fmt;

/// Result type alias using BurstError
pub type BurstResult<T> = Result<T, BurstError>;

/// Main error type for constructing and configuring the burst manager
///
/// Capture-time problems never surface here: rejection is a plain `false`
/// and capture failures are delivered to the completion callback.
#[derive(Debug, Clone)]
pub enum BurstError {
    /// Configuration errors
    Config(ConfigError),
    /// Worker pool or driver thread could not be started
    Runtime(String),
    /// Filesystem errors (loading configuration)
    Io(String),
}

/// Configuration validation and parsing errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A numeric setting is outside its allowed range
    OutOfRange {
        field: &'static str,
        message: String,
    },
    /// Quality tiers are not ordered from low to default
    UnorderedQuality,
    /// Bucket boundaries are not increasing
    InvalidBuckets { small: usize, medium: usize },
    /// JSON could not be parsed
    Parse(String),
}

/// Errors reported by a capture action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Camera hardware is busy
    DeviceBusy,
    /// No frame was available from the driver
    NoFrameAvailable,
    /// Capture failed
    Failed(String),
}

impl fmt::Display for BurstError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BurstError::Config(e) => write!(f, "Configuration error: {}", e),
            BurstError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
            BurstError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::OutOfRange { field, message } => write!(f, "{}: {}", field, message),
            ConfigError::UnorderedQuality => write!(
                f,
                "quality tiers must satisfy low <= low_medium <= medium <= burst <= default within 0.0..=1.0"
            ),
            ConfigError::InvalidBuckets { small, medium } => write!(
                f,
                "small bucket limit ({}) must be non-zero and below medium bucket limit ({})",
                small, medium
            ),
            ConfigError::Parse(msg) => write!(f, "Invalid configuration file: {}", msg),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::DeviceBusy => write!(f, "Camera is busy"),
            CaptureError::NoFrameAvailable => write!(f, "No frame available for capture"),
            CaptureError::Failed(msg) => write!(f, "Capture failed: {}", msg),
        }
    }
}

impl std::error::Error for BurstError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for CaptureError {}

impl From<ConfigError> for BurstError {
    fn from(err: ConfigError) -> Self {
        BurstError::Config(err)
    }
}

impl From<std::io::Error> for BurstError {
    fn from(err: std::io::Error) -> Self {
        BurstError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BurstError {
    fn from(err: serde_json::Error) -> Self {
        BurstError::Config(ConfigError::Parse(err.to_string()))
    }
}

impl From<String> for CaptureError {
    fn from(msg: String) -> Self {
        CaptureError::Failed(msg)
    }
}

impl From<&str> for CaptureError {
    fn from(msg: &str) -> Self {
        CaptureError::Failed(msg.to_string())
    }
}
