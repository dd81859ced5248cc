// SPDX-License-Identifier: GPL-3.0-only

//! Burst capture configuration
//!
//! All limits are fixed when the manager is constructed. Files are JSON and
//! may omit any field; missing fields take the defaults from [`crate::constants`].

use crate::constants::{self, QualityLevels};
use crate::errors::{BurstResult, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Buffer pool bucket layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferPoolConfig {
    /// Largest capacity (bytes) that belongs to the small bucket
    pub small_max_bytes: usize,
    /// Largest capacity (bytes) that belongs to the medium bucket
    pub medium_max_bytes: usize,
    /// Maximum buffers retained per bucket; extra recycled buffers are dropped
    pub max_pool_size: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            small_max_bytes: constants::pool::SMALL_BUFFER_MAX,
            medium_max_bytes: constants::pool::MEDIUM_BUFFER_MAX,
            max_pool_size: constants::pool::MAX_POOL_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurstConfig {
    /// Maximum captures executing concurrently
    pub max_parallel_captures: usize,
    /// Maximum admitted captures (queued + executing)
    pub max_total_captures: usize,
    /// Minimum spacing between dispatches while another capture is running
    pub min_capture_interval_ms: u64,
    /// Fallback tick of the queue driver
    pub poll_interval_ms: u64,
    /// Threads executing capture actions
    pub worker_threads: usize,
    /// Burst mode activates once pending captures exceed this value
    pub burst_threshold: usize,
    /// Usage ratio (0.0..=1.0) above which memory pressure is entered
    pub memory_pressure_threshold: f64,
    /// How often the driver re-samples memory usage
    pub memory_sample_interval_ms: u64,
    /// Quality value for each tier
    pub quality: QualityLevels,
    /// Buffer pool bucket layout
    pub buffer_pool: BufferPoolConfig,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            max_parallel_captures: constants::DEFAULT_MAX_PARALLEL_CAPTURES,
            max_total_captures: constants::DEFAULT_MAX_TOTAL_CAPTURES,
            min_capture_interval_ms: constants::DEFAULT_MIN_CAPTURE_INTERVAL_MS,
            poll_interval_ms: constants::DEFAULT_POLL_INTERVAL_MS,
            worker_threads: constants::DEFAULT_WORKER_THREADS,
            burst_threshold: constants::DEFAULT_BURST_THRESHOLD,
            memory_pressure_threshold: constants::DEFAULT_MEMORY_PRESSURE_THRESHOLD,
            memory_sample_interval_ms: constants::DEFAULT_MEMORY_SAMPLE_INTERVAL_MS,
            quality: QualityLevels::default(),
            buffer_pool: BufferPoolConfig::default(),
        }
    }
}

impl BurstConfig {
    /// Load a configuration from a JSON file and validate it
    pub fn load(path: &Path) -> BurstResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json(&contents)?;
        Ok(config)
    }

    /// Parse a configuration from a JSON string and validate it
    pub fn from_json(json: &str) -> BurstResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges and orderings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parallel_captures == 0 {
            return Err(out_of_range("max_parallel_captures", "must be at least 1"));
        }
        if self.max_total_captures < self.max_parallel_captures {
            return Err(out_of_range(
                "max_total_captures",
                format!(
                    "must be at least max_parallel_captures ({})",
                    self.max_parallel_captures
                ),
            ));
        }
        if self.worker_threads == 0 {
            return Err(out_of_range("worker_threads", "must be at least 1"));
        }
        if self.poll_interval_ms == 0 {
            return Err(out_of_range("poll_interval_ms", "must be at least 1"));
        }
        if !(self.memory_pressure_threshold > 0.0 && self.memory_pressure_threshold <= 1.0) {
            return Err(out_of_range(
                "memory_pressure_threshold",
                format!("{} is outside 0.0 (exclusive) to 1.0", self.memory_pressure_threshold),
            ));
        }
        if !self.quality.is_ordered() {
            return Err(ConfigError::UnorderedQuality);
        }
        let pool = &self.buffer_pool;
        if pool.small_max_bytes == 0 || pool.small_max_bytes >= pool.medium_max_bytes {
            return Err(ConfigError::InvalidBuckets {
                small: pool.small_max_bytes,
                medium: pool.medium_max_bytes,
            });
        }
        Ok(())
    }

    pub fn min_capture_interval(&self) -> Duration {
        Duration::from_millis(self.min_capture_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn memory_sample_interval(&self) -> Duration {
        Duration::from_millis(self.memory_sample_interval_ms)
    }
}

fn out_of_range(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::OutOfRange {
        field,
        message: message.into(),
    }
}
