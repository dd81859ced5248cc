// SPDX-License-Identifier: GPL-3.0-only

//! Burst capture admission control for the camera
//!
//! Governs how rapid-fire photo capture requests are accepted, throttled and
//! sequenced, and adapts output quality to load and live memory pressure.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`burst`]: Admission control, queue processing and the public manager
//! - [`memory`]: Memory pressure monitoring and the reusable buffer pool
//! - [`config`]: Configuration loading and validation
//! - [`constants`]: Defaults and quality tiers
//! - [`errors`]: Error types
//!
//! The platform camera primitive is injected as a closure; this crate never
//! talks to camera hardware itself.
//!
//! # Example
//!
//! ```ignore
//! use burst_capture::{BurstCaptureManager, BurstConfig};
//!
//! let manager = BurstCaptureManager::new(BurstConfig::default())?;
//! manager.request_capture(|| backend.capture_photo(), |outcome| println!("{}", outcome));
//! ```

pub mod burst;
pub mod config;
pub mod constants;
pub mod errors;
pub mod memory;

// Re-export commonly used types
pub use burst::{BurstCaptureManager, BurstStatus, CaptureOutcome};
pub use config::{BufferPoolConfig, BurstConfig};
pub use constants::{QualityLevels, QualityTier};
pub use errors::{BurstError, BurstResult, CaptureError, ConfigError};
pub use memory::{BufferPool, MemoryMonitor, MemorySample, MemoryStatsProvider};
