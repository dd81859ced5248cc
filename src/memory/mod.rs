// SPDX-License-Identifier: GPL-3.0-only

//! Memory telemetry and buffer reuse
//!
//! - [`monitor`]: pressure flag with hysteresis, evicts the pool on pressure
//! - [`pool`]: size-bucketed buffer cache
//! - [`provider`]: memory statistics sources

pub mod monitor;
pub mod pool;
pub mod provider;

pub use monitor::{MemoryMonitor, PressureListener};
pub use pool::{BufferBucket, BufferPool, PoolStats};
pub use provider::{MemorySample, MemoryStatsProvider, SystemMemoryProvider};
