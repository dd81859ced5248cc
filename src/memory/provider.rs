// SPDX-License-Identifier: GPL-3.0-only

//! Memory statistics providers
//!
//! The monitor never talks to the OS directly; it samples whatever provider
//! it was built with. Platforms with their own memory API plug in here.

use std::sync::{Mutex, TryLockError};
use sysinfo::System;

/// A single memory usage sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    /// Bytes in use
    pub used_bytes: u64,
    /// Total bytes available to the process or system
    pub total_bytes: u64,
}

impl MemorySample {
    pub fn new(used_bytes: u64, total_bytes: u64) -> Self {
        Self {
            used_bytes,
            total_bytes,
        }
    }

    /// Fraction of memory in use, `0.0` when the total is unknown
    pub fn usage_ratio(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.used_bytes as f64 / self.total_bytes as f64).clamp(0.0, 1.0)
    }
}

/// Source of memory usage samples
///
/// Implementations must return quickly. Returning `None` means "no sample
/// right now" and leaves the pressure state untouched.
pub trait MemoryStatsProvider: Send + Sync {
    fn sample(&self) -> Option<MemorySample>;
}

/// System-wide memory statistics from the operating system
pub struct SystemMemoryProvider {
    system: Mutex<System>,
}

impl SystemMemoryProvider {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStatsProvider for SystemMemoryProvider {
    fn sample(&self) -> Option<MemorySample> {
        // Another thread is already sampling; skip rather than wait
        let mut system = match self.system.try_lock() {
            Ok(system) => system,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };

        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return None;
        }
        let used = total.saturating_sub(system.available_memory());
        Some(MemorySample::new(used, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_ratio() {
        assert_eq!(MemorySample::new(50, 100).usage_ratio(), 0.5);
        assert_eq!(MemorySample::new(10, 0).usage_ratio(), 0.0);
        assert_eq!(MemorySample::new(200, 100).usage_ratio(), 1.0);
    }

    #[test]
    fn test_system_provider_reports_sane_values() {
        let provider = SystemMemoryProvider::new();
        if let Some(sample) = provider.sample() {
            assert!(sample.total_bytes > 0);
            assert!(sample.used_bytes <= sample.total_bytes);
        }
    }
}
