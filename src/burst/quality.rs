// SPDX-License-Identifier: GPL-3.0-only

//! Load- and memory-aware output quality selection

use crate::constants::{HEAVY_LOAD_THRESHOLD, MODERATE_LOAD_THRESHOLD, QualityLevels, QualityTier};
use crate::memory::MemoryMonitor;
use std::sync::Arc;

/// Pick the quality tier for the current state
///
/// `load` is pending plus in-progress captures. The result never improves as
/// load grows while `under_pressure` stays the same.
pub fn select_tier(load: usize, under_pressure: bool, burst_mode: bool) -> QualityTier {
    if under_pressure {
        QualityTier::Low
    } else if load > HEAVY_LOAD_THRESHOLD {
        QualityTier::LowMedium
    } else if load > MODERATE_LOAD_THRESHOLD {
        QualityTier::Medium
    } else if burst_mode {
        QualityTier::Burst
    } else {
        QualityTier::Default
    }
}

/// Maps manager state to a quality value using live memory pressure
pub struct QualityAdapter {
    monitor: Arc<MemoryMonitor>,
    levels: QualityLevels,
}

impl QualityAdapter {
    pub fn new(monitor: Arc<MemoryMonitor>, levels: QualityLevels) -> Self {
        Self { monitor, levels }
    }

    /// Tier for the given load and burst flag, reading pressure without locking
    pub fn tier(&self, load: usize, burst_mode: bool) -> QualityTier {
        select_tier(load, self.monitor.is_under_pressure(), burst_mode)
    }

    pub fn quality(&self, load: usize, burst_mode: bool) -> f32 {
        self.levels.value(self.tier(load, burst_mode))
    }

    /// Quality restored whenever the system drains
    pub fn default_quality(&self) -> f32 {
        self.levels.default
    }
}
