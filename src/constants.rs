// SPDX-License-Identifier: GPL-3.0-only

//! Burst capture constants and quality tiers

use serde::{Deserialize, Serialize};

/// Maximum number of captures executing at the same time
pub const DEFAULT_MAX_PARALLEL_CAPTURES: usize = 2;

/// Maximum number of admitted captures (queued + executing)
pub const DEFAULT_MAX_TOTAL_CAPTURES: usize = 8;

/// Minimum spacing between two dispatches while a capture is still running
///
/// Gives the shutter time to settle before the next frame grab.
pub const DEFAULT_MIN_CAPTURE_INTERVAL_MS: u64 = 250;

/// Fallback tick of the queue driver
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Number of threads executing capture actions
pub const DEFAULT_WORKER_THREADS: usize = 2;

/// Burst mode activates once more than this many captures are pending
pub const DEFAULT_BURST_THRESHOLD: usize = 2;

/// Memory usage ratio above which the system is considered under pressure
pub const DEFAULT_MEMORY_PRESSURE_THRESHOLD: f64 = 0.80;

/// How often the queue driver re-samples memory usage
pub const DEFAULT_MEMORY_SAMPLE_INTERVAL_MS: u64 = 500;

/// Load above which quality drops to the low-medium tier
pub const HEAVY_LOAD_THRESHOLD: usize = 5;

/// Load above which quality drops to the medium tier
pub const MODERATE_LOAD_THRESHOLD: usize = 3;

/// Buffer pool constants
pub mod pool {
    /// Largest buffer (in bytes) kept in the small bucket
    pub const SMALL_BUFFER_MAX: usize = 16 * 1024;

    /// Largest buffer (in bytes) kept in the medium bucket
    pub const MEDIUM_BUFFER_MAX: usize = 1024 * 1024;

    /// Maximum number of buffers retained per bucket
    pub const MAX_POOL_SIZE: usize = 5;
}

/// Timing constants
pub mod timing {
    use std::time::Duration;

    /// How long `shutdown` waits for running captures before releasing the workers
    pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
}

/// Output quality tiers, ordered from most to least degraded
///
/// The adapter walks these tiers as load and memory pressure change, so
/// quality degrades gradually instead of flipping between two values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QualityTier {
    /// Memory pressure is active
    Low,
    /// More than five captures in flight
    LowMedium,
    /// More than three captures in flight
    Medium,
    /// Burst mode with light load
    Burst,
    /// Idle or light load
    Default,
}

impl QualityTier {
    /// All tiers from lowest to highest quality
    pub const ALL: [QualityTier; 5] = [
        QualityTier::Low,
        QualityTier::LowMedium,
        QualityTier::Medium,
        QualityTier::Burst,
        QualityTier::Default,
    ];

    /// Get display name for the tier
    pub fn display_name(&self) -> &'static str {
        match self {
            QualityTier::Low => "Low",
            QualityTier::LowMedium => "Low-Medium",
            QualityTier::Medium => "Medium",
            QualityTier::Burst => "Burst",
            QualityTier::Default => "Default",
        }
    }
}

/// Quality value assigned to each tier
///
/// Values are encoder quality factors in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityLevels {
    pub low: f32,
    pub low_medium: f32,
    pub medium: f32,
    pub burst: f32,
    pub default: f32,
}

impl QualityLevels {
    /// Quality value for a tier
    pub fn value(&self, tier: QualityTier) -> f32 {
        match tier {
            QualityTier::Low => self.low,
            QualityTier::LowMedium => self.low_medium,
            QualityTier::Medium => self.medium,
            QualityTier::Burst => self.burst,
            QualityTier::Default => self.default,
        }
    }

    /// Check that tiers are inside `0.0..=1.0` and never increase as the tier degrades
    pub fn is_ordered(&self) -> bool {
        let values = QualityTier::ALL.map(|tier| self.value(tier));
        values.iter().all(|v| (0.0..=1.0).contains(v))
            && values.windows(2).all(|pair| pair[0] <= pair[1])
    }
}

impl Default for QualityLevels {
    fn default() -> Self {
        Self {
            low: 0.60,
            low_medium: 0.70,
            medium: 0.80,
            burst: 0.85,
            default: 0.95,
        }
    }
}

/// Format a byte count for logs (e.g., "16 KiB" or "1.5 MiB")
pub fn format_bytes(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;

    let value = bytes as f64;
    if value >= MIB {
        let mib = value / MIB;
        if mib == mib.floor() {
            format!("{} MiB", mib as u64)
        } else {
            format!("{:.1} MiB", mib)
        }
    } else if value >= KIB {
        format!("{} KiB", (value / KIB).round() as u64)
    } else {
        format!("{} B", bytes)
    }
}
