// SPDX-License-Identifier: GPL-3.0-only

//! Memory pressure monitor
//!
//! Tracks a single pressure flag with hysteresis:
//!
//! ```text
//!             usage > threshold  or  signal_low_memory()
//!   Normal ─────────────────────────────────────────────▶ Pressure
//!     ▲                                                     │
//!     └──────────────── sample with usage ≤ threshold ◀─────┘
//! ```
//!
//! A low-memory signal forces the flag on even when the sampled usage is
//! below the threshold; only a later sample clears it again.
//!
//! Entering pressure empties the buffer pool before any listener runs.

use super::pool::BufferPool;
use super::provider::{MemorySample, MemoryStatsProvider};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Callback run on every pressure transition with the new state
///
/// Listeners run outside the listener lock and may register further listeners.
pub type PressureListener = Arc<dyn Fn(bool) + Send + Sync>;

pub struct MemoryMonitor {
    provider: Arc<dyn MemoryStatsProvider>,
    pool: Arc<BufferPool>,
    threshold: f64,
    active: AtomicBool,
    under_pressure: AtomicBool,
    /// Last sampled usage ratio as `f64` bits
    last_ratio: AtomicU64,
    listeners: Mutex<Vec<PressureListener>>,
}

impl MemoryMonitor {
    /// Create a monitor; it stays inert until [`MemoryMonitor::initialize`]
    pub fn new(
        provider: Arc<dyn MemoryStatsProvider>,
        pool: Arc<BufferPool>,
        threshold: f64,
    ) -> Self {
        Self {
            provider,
            pool,
            threshold,
            active: AtomicBool::new(false),
            under_pressure: AtomicBool::new(false),
            last_ratio: AtomicU64::new(0f64.to_bits()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Start monitoring and take the first sample
    pub fn initialize(&self) {
        if self.active.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(threshold = self.threshold, "Memory monitor initialized");
        self.update_memory_status();
    }

    /// Stop monitoring, clear the pressure flag and drop all listeners
    pub fn shutdown(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        self.under_pressure.store(false, Ordering::SeqCst);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        info!("Memory monitor shut down");
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Lock-free read of the pressure flag
    pub fn is_under_pressure(&self) -> bool {
        self.under_pressure.load(Ordering::Relaxed)
    }

    /// Usage ratio of the most recent sample
    pub fn last_usage_ratio(&self) -> f64 {
        f64::from_bits(self.last_ratio.load(Ordering::Relaxed))
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Sample memory and update the pressure flag
    ///
    /// Cheap enough to call before every large allocation. Returns the
    /// pressure state after the update.
    pub fn update_memory_status(&self) -> bool {
        if !self.is_active() {
            return self.is_under_pressure();
        }

        let Some(sample) = self.provider.sample() else {
            return self.is_under_pressure();
        };
        self.apply_sample(sample)
    }

    /// Platform low-memory notification
    ///
    /// Forces pressure on regardless of the last sampled usage.
    pub fn signal_low_memory(&self) {
        if !self.is_active() {
            debug!("Ignoring low-memory signal, monitor not active");
            return;
        }
        warn!("Low-memory signal received");
        self.enter_pressure(self.last_usage_ratio());
    }

    /// Register a callback run on every pressure transition
    pub fn add_pressure_listener(&self, listener: PressureListener) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    fn apply_sample(&self, sample: MemorySample) -> bool {
        let ratio = sample.usage_ratio();
        self.last_ratio.store(ratio.to_bits(), Ordering::Relaxed);

        if ratio > self.threshold {
            self.enter_pressure(ratio);
            true
        } else {
            self.exit_pressure(ratio);
            false
        }
    }

    fn enter_pressure(&self, ratio: f64) {
        if self
            .under_pressure
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        warn!(
            usage = ratio,
            threshold = self.threshold,
            pooled_bytes = self.pool.pooled_bytes(),
            "Entering memory pressure, evicting buffer pool"
        );
        self.pool.clear();
        self.notify(true);
    }

    fn exit_pressure(&self, ratio: f64) {
        if self
            .under_pressure
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        info!(usage = ratio, threshold = self.threshold, "Memory pressure relieved");
        self.notify(false);
    }

    fn notify(&self, under_pressure: bool) {
        let listeners: Vec<PressureListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener(under_pressure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Provider returning whatever usage the test sets
    struct FixedProvider {
        used: AtomicU64,
    }

    impl FixedProvider {
        fn new(used: u64) -> Arc<Self> {
            Arc::new(Self {
                used: AtomicU64::new(used),
            })
        }

        fn set(&self, used: u64) {
            self.used.store(used, Ordering::SeqCst);
        }
    }

    impl MemoryStatsProvider for FixedProvider {
        fn sample(&self) -> Option<MemorySample> {
            Some(MemorySample::new(self.used.load(Ordering::SeqCst), 100))
        }
    }

    fn monitor_with(provider: Arc<FixedProvider>) -> (MemoryMonitor, Arc<BufferPool>) {
        let pool = Arc::new(BufferPool::default());
        let monitor = MemoryMonitor::new(provider, Arc::clone(&pool), 0.80);
        monitor.initialize();
        (monitor, pool)
    }

    #[test]
    fn test_enter_and_exit_pressure() {
        let provider = FixedProvider::new(50);
        let (monitor, _pool) = monitor_with(Arc::clone(&provider));
        assert!(!monitor.is_under_pressure());

        provider.set(81);
        assert!(monitor.update_memory_status());

        provider.set(80);
        assert!(!monitor.update_memory_status(), "Exit happens at exactly the threshold");
    }

    #[test]
    fn test_low_memory_signal_holds_until_next_sample() {
        let provider = FixedProvider::new(40);
        let (monitor, _pool) = monitor_with(Arc::clone(&provider));

        monitor.signal_low_memory();
        assert!(monitor.is_under_pressure());

        assert!(!monitor.update_memory_status());
    }

    #[test]
    fn test_entering_pressure_clears_pool() {
        let provider = FixedProvider::new(10);
        let (monitor, pool) = monitor_with(Arc::clone(&provider));
        pool.recycle(Vec::with_capacity(1024));
        pool.recycle(Vec::with_capacity(2 * 1024 * 1024));

        provider.set(95);
        monitor.update_memory_status();

        assert_eq!(pool.total_len(), 0);
    }

    #[test]
    fn test_listeners_fire_once_per_transition() {
        let provider = FixedProvider::new(10);
        let (monitor, _pool) = monitor_with(Arc::clone(&provider));
        let transitions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&transitions);
        monitor.add_pressure_listener(Arc::new(move |_: bool| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        provider.set(90);
        monitor.update_memory_status();
        monitor.update_memory_status();
        monitor.signal_low_memory();
        provider.set(20);
        monitor.update_memory_status();
        monitor.update_memory_status();

        assert_eq!(transitions.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listener_can_register_listener() {
        let provider = FixedProvider::new(10);
        let (monitor, _pool) = monitor_with(Arc::clone(&provider));
        let monitor = Arc::new(monitor);
        let late_calls = Arc::new(AtomicUsize::new(0));

        let weak = Arc::downgrade(&monitor);
        let late = Arc::clone(&late_calls);
        monitor.add_pressure_listener(Arc::new(move |_: bool| {
            if let Some(monitor) = weak.upgrade() {
                let late = Arc::clone(&late);
                monitor.add_pressure_listener(Arc::new(move |_: bool| {
                    late.fetch_add(1, Ordering::SeqCst);
                }));
            }
        }));

        provider.set(90);
        assert!(monitor.update_memory_status());

        // Registered during the first transition, runs from the second on
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
        provider.set(20);
        assert!(!monitor.update_memory_status());
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_inactive_monitor_does_not_sample() {
        let provider = FixedProvider::new(99);
        let pool = Arc::new(BufferPool::default());
        let monitor = MemoryMonitor::new(provider, pool, 0.80);

        assert!(!monitor.update_memory_status());
        monitor.initialize();
        assert!(monitor.is_under_pressure());

        monitor.shutdown();
        assert!(!monitor.is_under_pressure());
        assert!(!monitor.is_active());
    }
}
