// SPDX-License-Identifier: GPL-3.0-only

//! Burst capture admission control
//!
//! Accepts, throttles and sequences rapid-fire capture requests while
//! adapting output quality to load and memory pressure.
//!
//! # Components
//!
//! ```text
//! MemoryMonitor ──┐
//!                 ├──▶ QualityAdapter ──▶ AdmissionController ──▶ QueueProcessor
//! BufferPool ─────┘                                                   │
//!                                                         capture action (injected)
//! ```
//!
//! - [`admission`]: accept/reject decision and counters
//! - [`queue`]: driver loop and bounded worker pool
//! - [`quality`]: load and pressure to quality tier
//! - [`driver`]: driver thread lifecycle
//!
//! # Example
//!
//! ```ignore
//! let manager = BurstCaptureManager::new(BurstConfig::default())?;
//!
//! let accepted = manager.request_capture(
//!     move || camera.grab_frame().map_err(CaptureError::from),
//!     |outcome| info!(%outcome, "Burst frame done"),
//! );
//! if !accepted {
//!     // Saturated: surface backpressure to the user and retry later
//! }
//!
//! let quality = manager.optimal_quality();
//! ```

pub mod admission;
pub mod driver;
pub mod quality;
pub mod queue;
pub mod request;

pub use admission::{AdmissionController, AdmissionLimits, AdmissionSnapshot};
pub use quality::{QualityAdapter, select_tier};
pub use queue::QueueProcessor;
pub use request::{CaptureAction, CaptureOutcome, CompletionCallback};

use crate::config::BurstConfig;
use crate::errors::{BurstResult, CaptureError};
use crate::memory::{BufferPool, MemoryMonitor, MemoryStatsProvider, SystemMemoryProvider};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{debug, info};

/// Snapshot published to status subscribers after every state change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstStatus {
    pub pending: usize,
    pub in_progress: usize,
    pub burst_mode: bool,
    pub quality: f32,
    pub memory_pressure: bool,
    pub accepting: bool,
}

impl BurstStatus {
    pub fn load(&self) -> usize {
        self.pending + self.in_progress
    }

    pub fn is_idle(&self) -> bool {
        self.load() == 0
    }
}

/// Public entry point for burst capture
///
/// Owns the memory monitor, buffer pool, admission controller and queue
/// processor. Dropping the manager shuts it down.
pub struct BurstCaptureManager {
    config: BurstConfig,
    monitor: Arc<MemoryMonitor>,
    pool: Arc<BufferPool>,
    admission: Arc<AdmissionController>,
    processor: QueueProcessor,
    shut_down: AtomicBool,
}

impl BurstCaptureManager {
    /// Create a manager sampling system memory
    pub fn new(config: BurstConfig) -> BurstResult<Self> {
        Self::with_memory_provider(config, Arc::new(SystemMemoryProvider::new()))
    }

    /// Create a manager with a custom memory statistics source
    pub fn with_memory_provider(
        config: BurstConfig,
        provider: Arc<dyn MemoryStatsProvider>,
    ) -> BurstResult<Self> {
        config.validate()?;

        let pool = Arc::new(BufferPool::new(config.buffer_pool));
        let monitor = Arc::new(MemoryMonitor::new(
            provider,
            Arc::clone(&pool),
            config.memory_pressure_threshold,
        ));
        monitor.initialize();

        let adapter = QualityAdapter::new(Arc::clone(&monitor), config.quality);
        let admission = Arc::new(AdmissionController::new(
            AdmissionLimits::from(&config),
            adapter,
        ));
        let processor = match QueueProcessor::start(
            &config,
            Arc::clone(&admission),
            Arc::clone(&monitor),
            Arc::clone(&pool),
        ) {
            Ok(processor) => processor,
            Err(e) => {
                monitor.shutdown();
                return Err(e);
            }
        };
        // Pressure may have been entered before the listener existed
        admission.refresh_quality();

        info!(
            max_parallel = config.max_parallel_captures,
            max_total = config.max_total_captures,
            "Burst capture manager ready"
        );

        Ok(Self {
            config,
            monitor,
            pool,
            admission,
            processor,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Submit a capture
    ///
    /// Returns `false` when the manager is saturated or shut down; the caller
    /// decides whether to retry. Never blocks on capture work. Once accepted,
    /// `on_complete` runs exactly once after `action` finishes, unless the
    /// request is still queued when [`reset`](Self::reset) or
    /// [`shutdown`](Self::shutdown) drops it.
    pub fn request_capture<A, C>(&self, action: A, on_complete: C) -> bool
    where
        A: FnOnce() -> Result<(), CaptureError> + Send + 'static,
        C: FnOnce(CaptureOutcome) + Send + 'static,
    {
        self.processor
            .submit(Box::new(action), Box::new(on_complete))
    }

    /// Drop queued captures and return to the idle state
    ///
    /// Returns the number of dropped requests. Captures already running are
    /// unaffected and still report completion.
    pub fn reset(&self) -> usize {
        self.processor.reset()
    }

    pub fn is_burst_mode_active(&self) -> bool {
        self.admission.is_burst_mode_active()
    }

    /// Encoder quality to use for the next frame
    pub fn optimal_quality(&self) -> f32 {
        self.admission.quality()
    }

    pub fn status(&self) -> BurstStatus {
        self.processor.status()
    }

    /// Receive a new [`BurstStatus`] whenever it changes
    pub fn subscribe(&self) -> watch::Receiver<BurstStatus> {
        self.processor.subscribe()
    }

    /// Shared buffer pool for frame data
    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub fn memory_monitor(&self) -> &Arc<MemoryMonitor> {
        &self.monitor
    }

    pub fn config(&self) -> &BurstConfig {
        &self.config
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Stop accepting work and release the worker pool
    ///
    /// Queued captures are dropped. The manager cannot be restarted.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("Burst capture manager already shut down");
            return;
        }

        info!("Shutting down burst capture manager");
        self.processor.shutdown();
        self.monitor.shutdown();
        self.pool.clear();
    }
}

impl Drop for BurstCaptureManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
