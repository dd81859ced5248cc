// SPDX-License-Identifier: GPL-3.0-only

//! Queue processing onto the capture worker pool
//!
//! ```text
//! request_capture ──▶ AdmissionController ──(slot free?)──▶ dispatch
//!                            │                                 │
//!                            ▼                                 ▼
//!                    queue (FIFO) ◀── driver tick / wake   worker pool
//!                                                              │
//!                        complete() ◀── always, even on panic ─┘
//! ```
//!
//! Capture actions run on a tokio blocking pool capped at the configured
//! worker count. Completion bookkeeping runs on the same worker right after
//! the action returns, so it still happens when the worker pool is shutting
//! down.

use super::BurstStatus;
use super::admission::{Admission, AdmissionController, Dispatch};
use super::driver::{DriverWaker, LoopAction, QueueDriver};
use super::request::{CaptureAction, CaptureOutcome, CaptureRequest, CompletionCallback};
use crate::config::BurstConfig;
use crate::constants::timing::SHUTDOWN_GRACE;
use crate::errors::{BurstError, BurstResult};
use crate::memory::{BufferPool, MemoryMonitor};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::runtime::{self, Handle, Runtime};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// State shared between the driver thread, the workers and the facade
struct Shared {
    admission: Arc<AdmissionController>,
    monitor: Arc<MemoryMonitor>,
    pool: Arc<BufferPool>,
    workers: Handle,
    waker: OnceLock<DriverWaker>,
    status: watch::Sender<BurstStatus>,
    sample_interval: Duration,
    last_sample: Mutex<Instant>,
}

impl Shared {
    fn wake(&self) {
        if let Some(waker) = self.waker.get() {
            waker.wake();
        }
    }

    /// One driver iteration: refresh memory if due, then drain what may start
    fn tick(self: &Arc<Self>) {
        if self.memory_sample_due() {
            self.monitor.update_memory_status();
        }
        self.pump();
    }

    fn memory_sample_due(&self) -> bool {
        let mut last = self.last_sample.lock().unwrap_or_else(PoisonError::into_inner);
        if last.elapsed() >= self.sample_interval {
            *last = Instant::now();
            true
        } else {
            false
        }
    }

    fn pump(self: &Arc<Self>) {
        while let Some(dispatch) = self.admission.next_dispatch(Instant::now()) {
            self.dispatch(dispatch);
        }
        self.publish_status();
    }

    fn dispatch(self: &Arc<Self>, dispatch: Dispatch) {
        if self.monitor.is_under_pressure() {
            debug!("Memory pressure before dispatch, clearing buffer pool");
            self.pool.clear();
        }

        let Dispatch { request, epoch } = dispatch;
        let CaptureRequest {
            id,
            action,
            on_complete,
            admitted_at,
        } = request;

        debug!(
            id,
            queued_ms = admitted_at.elapsed().as_millis() as u64,
            "Dispatching capture"
        );

        let shared = Arc::clone(self);
        // Detached: completion is reported through the callback
        drop(self.workers.spawn_blocking(move || {
            let started = Instant::now();
            let outcome = match panic::catch_unwind(AssertUnwindSafe(action)) {
                Ok(Ok(())) => CaptureOutcome::Completed,
                Ok(Err(e)) => CaptureOutcome::Failed(e),
                Err(payload) => CaptureOutcome::from_panic(payload),
            };
            shared.finish(id, epoch, started.elapsed(), outcome, on_complete);
        }));
    }

    fn finish(
        &self,
        id: u64,
        epoch: u64,
        elapsed: Duration,
        outcome: CaptureOutcome,
        on_complete: CompletionCallback,
    ) {
        if outcome.is_success() {
            debug!(id, elapsed_ms = elapsed.as_millis() as u64, "Capture completed");
        } else {
            warn!(id, elapsed_ms = elapsed.as_millis() as u64, %outcome, "Capture did not succeed");
        }

        let drained = self.admission.complete(epoch);
        if drained {
            debug!("All captures finished");
        }
        self.publish_status();
        self.wake();

        if panic::catch_unwind(AssertUnwindSafe(|| on_complete(outcome))).is_err() {
            warn!(id, "Completion callback panicked");
        }
    }

    fn current_status(&self) -> BurstStatus {
        let snapshot = self.admission.snapshot();
        BurstStatus {
            pending: snapshot.pending,
            in_progress: snapshot.in_progress,
            burst_mode: snapshot.burst_mode,
            quality: snapshot.quality,
            memory_pressure: self.monitor.is_under_pressure(),
            accepting: snapshot.accepting,
        }
    }

    fn publish_status(&self) {
        let status = self.current_status();
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

/// Drains admitted requests onto a bounded worker pool
///
/// Enforces the parallelism ceiling and the minimum spacing between
/// dispatches through the admission controller, which owns the counters.
pub struct QueueProcessor {
    shared: Arc<Shared>,
    driver: Mutex<Option<QueueDriver>>,
    workers: Mutex<Option<Runtime>>,
}

impl QueueProcessor {
    pub fn start(
        config: &BurstConfig,
        admission: Arc<AdmissionController>,
        monitor: Arc<MemoryMonitor>,
        pool: Arc<BufferPool>,
    ) -> BurstResult<Self> {
        let workers = runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(config.worker_threads)
            .thread_name("burst-capture-worker")
            .build()
            .map_err(|e| BurstError::Runtime(format!("Failed to build worker pool: {}", e)))?;

        let snapshot = admission.snapshot();
        let (status, _) = watch::channel(BurstStatus {
            pending: snapshot.pending,
            in_progress: snapshot.in_progress,
            burst_mode: snapshot.burst_mode,
            quality: snapshot.quality,
            memory_pressure: monitor.is_under_pressure(),
            accepting: snapshot.accepting,
        });

        let shared = Arc::new(Shared {
            admission,
            monitor,
            pool,
            workers: workers.handle().clone(),
            waker: OnceLock::new(),
            status,
            sample_interval: config.memory_sample_interval(),
            last_sample: Mutex::new(Instant::now()),
        });

        // Weak so the monitor does not keep the processor alive
        let weak: Weak<Shared> = Arc::downgrade(&shared);
        shared
            .monitor
            .add_pressure_listener(Arc::new(move |under_pressure: bool| {
                if let Some(shared) = weak.upgrade() {
                    trace!(under_pressure, "Refreshing quality after pressure change");
                    shared.admission.refresh_quality();
                    shared.publish_status();
                }
            }));

        let driver_shared = Arc::clone(&shared);
        let driver = QueueDriver::start("burst-queue", config.poll_interval(), move || {
            driver_shared.tick();
            LoopAction::Continue
        })
        .map_err(|e| BurstError::Runtime(format!("Failed to start queue driver: {}", e)))?;
        let _ = shared.waker.set(driver.waker());

        info!(
            workers = config.worker_threads,
            max_parallel = config.max_parallel_captures,
            max_total = config.max_total_captures,
            min_interval_ms = config.min_capture_interval_ms,
            "Queue processor started"
        );

        Ok(Self {
            shared,
            driver: Mutex::new(Some(driver)),
            workers: Mutex::new(Some(workers)),
        })
    }

    /// Admit a request and start it right away if a slot is free
    pub fn submit(&self, action: CaptureAction, on_complete: CompletionCallback) -> bool {
        let admission = self.shared.admission.admit(action, on_complete);
        let accepted = admission.is_accepted();

        if let Admission::Accepted { id, dispatch } = admission {
            match dispatch {
                Some(dispatch) => self.shared.dispatch(dispatch),
                None => trace!(id, "Capture queued"),
            }
            self.shared.wake();
        }

        self.shared.publish_status();
        accepted
    }

    /// Drop queued requests and zero the counters
    pub fn reset(&self) -> usize {
        let dropped = self.shared.admission.reset();
        let count = dropped.len();
        drop(dropped);

        info!(dropped = count, "Burst queue reset");
        self.shared.publish_status();
        count
    }

    pub fn status(&self) -> BurstStatus {
        self.shared.current_status()
    }

    pub fn subscribe(&self) -> watch::Receiver<BurstStatus> {
        self.shared.status.subscribe()
    }

    /// Stop accepting work, stop the driver and release the worker pool
    ///
    /// Captures already running finish on their worker and still fire their
    /// callbacks. Safe to call more than once.
    pub fn shutdown(&self) {
        let dropped = self.shared.admission.close();
        if !dropped.is_empty() {
            info!(dropped = dropped.len(), "Dropping queued captures on shutdown");
        }
        drop(dropped);

        let driver = self
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut driver) = driver {
            driver.stop();
        }

        let workers = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(workers) = workers {
            if Handle::try_current().is_ok() {
                // Blocking inside a runtime is not allowed
                workers.shutdown_background();
            } else {
                workers.shutdown_timeout(SHUTDOWN_GRACE);
            }
            info!("Queue processor stopped");
        }

        self.shared.publish_status();
    }
}

impl Drop for QueueProcessor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
