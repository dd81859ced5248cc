// SPDX-License-Identifier: GPL-3.0-only

//! Admission control and counter bookkeeping
//!
//! All counters, the burst flag, the capture timestamps and the cached quality
//! live under one lock so the accept/reject decision is atomic with the
//! counter update.
//!
//! `pending` counts admitted requests still in the queue; `in_progress`
//! counts dispatched requests that have not completed. A request moves from
//! one to the other on dispatch, so `pending + in_progress` is the number of
//! admitted, unfinished captures.

use super::quality::QualityAdapter;
use super::request::{CaptureAction, CaptureRequest, CompletionCallback};
use crate::config::BurstConfig;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Limits enforced at admission and dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionLimits {
    pub max_parallel: usize,
    pub max_total: usize,
    pub min_interval: Duration,
    pub burst_threshold: usize,
}

impl From<&BurstConfig> for AdmissionLimits {
    fn from(config: &BurstConfig) -> Self {
        Self {
            max_parallel: config.max_parallel_captures,
            max_total: config.max_total_captures,
            min_interval: config.min_capture_interval(),
            burst_threshold: config.burst_threshold,
        }
    }
}

/// Result of an admission attempt
#[derive(Debug)]
pub enum Admission {
    /// Saturated or closed
    Rejected,
    /// Queued; `dispatch` holds the queue head when it may start right away
    Accepted { id: u64, dispatch: Option<Dispatch> },
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted { .. })
    }
}

/// A request released for execution
///
/// `epoch` ties the request to the counter generation it was dispatched in,
/// so completions from before a `reset` leave the new counters alone.
#[derive(Debug)]
pub struct Dispatch {
    pub request: CaptureRequest,
    pub epoch: u64,
}

/// Point-in-time view of the admission state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmissionSnapshot {
    pub pending: usize,
    pub in_progress: usize,
    pub burst_mode: bool,
    pub quality: f32,
    pub accepting: bool,
    pub last_admission: Option<Instant>,
    pub last_capture: Option<Instant>,
}

impl AdmissionSnapshot {
    pub fn load(&self) -> usize {
        self.pending + self.in_progress
    }

    pub fn is_idle(&self) -> bool {
        self.load() == 0
    }
}

struct AdmissionState {
    queue: VecDeque<CaptureRequest>,
    pending: usize,
    in_progress: usize,
    burst_mode: bool,
    quality: f32,
    last_admission: Option<Instant>,
    last_capture: Option<Instant>,
    epoch: u64,
    next_id: u64,
    accepting: bool,
}

pub struct AdmissionController {
    limits: AdmissionLimits,
    adapter: QualityAdapter,
    state: Mutex<AdmissionState>,
}

impl AdmissionController {
    pub fn new(limits: AdmissionLimits, adapter: QualityAdapter) -> Self {
        let quality = adapter.default_quality();
        Self {
            limits,
            adapter,
            state: Mutex::new(AdmissionState {
                queue: VecDeque::with_capacity(limits.max_total),
                pending: 0,
                in_progress: 0,
                burst_mode: false,
                quality,
                last_admission: None,
                last_capture: None,
                epoch: 0,
                next_id: 0,
                accepting: true,
            }),
        }
    }

    /// Accept or reject a capture request
    ///
    /// On acceptance the request joins the back of the queue. If a slot is
    /// free and spacing allows, the queue head is released in the same
    /// critical section.
    pub fn admit(&self, action: CaptureAction, on_complete: CompletionCallback) -> Admission {
        let now = Instant::now();
        let mut state = self.lock();

        if !state.accepting {
            debug!("Rejecting capture, manager shut down");
            return Admission::Rejected;
        }

        let load = state.pending + state.in_progress;
        if load >= self.limits.max_total {
            debug!(
                pending = state.pending,
                in_progress = state.in_progress,
                max_total = self.limits.max_total,
                "Rejecting capture, queue saturated"
            );
            return Admission::Rejected;
        }

        let id = state.next_id;
        state.next_id += 1;
        state.pending += 1;
        state.last_admission = Some(now);
        state
            .queue
            .push_back(CaptureRequest::new(id, action, on_complete));

        if state.pending > self.limits.burst_threshold && !state.burst_mode {
            info!(pending = state.pending, "Entering burst mode");
            state.burst_mode = true;
        }
        self.recompute_quality(&mut state);

        trace!(
            id,
            pending = state.pending,
            in_progress = state.in_progress,
            quality = state.quality,
            "Capture admitted"
        );

        let dispatch = self.take_next(&mut state, now);
        Admission::Accepted { id, dispatch }
    }

    /// Release the queue head if parallelism and spacing allow
    pub fn next_dispatch(&self, now: Instant) -> Option<Dispatch> {
        let mut state = self.lock();
        self.take_next(&mut state, now)
    }

    /// Record a finished capture
    ///
    /// Returns `true` when this completion drained the system.
    pub fn complete(&self, epoch: u64) -> bool {
        let mut state = self.lock();
        if epoch != state.epoch {
            trace!(epoch, current = state.epoch, "Ignoring completion from before reset");
            return false;
        }

        state.in_progress = state.in_progress.saturating_sub(1);
        self.recompute_quality(&mut state);
        state.pending == 0 && state.in_progress == 0
    }

    /// Recompute the cached quality, e.g. after a memory pressure transition
    pub fn refresh_quality(&self) {
        let mut state = self.lock();
        self.recompute_quality(&mut state);
    }

    /// Drop queued requests and zero all counters
    ///
    /// Quality returns to the default tier, or the low tier while memory
    /// pressure is active.
    ///
    /// Dispatched captures keep running; their completions belong to the old
    /// epoch and are ignored. The dropped requests are returned so the caller
    /// can release them outside the lock.
    pub fn reset(&self) -> Vec<CaptureRequest> {
        let mut state = self.lock();
        let dropped: Vec<_> = state.queue.drain(..).collect();
        state.pending = 0;
        state.in_progress = 0;
        state.burst_mode = false;
        state.quality = self.adapter.quality(0, false);
        state.last_admission = None;
        state.last_capture = None;
        state.epoch += 1;
        dropped
    }

    /// Stop accepting requests and hand back everything still queued
    pub fn close(&self) -> Vec<CaptureRequest> {
        let mut state = self.lock();
        state.accepting = false;
        state.pending = 0;
        self.recompute_quality(&mut state);
        state.queue.drain(..).collect()
    }

    pub fn is_burst_mode_active(&self) -> bool {
        self.lock().burst_mode
    }

    pub fn quality(&self) -> f32 {
        self.lock().quality
    }

    pub fn snapshot(&self) -> AdmissionSnapshot {
        let state = self.lock();
        AdmissionSnapshot {
            pending: state.pending,
            in_progress: state.in_progress,
            burst_mode: state.burst_mode,
            quality: state.quality,
            accepting: state.accepting,
            last_admission: state.last_admission,
            last_capture: state.last_capture,
        }
    }

    fn take_next(&self, state: &mut AdmissionState, now: Instant) -> Option<Dispatch> {
        if !state.accepting || state.queue.is_empty() {
            return None;
        }
        if state.in_progress >= self.limits.max_parallel {
            return None;
        }
        if state.in_progress > 0
            && let Some(last) = state.last_capture
            && now.saturating_duration_since(last) < self.limits.min_interval
        {
            return None;
        }

        let request = state.queue.pop_front()?;
        state.pending -= 1;
        state.in_progress += 1;
        state.last_capture = Some(now);
        self.recompute_quality(state);

        Some(Dispatch {
            request,
            epoch: state.epoch,
        })
    }

    fn recompute_quality(&self, state: &mut AdmissionState) {
        if state.pending == 0 && state.in_progress == 0 {
            if state.burst_mode {
                info!("Queue drained, leaving burst mode");
            }
            state.burst_mode = false;
            state.quality = self.adapter.quality(0, false);
        } else {
            state.quality = self
                .adapter
                .quality(state.pending + state.in_progress, state.burst_mode);
        }
    }

    fn lock(&self) -> MutexGuard<'_, AdmissionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::QualityLevels;
    use crate::memory::{BufferPool, MemoryMonitor, MemorySample, MemoryStatsProvider};
    use std::sync::Arc;

    struct IdleMemory;

    impl MemoryStatsProvider for IdleMemory {
        fn sample(&self) -> Option<MemorySample> {
            Some(MemorySample::new(10, 100))
        }
    }

    fn controller(max_parallel: usize, max_total: usize, interval_ms: u64) -> AdmissionController {
        let monitor = Arc::new(MemoryMonitor::new(
            Arc::new(IdleMemory),
            Arc::new(BufferPool::default()),
            0.80,
        ));
        monitor.initialize();
        let limits = AdmissionLimits {
            max_parallel,
            max_total,
            min_interval: Duration::from_millis(interval_ms),
            burst_threshold: 2,
        };
        AdmissionController::new(limits, QualityAdapter::new(monitor, QualityLevels::default()))
    }

    fn noop() -> (CaptureAction, CompletionCallback) {
        (Box::new(|| Ok(())), Box::new(|_| {}))
    }

    fn admit(controller: &AdmissionController) -> Admission {
        let (action, on_complete) = noop();
        controller.admit(action, on_complete)
    }

    #[test]
    fn test_first_request_dispatches_immediately() {
        let controller = controller(2, 8, 250);
        match admit(&controller) {
            Admission::Accepted { id, dispatch } => {
                assert_eq!(id, 0);
                assert!(dispatch.is_some());
            }
            Admission::Rejected => panic!("First request must be accepted"),
        }

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.pending, 0);
        assert_eq!(snapshot.in_progress, 1);
    }

    #[test]
    fn test_spacing_defers_second_dispatch() {
        let controller = controller(2, 8, 10_000);
        let _first = admit(&controller);
        match admit(&controller) {
            Admission::Accepted { dispatch, .. } => assert!(dispatch.is_none()),
            Admission::Rejected => panic!("Second request must be accepted"),
        }
        assert!(controller.next_dispatch(Instant::now()).is_none());

        let later = Instant::now() + Duration::from_secs(11);
        assert!(controller.next_dispatch(later).is_some());
    }

    #[test]
    fn test_parallel_ceiling() {
        let controller = controller(2, 8, 0);
        let mut dispatched = 0;
        for _ in 0..5 {
            if let Admission::Accepted {
                dispatch: Some(_), ..
            } = admit(&controller)
            {
                dispatched += 1;
            }
        }
        assert_eq!(dispatched, 2);
        assert!(controller.next_dispatch(Instant::now()).is_none());

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.in_progress, 2);
        assert_eq!(snapshot.pending, 3);
    }

    #[test]
    fn test_rejects_at_max_total() {
        let controller = controller(2, 8, 250);
        let accepted = (0..10)
            .filter(|_| admit(&controller).is_accepted())
            .count();
        assert_eq!(accepted, 8);
        assert_eq!(controller.snapshot().load(), 8);
    }

    #[test]
    fn test_burst_threshold_boundary() {
        // One slot, long spacing: everything after the first request stays queued
        let controller = controller(1, 8, 10_000);
        admit(&controller);
        admit(&controller);
        admit(&controller);
        assert_eq!(controller.snapshot().pending, 2);
        assert!(!controller.is_burst_mode_active());

        admit(&controller);
        assert_eq!(controller.snapshot().pending, 3);
        assert!(controller.is_burst_mode_active());
    }

    #[test]
    fn test_burst_mode_and_drain() {
        let controller = controller(1, 8, 0);
        let mut epochs = Vec::new();
        for _ in 0..4 {
            if let Admission::Accepted {
                dispatch: Some(d), ..
            } = admit(&controller)
            {
                epochs.push(d.epoch);
            }
        }
        assert!(controller.is_burst_mode_active());
        assert!(controller.quality() < 0.95);

        // Drain one at a time
        let mut drained = false;
        while let Some(epoch) = epochs.pop() {
            drained = controller.complete(epoch);
            if let Some(d) = controller.next_dispatch(Instant::now()) {
                epochs.push(d.epoch);
            }
        }
        assert!(drained);
        assert!(!controller.is_burst_mode_active());
        assert_eq!(controller.quality(), 0.95);
    }

    #[test]
    fn test_reset_ignores_stale_completions() {
        let controller = controller(2, 8, 250);
        let epoch = match admit(&controller) {
            Admission::Accepted {
                dispatch: Some(d), ..
            } => d.epoch,
            _ => panic!("Expected immediate dispatch"),
        };
        admit(&controller);
        admit(&controller);

        let dropped = controller.reset();
        assert_eq!(dropped.len(), 2);
        assert!(controller.snapshot().is_idle());

        assert!(!controller.complete(epoch));
        assert_eq!(controller.snapshot().in_progress, 0);

        // Behaves like a fresh controller
        match admit(&controller) {
            Admission::Accepted { dispatch, .. } => assert!(dispatch.is_some()),
            Admission::Rejected => panic!("Request after reset must be accepted"),
        }
    }

    #[test]
    fn test_close_rejects_new_work() {
        let controller = controller(2, 8, 250);
        admit(&controller);
        admit(&controller);

        let dropped = controller.close();
        assert_eq!(dropped.len(), 1);
        assert!(!admit(&controller).is_accepted());
        assert!(controller.next_dispatch(Instant::now()).is_none());
    }
}
