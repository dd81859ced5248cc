// SPDX-License-Identifier: GPL-3.0-only

//! Thread lifecycle for the queue driver
//!
//! The driver runs one iteration of its loop function, then parks until the
//! next tick or until someone wakes it. Admissions and completions wake it so
//! queued work starts as soon as a slot frees up; the tick is the fallback for
//! spacing deadlines that expire without any event.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle, Thread};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Action returned by the loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Park until the next tick or wake-up, then run again
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Handle used to wake a parked driver early
#[derive(Debug, Clone)]
pub struct DriverWaker {
    thread: Thread,
}

impl DriverWaker {
    pub fn wake(&self) {
        self.thread.unpark();
    }
}

/// Controller for the driver thread
///
/// # Example
///
/// ```ignore
/// let driver = QueueDriver::start("burst-queue", Duration::from_millis(50), move || {
///     processor.pump();
///     LoopAction::Continue
/// })?;
///
/// // From an admission or completion
/// driver.waker().wake();
///
/// driver.stop();
/// ```
pub struct QueueDriver {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    waker: DriverWaker,
    name: String,
}

impl QueueDriver {
    /// Spawn the driver thread
    ///
    /// `loop_fn` runs once immediately, then after every tick or wake-up
    /// until it returns `LoopAction::Stop` or [`QueueDriver::stop`] is called.
    pub fn start<F>(name: &str, tick: Duration, mut loop_fn: F) -> io::Result<Self>
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, tick_ms = tick.as_millis() as u64, "Starting queue driver");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %name_clone, "Queue driver thread started");

                loop {
                    if stop_signal_clone.load(Ordering::SeqCst) {
                        debug!(name = %name_clone, "Stop signal received");
                        break;
                    }

                    match loop_fn() {
                        LoopAction::Continue => {}
                        LoopAction::Stop => {
                            debug!(name = %name_clone, "Loop requested stop");
                            break;
                        }
                    }

                    // Spurious wake-ups only cost an extra iteration
                    thread::park_timeout(tick);
                }

                info!(name = %name_clone, "Queue driver thread exiting");
            })?;

        let waker = DriverWaker {
            thread: thread_handle.thread().clone(),
        };

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            waker,
            name: name.to_string(),
        })
    }

    pub fn waker(&self) -> DriverWaker {
        self.waker.clone()
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop without waiting for it
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting queue driver stop");
        self.stop_signal.store(true, Ordering::SeqCst);
        self.waker.wake();
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending stop signal
    pub fn join(&mut self) {
        let Some(handle) = self.thread_handle.take() else {
            return;
        };

        // Joining ourselves would deadlock
        if handle.thread().id() == thread::current().id() {
            debug!(name = %self.name, "Stop requested from driver thread, detaching");
            return;
        }

        if let Err(e) = handle.join() {
            warn!(name = %self.name, "Queue driver thread panicked: {:?}", e);
        } else {
            debug!(name = %self.name, "Queue driver thread finished");
        }
    }
}

impl Drop for QueueDriver {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "QueueDriver dropped, stopping loop");
            self.stop();
        }
    }
}
