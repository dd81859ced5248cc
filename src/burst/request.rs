// SPDX-License-Identifier: GPL-3.0-only

//! Capture requests and their outcomes

use crate::errors::CaptureError;
use std::any::Any;
use std::fmt;
use std::time::Instant;

/// Platform capture primitive, invoked once on a worker thread
pub type CaptureAction = Box<dyn FnOnce() -> Result<(), CaptureError> + Send + 'static>;

/// Completion callback, invoked exactly once per dispatched request
pub type CompletionCallback = Box<dyn FnOnce(CaptureOutcome) + Send + 'static>;

/// How a dispatched capture ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The action returned `Ok`
    Completed,
    /// The action returned an error
    Failed(CaptureError),
    /// The action panicked
    Panicked(String),
}

impl CaptureOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CaptureOutcome::Completed)
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(msg) = payload.downcast_ref::<&str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic payload".to_string()
        };
        CaptureOutcome::Panicked(message)
    }
}

impl fmt::Display for CaptureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureOutcome::Completed => write!(f, "completed"),
            CaptureOutcome::Failed(e) => write!(f, "failed: {}", e),
            CaptureOutcome::Panicked(msg) => write!(f, "panicked: {}", msg),
        }
    }
}

/// An admitted capture waiting in the queue
///
/// Owned by the queue until dispatch, then by the worker running it.
pub struct CaptureRequest {
    pub(crate) id: u64,
    pub(crate) action: CaptureAction,
    pub(crate) on_complete: CompletionCallback,
    pub(crate) admitted_at: Instant,
}

impl CaptureRequest {
    pub(crate) fn new(id: u64, action: CaptureAction, on_complete: CompletionCallback) -> Self {
        Self {
            id,
            action,
            on_complete,
            admitted_at: Instant::now(),
        }
    }
}

impl fmt::Debug for CaptureRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureRequest")
            .field("id", &self.id)
            .field("admitted_at", &self.admitted_at)
            .finish_non_exhaustive()
    }
}
