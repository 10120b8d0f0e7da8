//! Cancellation scopes
//!
//! A [`CancelScope`] belongs to exactly one compilation job. It combines an
//! explicit cancellation trigger with the job's deadline. Cancelling only
//! raises the flag: whoever supervises the compiler process notices it on
//! its next poll and stops the process. Nothing here waits for that.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::timeout::Deadline;

/// State of a cancellation scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeStatus {
    /// Neither cancelled nor expired.
    Live,
    /// Cancelled explicitly (superseded or `cancel`).
    Cancelled,
    /// The deadline elapsed.
    Expired,
}

impl ScopeStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, ScopeStatus::Live)
    }
}

/// Timeout-bounded cancellation scope, cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelScope {
    cancelled: Arc<AtomicBool>,
    deadline: Deadline,
}

impl CancelScope {
    /// Create a scope whose deadline starts now.
    pub fn new(timeout: Duration) -> Self {
        Self::with_deadline(Deadline::new(timeout))
    }

    pub fn with_deadline(deadline: Deadline) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline,
        }
    }

    /// Trigger cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_expired()
    }

    /// Current status. Explicit cancellation wins over expiry.
    pub fn status(&self) -> ScopeStatus {
        if self.is_cancelled() {
            ScopeStatus::Cancelled
        } else if self.is_expired() {
            ScopeStatus::Expired
        } else {
            ScopeStatus::Live
        }
    }

    pub fn timeout(&self) -> Duration {
        self.deadline.limit()
    }

    pub fn deadline(&self) -> &Deadline {
        &self.deadline
    }
}
