//! Timeout enforcement for compilations
//!
//! Every compilation runs under its own deadline, computed when the request
//! is accepted. A zero timeout is never used for an invocation; it resolves
//! to [`DEFAULT_TIMEOUT`].

use std::time::{Duration, Instant};

use crate::config::{DEFAULT_KILL_GRACE, DEFAULT_TIMEOUT};

/// Timeout settings for one orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Maximum wall-clock time per compilation.
    pub timeout: Duration,

    /// Time a stopped compiler gets between SIGTERM and SIGKILL.
    pub kill_grace: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

impl TimeoutConfig {
    /// Build from configured values, replacing zeros with defaults.
    pub fn from_config(timeout: Duration, kill_grace: Duration) -> Self {
        let defaults = Self::default();
        Self {
            timeout: if timeout.is_zero() { defaults.timeout } else { timeout },
            kill_grace: if kill_grace.is_zero() {
                defaults.kill_grace
            } else {
                kill_grace
            },
        }
    }

    /// Start a deadline for a compilation beginning now.
    pub fn start(&self) -> Deadline {
        Deadline::new(self.timeout)
    }
}

/// A fixed point in time after which a compilation has timed out.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    limit: Duration,
}

impl Deadline {
    pub fn new(limit: Duration) -> Self {
        Self {
            start: Instant::now(),
            limit,
        }
    }

    /// The configured limit.
    pub fn limit(&self) -> Duration {
        self.limit
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.elapsed())
    }

    /// True once the limit has fully elapsed.
    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.limit
    }
}
