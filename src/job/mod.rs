//! Compilation jobs
//!
//! A [`CompilationJob`] is one attempt to invoke the compiler. It owns the
//! job's cancellation scope and records where the artifact is being
//! written. Jobs are shared (`Arc`) between the orchestrator's active slot
//! and the thread supervising the compiler, and are never reused.

mod state;

pub use state::{JobState, JobStateError};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cancel::CancelScope;

/// Process-wide job id counter
static JOB_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get the next job id
pub fn next_job_id() -> u64 {
    JOB_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Output destination of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Disk,
    Memory,
}

/// Where a job's artifact lands while the compiler runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ArtifactTarget {
    /// Unique temp file name inside the output directory
    TempFile(String),
    /// No disk artifact; bytes are captured in memory
    Memory,
}

impl ArtifactTarget {
    pub fn temp_file(&self) -> Option<&str> {
        match self {
            ArtifactTarget::TempFile(name) => Some(name),
            ArtifactTarget::Memory => None,
        }
    }
}

/// Generate a collision-resistant temp artifact name.
///
/// Combines a nanosecond timestamp with the process-wide job sequence, so
/// overlapping requests never share a name even on coarse clocks.
pub fn unique_temp_name(out_name: &str, extension: &str, seq: u64) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{}_temp_{}_{}{}", out_name, nanos, seq, extension)
}

/// One in-flight compiler invocation.
#[derive(Debug)]
pub struct CompilationJob {
    id: u64,
    mode: OutputMode,
    target: ArtifactTarget,
    scope: CancelScope,
    started: Instant,
    started_at: DateTime<Utc>,
    state: Mutex<JobState>,
}

impl CompilationJob {
    /// Create a job in CREATED state.
    pub fn new(id: u64, mode: OutputMode, target: ArtifactTarget, scope: CancelScope) -> Self {
        Self {
            id,
            mode,
            target,
            scope,
            started: Instant::now(),
            started_at: Utc::now(),
            state: Mutex::new(JobState::Created),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn target(&self) -> &ArtifactTarget {
        &self.target
    }

    pub fn scope(&self) -> &CancelScope {
        &self.scope
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn state(&self) -> JobState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Transition to a new state
    pub fn transition(&self, new_state: JobState) -> Result<(), JobStateError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.can_transition_to(new_state) {
            return Err(JobStateError::InvalidTransition {
                from: *state,
                to: new_state,
            });
        }
        *state = new_state;
        Ok(())
    }

    /// Mark the job active.
    pub fn activate(&self) -> Result<(), JobStateError> {
        self.transition(JobState::Active)
    }

    /// Cancel the job's scope and mark it superseded.
    ///
    /// Returns without waiting for the compiler process to exit.
    pub fn supersede(&self) {
        self.scope.cancel();
        // A job that already reached a terminal state keeps it.
        let _ = self.transition(JobState::Superseded);
    }

    /// Record the job's own outcome. A superseded job stays superseded.
    pub fn complete(&self, success: bool) {
        let target = if success {
            JobState::Succeeded
        } else {
            JobState::Failed
        };
        let _ = self.transition(target);
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            mode: self.mode,
            state: self.state(),
            target: self.target.clone(),
            started_at: self.started_at,
            elapsed_ms: self.elapsed().as_millis() as u64,
        }
    }
}

/// Point-in-time view of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub id: u64,
    pub mode: OutputMode,
    pub state: JobState,
    pub target: ArtifactTarget,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}
