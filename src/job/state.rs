//! Compilation job state machine
//!
//! CREATED → ACTIVE → {SUCCEEDED | FAILED | SUPERSEDED}

use serde::{Deserialize, Serialize};

/// Lifecycle state of one compilation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Accepted but not yet registered as the active job
    Created,
    /// Registered as the orchestrator's active job
    Active,
    /// Compiler finished and the artifact was delivered
    Succeeded,
    /// Compiler, timeout or promotion failure
    Failed,
    /// Cancelled by a newer request or an explicit cancel
    Superseded,
}

impl JobState {
    /// Check if transition from this state to target is valid
    pub fn can_transition_to(&self, target: JobState) -> bool {
        matches!(
            (self, target),
            (JobState::Created, JobState::Active)
                | (JobState::Created, JobState::Superseded)
                | (JobState::Active, JobState::Succeeded)
                | (JobState::Active, JobState::Failed)
                | (JobState::Active, JobState::Superseded)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Superseded
        )
    }
}

/// Errors for job state operations
#[derive(Debug, thiserror::Error)]
pub enum JobStateError {
    #[error("Invalid state transition from {from:?} to {to:?}")]
    InvalidTransition { from: JobState, to: JobState },
}
