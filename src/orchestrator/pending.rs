//! Handle to an asynchronous disk compilation.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::job::{CompilationJob, JobSnapshot, JobState};

/// A disk compilation running on its own thread.
///
/// Dropping the handle detaches the thread; the completion callback still
/// runs.
#[derive(Debug)]
pub struct PendingCompile {
    job: Arc<CompilationJob>,
    handle: JoinHandle<()>,
}

impl PendingCompile {
    pub(super) fn new(job: Arc<CompilationJob>, handle: JoinHandle<()>) -> Self {
        Self { job, handle }
    }

    pub fn job_id(&self) -> u64 {
        self.job.id()
    }

    pub fn state(&self) -> JobState {
        self.job.state()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.job.snapshot()
    }

    /// True once the callback has returned and the slot was released.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the compilation thread, including its callback.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}
