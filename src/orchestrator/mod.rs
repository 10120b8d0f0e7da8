//! Single-flight compilation orchestrator
//!
//! An [`Orchestrator`] owns at most one active [`CompilationJob`]. Every new
//! request first supersedes the current job (cancelling its scope without
//! waiting for the compiler to exit), then registers a fresh job under a new
//! timeout-bounded scope. The superseded job's supervising thread notices
//! the cancellation, stops its compiler and cleans up its own temp artifact.
//!
//! Compilation entry points:
//! - [`Orchestrator::compile_to_disk`]: blocking, returns the final path
//! - [`Orchestrator::compile_to_disk_async`]: detached thread plus callback
//! - [`Orchestrator::compile_to_memory`]: blocking, returns the bytes
//! - [`Orchestrator::compile`]: sync or async depending on whether the
//!   configuration carries a completion callback

mod pending;

pub use pending::PendingCompile;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use tracing::debug;

use crate::cancel::CancelScope;
use crate::config::{BuildConfig, ConfigError};
use crate::error::CompileResult;
use crate::job::{next_job_id, CompilationJob, JobSnapshot, JobState, OutputMode};
use crate::size::BinarySizer;
use crate::strategy::{Artifact, BuildContext, DiskStrategy, MemoryStrategy, OutputStrategy};
use crate::timeout::TimeoutConfig;

/// State guarded by the orchestrator's single lock.
#[derive(Debug, Default)]
struct Slot {
    /// The job currently owned by this orchestrator
    active: Option<Arc<CompilationJob>>,
    /// Bytes of the latest successful memory compilation
    last_binary: Option<Arc<[u8]>>,
}

#[derive(Debug)]
struct Shared {
    config: BuildConfig,
    timeouts: TimeoutConfig,
    root_dir: PathBuf,
    output_dir: PathBuf,
    final_path: PathBuf,
    output_file_name: String,
    default_temp_name: String,
    slot: Mutex<Slot>,
}

/// Runs compilations for one configuration, one at a time.
///
/// Cloning yields another handle to the same orchestrator.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    shared: Arc<Shared>,
}

impl Orchestrator {
    /// Create an orchestrator for `config`.
    ///
    /// A zero timeout is replaced by the default. File names and the
    /// output directory are fixed here for the orchestrator's lifetime.
    pub fn new(config: BuildConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let timeouts = TimeoutConfig::from_config(config.timeout, config.kill_grace);
        let root_dir = absolute(config.root_dir.clone());
        let output_dir = absolute(config.resolved_output_dir());
        let output_file_name = format!("{}{}", config.out_name, config.extension);
        let default_temp_name = format!("{}_temp{}", config.out_name, config.extension);
        let final_path = output_dir.join(&output_file_name);

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                timeouts,
                root_dir,
                output_dir,
                final_path,
                output_file_name,
                default_temp_name,
                slot: Mutex::new(Slot::default()),
            }),
        })
    }

    pub fn config(&self) -> &BuildConfig {
        &self.shared.config
    }

    pub fn timeouts(&self) -> TimeoutConfig {
        self.shared.timeouts
    }

    /// Compile to the final output path, blocking until the compiler exits.
    pub fn compile_to_disk(&self) -> CompileResult<PathBuf> {
        let job = self.shared.begin(&DiskStrategy);
        let result = self.shared.run(&DiskStrategy, &job);
        self.shared.release(&job);
        result.map(|artifact| artifact.into_path().unwrap_or_else(|| self.shared.final_path.clone()))
    }

    /// Compile to disk on a detached thread.
    ///
    /// Returns immediately. `on_complete` receives the terminal result; the
    /// active job is cleared after it returns.
    pub fn compile_to_disk_async<F>(&self, on_complete: F) -> PendingCompile
    where
        F: FnOnce(CompileResult<PathBuf>) + Send + 'static,
    {
        let job = self.shared.begin(&DiskStrategy);
        let shared = Arc::clone(&self.shared);
        let worker_job = Arc::clone(&job);

        let handle = thread::spawn(move || {
            let result = shared
                .run(&DiskStrategy, &worker_job)
                .map(|artifact| artifact.into_path().unwrap_or_else(|| shared.final_path.clone()));
            on_complete(result);
            shared.release(&worker_job);
        });

        PendingCompile::new(job, handle)
    }

    /// Compile into memory and return the binary image.
    ///
    /// Always blocks. On success the bytes also become the "most recent
    /// binary" reported by [`binary_size`](Self::binary_size).
    pub fn compile_to_memory(&self) -> CompileResult<Vec<u8>> {
        let strategy = MemoryStrategy::new(self.shared.config.memory_capture);
        let job = self.shared.begin(&strategy);
        let result = self.shared.run(&strategy, &job);
        self.shared.release(&job);
        result.map(|artifact| artifact.into_bytes().unwrap_or_default())
    }

    /// Compile to disk, asynchronously if the configuration has an
    /// `on_complete` callback.
    ///
    /// In async mode this returns `Ok(())` at once and failures reach the
    /// callback only.
    pub fn compile(&self) -> CompileResult<()> {
        match self.shared.config.on_complete.clone() {
            Some(callback) => {
                // Detached: completion is reported through the callback.
                let _ = self.compile_to_disk_async(move |result| callback(result));
                Ok(())
            }
            None => self.compile_to_disk().map(|_| ()),
        }
    }

    /// Cancel the active job, if any.
    ///
    /// Returns whether a job was cancelled. Does not wait for the compiler
    /// to exit.
    pub fn cancel(&self) -> bool {
        let mut slot = self.shared.lock();
        match slot.active.take() {
            Some(job) => {
                job.supersede();
                debug!(job_id = job.id(), "cancelled active compilation");
                self.shared.config.logger.log("Compilation cancelled");
                true
            }
            None => false,
        }
    }

    /// Whether a job is currently active.
    pub fn is_compiling(&self) -> bool {
        self.shared.lock().active.is_some()
    }

    pub fn active_job(&self) -> Option<JobSnapshot> {
        self.shared.lock().active.as_ref().map(|job| job.snapshot())
    }

    /// Arguments for a disk compilation to the default temp file name.
    pub fn build_arguments(&self) -> Vec<String> {
        self.shared
            .context()
            .output_dir_arguments(&self.shared.default_temp_name)
    }

    /// Promote the default temp file to the final output path.
    pub fn rename_output_file(&self) -> CompileResult<()> {
        self.rename_output_file_from(&self.shared.default_temp_name)
    }

    /// Promote `temp_name` (inside the output directory) to the final
    /// output path.
    pub fn rename_output_file_from(&self, temp_name: &str) -> CompileResult<()> {
        let temp_path = self.shared.output_dir.join(temp_name);
        crate::strategy::promote(&temp_path, &self.shared.final_path)
    }

    /// Output file name with extension, e.g. `main.wasm`.
    pub fn output_file_name(&self) -> &str {
        &self.shared.output_file_name
    }

    pub fn entry_path(&self) -> &str {
        &self.shared.config.entry
    }

    pub fn output_dir(&self) -> &Path {
        &self.shared.output_dir
    }

    pub fn final_output_path(&self) -> &Path {
        &self.shared.final_path
    }

    /// A sizer over the most recent binary of this orchestrator.
    pub fn binary_sizer(&self) -> BinarySizer {
        let shared = Arc::clone(&self.shared);
        BinarySizer::new(move || shared.binary_bytes())
    }

    /// Size of the most recent binary, e.g. `"2.3 MB"`.
    pub fn binary_size(&self) -> String {
        self.binary_sizer().binary_size()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn context(&self) -> BuildContext<'_> {
        BuildContext {
            config: &self.config,
            root_dir: &self.root_dir,
            output_dir: &self.output_dir,
            final_path: &self.final_path,
        }
    }

    /// Supersede the active job and register a new one.
    fn begin(&self, strategy: &dyn OutputStrategy) -> Arc<CompilationJob> {
        let mut slot = self.lock();

        if let Some(previous) = slot.active.take() {
            previous.supersede();
            debug!(job_id = previous.id(), "superseded active compilation");
        }

        let id = next_job_id();
        let scope = CancelScope::with_deadline(self.timeouts.start());
        let target = strategy.target(&self.context(), id);
        let job = Arc::new(CompilationJob::new(id, strategy.mode(), target, scope));
        // Fresh jobs are always CREATED.
        let _ = job.activate();
        slot.active = Some(Arc::clone(&job));

        debug!(job_id = id, mode = ?job.mode(), target = ?job.target(), "compilation started");
        job
    }

    /// Run `job` to completion and record its outcome.
    fn run(&self, strategy: &dyn OutputStrategy, job: &CompilationJob) -> CompileResult<Artifact> {
        let logger = &self.config.logger;
        if job.mode() == OutputMode::Memory {
            logger.log("Compiling to memory...");
        } else {
            logger.log(format!("Compiling {}", self.config.entry));
        }

        let result = strategy.produce(&self.context(), job);
        job.complete(result.is_ok());

        match &result {
            Ok(Artifact::Bytes(bytes)) => {
                logger.log(format!(
                    "Compilation to memory success. Size: {} bytes",
                    bytes.len()
                ));
                self.record_binary(job, Some(Arc::from(bytes.as_slice())));
            }
            Ok(Artifact::File(path)) => {
                logger.log(format!("Compilation success: {}", path.display()));
                self.record_binary(job, None);
            }
            Err(e) => {
                logger.log(format!("Compilation failed: {}", e));
            }
        }
        debug!(job_id = job.id(), elapsed = ?job.elapsed(), ok = result.is_ok(), "compilation finished");

        result
    }

    /// Replace the most recent binary unless `job` was superseded.
    ///
    /// Supersession happens under the slot lock, so checking the state while
    /// holding it cannot race a newer job.
    fn record_binary(&self, job: &CompilationJob, bytes: Option<Arc<[u8]>>) {
        let mut slot = self.lock();
        if job.state() == JobState::Superseded {
            debug!(job_id = job.id(), "superseded job finished, keeping newer binary");
            return;
        }
        slot.last_binary = bytes;
    }

    /// Clear the active slot if it still holds `job`.
    fn release(&self, job: &CompilationJob) {
        let mut slot = self.lock();
        if slot.active.as_ref().is_some_and(|active| active.id() == job.id()) {
            slot.active = None;
        }
    }

    fn binary_bytes(&self) -> Option<Arc<[u8]>> {
        if let Some(bytes) = self.lock().last_binary.as_ref().filter(|b| !b.is_empty()) {
            return Some(Arc::clone(bytes));
        }
        fs::read(&self.final_path).ok().map(Arc::from)
    }
}

/// Anchor `dir` at the current directory. Disk compilations run inside the
/// output directory, so every path handed to the compiler must be absolute.
fn absolute(dir: PathBuf) -> PathBuf {
    if dir.is_absolute() {
        return dir;
    }
    match std::env::current_dir() {
        Ok(cwd) if dir.as_os_str().is_empty() => cwd,
        Ok(cwd) => cwd.join(dir),
        Err(e) => {
            debug!(error = %e, "cannot resolve current directory");
            dir
        }
    }
}
