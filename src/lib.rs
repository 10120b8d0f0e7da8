//! gobuild - single-flight compiler invocation
//!
//! Drives an external compiler (`go build` and compatible toolchains) for one
//! program at a time. A build either lands on disk, written to a unique temp
//! file and renamed into place, or is captured straight into memory. Every
//! request runs under its own timeout and supersedes whatever compilation
//! was in flight.

pub mod cancel;
pub mod config;
pub mod error;
pub mod job;
pub mod log;
pub mod orchestrator;
pub mod process;
pub mod size;
pub mod strategy;
pub mod timeout;

pub use cancel::{CancelScope, ScopeStatus};
pub use config::{BuildConfig, ConfigError, MemoryCapture};
pub use error::{CompileError, CompileResult, ErrorKind};
pub use job::{ArtifactTarget, JobSnapshot, JobState, OutputMode};
pub use log::LogSink;
pub use orchestrator::{Orchestrator, PendingCompile};
pub use size::{format_size, BinarySizer};
pub use strategy::{Artifact, DiskStrategy, MemoryStrategy, OutputStrategy};
pub use timeout::TimeoutConfig;

pub use gobuild_args::{build_arguments, STDOUT_PSEUDO_PATH};
