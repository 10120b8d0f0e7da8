//! Output strategies
//!
//! A strategy turns one compilation job into an [`Artifact`]: either a file
//! at the final output path ([`DiskStrategy`]) or the binary's bytes
//! ([`MemoryStrategy`]). Both share argument construction and process
//! supervision; they differ in destination, working directory and how
//! output streams are captured.

mod disk;
mod memory;

pub use disk::DiskStrategy;
pub(crate) use disk::promote;
pub use memory::MemoryStrategy;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cancel::CancelScope;
use crate::config::BuildConfig;
use crate::error::{CompileError, CompileResult};
use crate::job::{ArtifactTarget, CompilationJob, OutputMode};
use crate::process::{ProcessOutput, Termination};

/// What a successful job delivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// Binary promoted to this path
    File(PathBuf),
    /// Binary image held in memory
    Bytes(Vec<u8>),
}

impl Artifact {
    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            Artifact::File(path) => Some(path),
            Artifact::Bytes(_) => None,
        }
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Artifact::Bytes(bytes) => Some(bytes),
            Artifact::File(_) => None,
        }
    }
}

/// Everything a strategy needs from the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub config: &'a BuildConfig,
    /// Absolute root directory; relative entries resolve against it.
    pub root_dir: &'a Path,
    /// Output directory, already resolved against the root directory.
    pub output_dir: &'a Path,
    /// Final `<output_dir>/<out_name><extension>` path.
    pub final_path: &'a Path,
}

impl BuildContext<'_> {
    /// Compiler arguments writing to `destination`, for a compiler running
    /// in the root directory.
    pub fn arguments(&self, destination: &str) -> Vec<String> {
        gobuild_args::build_arguments(
            &self.config.flags(),
            destination,
            self.output_dir,
            &self.config.entry,
        )
    }

    /// Compiler arguments writing to `destination`, for a compiler running
    /// in the output directory. The entry is anchored at the root directory.
    pub fn output_dir_arguments(&self, destination: &str) -> Vec<String> {
        let entry = self.anchored_entry();
        gobuild_args::build_arguments(
            &self.config.flags(),
            destination,
            self.output_dir,
            &entry.to_string_lossy(),
        )
    }

    /// The entry path as seen from any working directory.
    pub fn anchored_entry(&self) -> PathBuf {
        let entry = Path::new(&self.config.entry);
        if entry.is_absolute() {
            entry.to_path_buf()
        } else {
            self.root_dir.join(entry)
        }
    }

    /// Create the output directory if it does not exist yet.
    pub fn ensure_output_dir(&self) -> CompileResult<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(self.output_dir).map_err(|source| CompileError::OutputDir {
            path: self.output_dir.to_path_buf(),
            source,
        })
    }
}

/// A way of producing the compiled binary.
pub trait OutputStrategy: Send + Sync {
    fn mode(&self) -> OutputMode;

    /// Where the job's artifact lives while the compiler runs.
    fn target(&self, ctx: &BuildContext<'_>, job_id: u64) -> ArtifactTarget;

    /// Run the compiler for `job` and deliver its artifact.
    fn produce(&self, ctx: &BuildContext<'_>, job: &CompilationJob) -> CompileResult<Artifact>;
}

/// Map a finished process to success or the matching error kind.
///
/// Interruptions always win over the exit status: a killed compiler is a
/// failure even if it happened to exit zero.
pub(crate) fn check_output(output: &ProcessOutput, scope: &CancelScope) -> CompileResult<()> {
    match output.termination {
        Termination::Cancelled => Err(CompileError::Cancelled),
        Termination::TimedOut => Err(CompileError::Timeout {
            timeout: scope.timeout(),
        }),
        Termination::Exited(_) if output.success() => Ok(()),
        Termination::Exited(_) => Err(CompileError::Build {
            exit_code: output.exit_code(),
            diagnostics: output.diagnostics(),
        }),
    }
}

/// Delete a temp artifact if it exists.
pub(crate) fn remove_artifact(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed temp artifact"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => debug!(path = %path.display(), error = %e, "failed to remove temp artifact"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn exited(code: i32) -> Termination {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            Termination::Exited(std::process::ExitStatus::from_raw(code << 8))
        }
        #[cfg(windows)]
        {
            use std::os::windows::process::ExitStatusExt;
            Termination::Exited(std::process::ExitStatus::from_raw(code as u32))
        }
    }

    fn output(termination: Termination, stderr: &[u8]) -> ProcessOutput {
        ProcessOutput {
            termination,
            stdout: Vec::new(),
            stderr: stderr.to_vec(),
        }
    }

    #[test]
    fn test_check_output_success() {
        let scope = CancelScope::new(Duration::from_secs(5));
        assert!(check_output(&output(exited(0), b""), &scope).is_ok());
    }

    #[test]
    fn test_check_output_build_failure_carries_diagnostics() {
        let scope = CancelScope::new(Duration::from_secs(5));
        let err = check_output(&output(exited(1), b"syntax error"), &scope).unwrap_err();
        match err {
            CompileError::Build {
                exit_code,
                diagnostics,
            } => {
                assert_eq!(exit_code, Some(1));
                assert_eq!(diagnostics, "syntax error");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_check_output_interruptions() {
        let scope = CancelScope::new(Duration::from_millis(250));
        let err = check_output(&output(Termination::TimedOut, b""), &scope).unwrap_err();
        assert!(matches!(err, CompileError::Timeout { timeout } if timeout == Duration::from_millis(250)));

        let err = check_output(&output(Termination::Cancelled, b""), &scope).unwrap_err();
        assert!(matches!(err, CompileError::Cancelled));
    }

    #[test]
    fn test_remove_missing_artifact_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        remove_artifact(&dir.path().join("absent"));
    }

    #[test]
    fn test_output_dir_arguments_anchor_relative_entry() {
        let config = BuildConfig::new("cmd/app/main.go", "app");
        let ctx = BuildContext {
            config: &config,
            root_dir: Path::new("/work/project"),
            output_dir: Path::new("/work/project/public"),
            final_path: Path::new("/work/project/public/app"),
        };

        let args = ctx.output_dir_arguments("app_temp_1");
        assert_eq!(
            args,
            vec![
                "build",
                "-o",
                "/work/project/public/app_temp_1",
                "/work/project/cmd/app/main.go",
            ]
        );
        // Root-directory invocations keep the entry as configured.
        assert_eq!(ctx.arguments("/dev/stdout").last().map(String::as_str), Some("cmd/app/main.go"));
    }

    #[test]
    fn test_absolute_entry_is_not_reanchored() {
        let config = BuildConfig::new("/src/main.go", "app");
        let ctx = BuildContext {
            config: &config,
            root_dir: Path::new("/work/project"),
            output_dir: Path::new("/work/project/public"),
            final_path: Path::new("/work/project/public/app"),
        };
        assert_eq!(ctx.anchored_entry(), PathBuf::from("/src/main.go"));
    }

    #[test]
    fn test_artifact_accessors() {
        assert_eq!(
            Artifact::File(PathBuf::from("a")).into_path(),
            Some(PathBuf::from("a"))
        );
        assert_eq!(Artifact::Bytes(vec![1]).into_bytes(), Some(vec![1]));
        assert_eq!(Artifact::Bytes(vec![1]).into_path(), None);
    }
}
