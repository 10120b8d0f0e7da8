//! Disk output: compile to a unique temp file, then rename into place.

use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use super::{check_output, remove_artifact, Artifact, BuildContext, OutputStrategy};
use crate::error::{CompileError, CompileResult};
use crate::job::{unique_temp_name, ArtifactTarget, CompilationJob, OutputMode};
use crate::process::{self, OutputCapture, ProcessSpec};

/// Writes the binary to `<output_dir>/<out_name>_temp_…` and promotes it to
/// the final path only after the compiler succeeded.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskStrategy;

impl OutputStrategy for DiskStrategy {
    fn mode(&self) -> OutputMode {
        OutputMode::Disk
    }

    fn target(&self, ctx: &BuildContext<'_>, job_id: u64) -> ArtifactTarget {
        ArtifactTarget::TempFile(unique_temp_name(
            &ctx.config.out_name,
            &ctx.config.extension,
            job_id,
        ))
    }

    fn produce(&self, ctx: &BuildContext<'_>, job: &CompilationJob) -> CompileResult<Artifact> {
        let temp_name = match job.target() {
            ArtifactTarget::TempFile(name) => name.as_str(),
            ArtifactTarget::Memory => {
                return Err(CompileError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "disk compilation requires a temp file target",
                )))
            }
        };
        let temp_path = ctx.output_dir.join(temp_name);

        ctx.ensure_output_dir()?;

        let args = ctx.output_dir_arguments(temp_name);
        let spec = ProcessSpec {
            program: &ctx.config.command,
            args: &args,
            cwd: ctx.output_dir,
            env: &ctx.config.env,
            capture: OutputCapture::Combined,
            kill_grace: ctx.config.kill_grace,
        };

        let outcome = process::run(&spec, job.scope())
            .and_then(|output| check_output(&output, job.scope()));
        if let Err(e) = outcome {
            remove_artifact(&temp_path);
            return Err(e);
        }
        // Exited cleanly but was superseded meanwhile: the newer job owns the
        // final path.
        if job.scope().is_cancelled() {
            remove_artifact(&temp_path);
            return Err(CompileError::Cancelled);
        }

        promote(&temp_path, ctx.final_path)?;
        Ok(Artifact::File(ctx.final_path.to_path_buf()))
    }
}

/// Rename a temp artifact to its final name.
///
/// The temp artifact is removed if the rename fails.
pub(crate) fn promote(temp_path: &Path, final_path: &Path) -> CompileResult<()> {
    if let Err(source) = fs::rename(temp_path, final_path) {
        remove_artifact(temp_path);
        return Err(CompileError::Promote {
            from: temp_path.to_path_buf(),
            to: final_path.to_path_buf(),
            source,
        });
    }
    debug!(from = %temp_path.display(), to = %final_path.display(), "promoted artifact");
    Ok(())
}
