//! Memory output: capture the binary without keeping a file around.
//!
//! The preferred technique points `-o` at `/dev/stdout` and collects the
//! compiler's standard output. Where that pseudo-path is unavailable (or
//! yields nothing) the binary is staged in a unique temp file, read back and
//! deleted.

use std::fs;

use gobuild_args::STDOUT_PSEUDO_PATH;
use tracing::{debug, warn};

use super::{check_output, remove_artifact, Artifact, BuildContext, OutputStrategy};
use crate::config::MemoryCapture;
use crate::error::{CompileError, CompileResult};
use crate::job::{unique_temp_name, ArtifactTarget, CompilationJob, OutputMode};
use crate::process::{self, OutputCapture, ProcessSpec};

/// Compiles straight into an in-process buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStrategy {
    capture: MemoryCapture,
}

impl MemoryStrategy {
    pub fn new(capture: MemoryCapture) -> Self {
        Self { capture }
    }

    pub fn capture(&self) -> MemoryCapture {
        self.capture
    }

    fn via_stdout(&self, ctx: &BuildContext<'_>, job: &CompilationJob) -> CompileResult<Vec<u8>> {
        let args = ctx.arguments(STDOUT_PSEUDO_PATH);
        let output = process::run(&self.spec(ctx, &args), job.scope())?;

        // Output produced after the deadline is never trusted.
        if job.scope().is_expired() && !job.scope().is_cancelled() {
            return Err(CompileError::Timeout {
                timeout: job.scope().timeout(),
            });
        }
        check_output(&output, job.scope())?;
        Ok(output.stdout)
    }

    fn via_staged_file(
        &self,
        ctx: &BuildContext<'_>,
        job: &CompilationJob,
    ) -> CompileResult<Vec<u8>> {
        ctx.ensure_output_dir()?;

        let name = unique_temp_name(&ctx.config.out_name, &ctx.config.extension, job.id());
        let staged = ctx.output_dir.join(name);
        let destination = staged.to_string_lossy().into_owned();
        let args = ctx.arguments(&destination);

        let result = process::run(&self.spec(ctx, &args), job.scope())
            .and_then(|output| check_output(&output, job.scope()))
            .and_then(|()| fs::read(&staged).map_err(CompileError::from));
        remove_artifact(&staged);
        result
    }

    fn spec<'a>(&self, ctx: &BuildContext<'a>, args: &'a [String]) -> ProcessSpec<'a> {
        ProcessSpec {
            program: &ctx.config.command,
            args,
            cwd: ctx.root_dir,
            env: &ctx.config.env,
            capture: OutputCapture::Split,
            kill_grace: ctx.config.kill_grace,
        }
    }
}

impl OutputStrategy for MemoryStrategy {
    fn mode(&self) -> OutputMode {
        OutputMode::Memory
    }

    fn target(&self, _ctx: &BuildContext<'_>, _job_id: u64) -> ArtifactTarget {
        ArtifactTarget::Memory
    }

    fn produce(&self, ctx: &BuildContext<'_>, job: &CompilationJob) -> CompileResult<Artifact> {
        let bytes = match self.capture.resolve() {
            MemoryCapture::Staged => self.via_staged_file(ctx, job)?,
            _ => {
                let bytes = self.via_stdout(ctx, job)?;
                if bytes.is_empty() && self.capture == MemoryCapture::Auto {
                    warn!(job_id = job.id(), "stdout capture produced no bytes, staging via temp file");
                    self.via_staged_file(ctx, job)?
                } else {
                    bytes
                }
            }
        };

        debug!(job_id = job.id(), len = bytes.len(), "captured binary in memory");
        Ok(Artifact::Bytes(bytes))
    }
}
