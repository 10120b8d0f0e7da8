//! Compiler process supervision
//!
//! Spawns the compiler, drains its output streams on helper threads and
//! polls both the child and the job's [`CancelScope`]. When the scope is
//! cancelled or expires the child's process group gets SIGTERM, then SIGKILL
//! after the grace period.

use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::cancel::{CancelScope, ScopeStatus};
use crate::error::{CompileError, CompileResult};

/// Interval between child/scope polls.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Read buffer size for output draining.
const CHUNK_SIZE: usize = 8 * 1024;

/// How the child's output streams are captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCapture {
    /// stdout and stderr interleaved into one buffer
    Combined,
    /// stdout and stderr in separate buffers
    Split,
}

/// One compiler invocation.
#[derive(Debug, Clone)]
pub struct ProcessSpec<'a> {
    pub program: &'a str,
    pub args: &'a [String],
    /// Working directory; empty means the current directory.
    pub cwd: &'a Path,
    /// Overrides applied on top of the inherited environment.
    pub env: &'a BTreeMap<String, String>,
    pub capture: OutputCapture,
    pub kill_grace: Duration,
}

/// Why the child stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited on its own
    Exited(ExitStatus),
    /// Stopped because the scope was cancelled
    Cancelled,
    /// Stopped because the deadline elapsed
    TimedOut,
}

/// Captured result of a finished child.
#[derive(Debug)]
pub struct ProcessOutput {
    pub termination: Termination,
    /// stdout, or the combined stream for [`OutputCapture::Combined`]
    pub stdout: Vec<u8>,
    /// stderr; empty for [`OutputCapture::Combined`]
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        matches!(self.termination, Termination::Exited(status) if status.success())
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.termination {
            Termination::Exited(status) => status.code(),
            _ => None,
        }
    }

    /// Diagnostic text: stderr when split, the combined stream otherwise.
    pub fn diagnostics(&self) -> String {
        let bytes = if self.stderr.is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        String::from_utf8_lossy(bytes).into_owned()
    }
}

type Buffer = Arc<Mutex<Vec<u8>>>;

/// Run `spec` to completion under `scope`.
///
/// Fails with [`CompileError::Timeout`] without spawning when the scope has
/// already expired, and with [`CompileError::Invocation`] when the program
/// cannot be started. Cancellation and expiry after spawn are reported in
/// [`ProcessOutput::termination`] so callers can clean up first.
pub fn run(spec: &ProcessSpec<'_>, scope: &CancelScope) -> CompileResult<ProcessOutput> {
    match scope.status() {
        ScopeStatus::Live => {}
        ScopeStatus::Cancelled => return Err(CompileError::Cancelled),
        ScopeStatus::Expired => {
            return Err(CompileError::Timeout {
                timeout: scope.timeout(),
            })
        }
    }

    let mut command = Command::new(spec.program);
    command
        .args(spec.args)
        .envs(spec.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if !spec.cwd.as_os_str().is_empty() {
        command.current_dir(spec.cwd);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Own process group, so termination reaches the compiler's children.
        command.process_group(0);
    }

    let mut child = command.spawn().map_err(|source| CompileError::Invocation {
        command: spec.program.to_string(),
        source,
    })?;
    debug!(pid = child.id(), program = spec.program, args = ?spec.args, "compiler started");

    let stdout_buf: Buffer = Arc::default();
    let stderr_buf: Buffer = match spec.capture {
        OutputCapture::Combined => Arc::clone(&stdout_buf),
        OutputCapture::Split => Arc::default(),
    };

    let mut drains = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        drains.push(drain(stdout, Arc::clone(&stdout_buf)));
    }
    if let Some(stderr) = child.stderr.take() {
        drains.push(drain(stderr, Arc::clone(&stderr_buf)));
    }

    let waited = supervise(&mut child, scope, spec.kill_grace);

    for handle in drains {
        let _ = handle.join();
    }
    let termination = waited?;

    let stdout = take(&stdout_buf);
    let stderr = match spec.capture {
        OutputCapture::Combined => Vec::new(),
        OutputCapture::Split => take(&stderr_buf),
    };

    debug!(?termination, stdout_len = stdout.len(), stderr_len = stderr.len(), "compiler finished");

    Ok(ProcessOutput {
        termination,
        stdout,
        stderr,
    })
}

/// Wait for the child, stopping it if the scope ends first.
fn supervise(child: &mut Child, scope: &CancelScope, grace: Duration) -> io::Result<Termination> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Termination::Exited(status)),
            Ok(None) => {}
            Err(e) => {
                terminate(child, grace);
                return Err(e);
            }
        }

        match scope.status() {
            ScopeStatus::Live => {
                let remaining = scope.deadline().remaining();
                thread::sleep(POLL_INTERVAL.min(remaining.max(Duration::from_millis(1))));
            }
            ScopeStatus::Cancelled => {
                terminate(child, grace);
                return Ok(Termination::Cancelled);
            }
            ScopeStatus::Expired => {
                warn!(pid = child.id(), timeout = ?scope.timeout(), "compiler timed out");
                terminate(child, grace);
                return Ok(Termination::TimedOut);
            }
        }
    }
}

/// Terminate a child gracefully then forcefully.
fn terminate(child: &mut Child, grace: Duration) {
    signal_group(child, false);

    let start = Instant::now();
    while start.elapsed() < grace {
        match child.try_wait() {
            Ok(Some(_)) => {
                // The leader is gone; make sure stragglers holding our
                // pipes go too.
                signal_group(child, true);
                return;
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(_) => break,
        }
    }

    signal_group(child, true);
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
fn signal_group(child: &Child, force: bool) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
    let _ = killpg(Pid::from_raw(child.id() as i32), signal);
}

#[cfg(not(unix))]
fn signal_group(child: &mut Child, _force: bool) {
    let _ = child.kill();
}

fn drain<R: Read + Send + 'static>(mut reader: R, sink: Buffer) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => sink
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    })
}

fn take(buffer: &Buffer) -> Vec<u8> {
    std::mem::take(&mut *buffer.lock().unwrap_or_else(PoisonError::into_inner))
}
