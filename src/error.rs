//! Error types for compilation requests.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors from a compilation request.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to start `{command}`: {source}")]
    Invocation {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("build failed (exit code {}): {diagnostics}", exit_code_label(.exit_code))]
    Build {
        exit_code: Option<i32>,
        diagnostics: String,
    },

    #[error("compilation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("compilation cancelled")]
    Cancelled,

    #[error("compiled but failed to promote {} to {}: {source}", .from.display(), .to.display())]
    Promote {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot prepare output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for compilation requests.
pub type CompileResult<T> = Result<T, CompileError>;

/// Fieldless classification of a [`CompileError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Invocation,
    Build,
    Timeout,
    Cancelled,
    Promote,
    OutputDir,
    Io,
}

impl CompileError {
    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::Config(_) => ErrorKind::Config,
            CompileError::Invocation { .. } => ErrorKind::Invocation,
            CompileError::Build { .. } => ErrorKind::Build,
            CompileError::Timeout { .. } => ErrorKind::Timeout,
            CompileError::Cancelled => ErrorKind::Cancelled,
            CompileError::Promote { .. } => ErrorKind::Promote,
            CompileError::OutputDir { .. } => ErrorKind::OutputDir,
            CompileError::Io(_) => ErrorKind::Io,
        }
    }

    /// Captured compiler diagnostics, for build failures.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            CompileError::Build { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }

    /// True when the process was stopped before it finished on its own.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, CompileError::Timeout { .. } | CompileError::Cancelled)
    }
}

fn exit_code_label(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
