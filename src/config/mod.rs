//! Build configuration
//!
//! A [`BuildConfig`] describes one program to compile: where its sources
//! live, which compiler to call, where the binary goes and how long a single
//! compilation may take. Configurations are built in code with the `with_*`
//! setters or loaded from a TOML file (see [`BuildConfig::from_file`]).

mod defaults;
mod file;

pub use defaults::{DEFAULT_COMMAND, DEFAULT_KILL_GRACE, DEFAULT_TIMEOUT};
pub use file::ConfigFile;

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CompileResult;
use crate::log::LogSink;

/// Produces extra compiler flags at invocation time.
pub type FlagsProvider = Arc<dyn Fn() -> Vec<String> + Send + Sync>;

/// Receives the terminal result of an asynchronous disk compilation.
pub type CompileCallback = Arc<dyn Fn(CompileResult<PathBuf>) + Send + Sync>;

/// How memory compilations obtain the binary bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryCapture {
    /// `Stdout` where the platform supports it, `Staged` elsewhere.
    #[default]
    Auto,
    /// Have the compiler write the binary to its standard output.
    Stdout,
    /// Compile to a temp file, read it back, then delete it.
    Staged,
}

impl MemoryCapture {
    /// Resolve `Auto` for the current platform.
    pub fn resolve(self) -> MemoryCapture {
        match self {
            MemoryCapture::Auto if cfg!(unix) => MemoryCapture::Stdout,
            MemoryCapture::Auto => MemoryCapture::Staged,
            other => other,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("missing required key `{0}`")]
    MissingKey(&'static str),

    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration for compiling one program.
#[derive(Clone)]
pub struct BuildConfig {
    /// Project root; working directory for memory compilations.
    pub root_dir: PathBuf,
    /// Compiler executable, e.g. `go` or `tinygo`.
    pub command: String,
    /// Entry source file, e.g. `cmd/server/main.go`.
    pub entry: String,
    /// Output base name, e.g. `app`.
    pub out_name: String,
    /// Output extension including the dot, e.g. `.wasm`. May be empty.
    pub extension: String,
    /// Output directory. Relative paths resolve against `root_dir`.
    pub output_dir: PathBuf,
    /// Extra compiler flags, queried once per invocation.
    pub extra_flags: Option<FlagsProvider>,
    /// Human-readable progress messages.
    pub logger: LogSink,
    /// Completion callback; its presence makes [`compile`] asynchronous.
    ///
    /// [`compile`]: crate::Orchestrator::compile
    pub on_complete: Option<CompileCallback>,
    /// Maximum time for one compilation. Zero means the default.
    pub timeout: Duration,
    /// Grace period between SIGTERM and SIGKILL.
    pub kill_grace: Duration,
    /// Memory compilation technique.
    pub memory_capture: MemoryCapture,
    /// Environment overrides applied on top of the inherited environment.
    pub env: BTreeMap<String, String>,
}

impl BuildConfig {
    /// Create a configuration for `entry` producing `out_name`.
    pub fn new(entry: impl Into<String>, out_name: impl Into<String>) -> Self {
        Self {
            root_dir: PathBuf::new(),
            command: DEFAULT_COMMAND.to_string(),
            entry: entry.into(),
            out_name: out_name.into(),
            extension: String::new(),
            output_dir: PathBuf::new(),
            extra_flags: None,
            logger: LogSink::noop(),
            on_complete: None,
            timeout: DEFAULT_TIMEOUT,
            kill_grace: DEFAULT_KILL_GRACE,
            memory_capture: MemoryCapture::Auto,
            env: BTreeMap::new(),
        }
    }

    pub fn with_root_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.root_dir = dir.into();
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set a provider queried for extra flags on every invocation.
    pub fn with_extra_flags<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Vec<String> + Send + Sync + 'static,
    {
        self.extra_flags = Some(Arc::new(provider));
        self
    }

    /// Use a fixed list of extra flags.
    pub fn with_static_flags(self, flags: Vec<String>) -> Self {
        self.with_extra_flags(move || flags.clone())
    }

    pub fn with_logger<F>(mut self, sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.logger = LogSink::new(sink);
        self
    }

    pub fn with_on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(CompileResult<PathBuf>) + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(callback));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    pub fn with_memory_capture(mut self, capture: MemoryCapture) -> Self {
        self.memory_capture = capture;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Check the fields every invocation depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command.trim().is_empty() {
            return Err(ConfigError::Empty("command"));
        }
        if self.entry.trim().is_empty() {
            return Err(ConfigError::Empty("entry"));
        }
        if self.out_name.trim().is_empty() {
            return Err(ConfigError::Empty("out_name"));
        }
        Ok(())
    }

    /// The output directory with relative paths anchored at `root_dir`.
    pub fn resolved_output_dir(&self) -> PathBuf {
        if self.output_dir.is_absolute() || self.root_dir.as_os_str().is_empty() {
            self.output_dir.clone()
        } else {
            self.root_dir.join(&self.output_dir)
        }
    }

    /// Current extra flags, empty when no provider is set.
    pub fn flags(&self) -> Vec<String> {
        self.extra_flags
            .as_ref()
            .map(|provider| provider())
            .unwrap_or_default()
    }

    /// Load a configuration from a TOML string.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(source)?;
        file.into_config()
    }

    /// Load a configuration from a TOML file.
    ///
    /// A relative `root_dir` in the file is taken relative to the file's
    /// directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&source)?;
        if config.root_dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.root_dir = parent.join(&config.root_dir);
            }
        }
        Ok(config)
    }
}

impl fmt::Debug for BuildConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildConfig")
            .field("root_dir", &self.root_dir)
            .field("command", &self.command)
            .field("entry", &self.entry)
            .field("out_name", &self.out_name)
            .field("extension", &self.extension)
            .field("output_dir", &self.output_dir)
            .field("extra_flags", &self.extra_flags.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("timeout", &self.timeout)
            .field("kill_grace", &self.kill_grace)
            .field("memory_capture", &self.memory_capture)
            .field("env", &self.env)
            .finish()
    }
}
