//! TOML configuration files
//!
//! ```toml
//! root_dir = "."
//! command = "tinygo"
//! entry = "web/main.wasm.go"
//! out_name = "main"
//! extension = ".wasm"
//! output_dir = "web/public"
//! flags = ["-X", "main.version=v1.0.0"]
//! timeout_ms = 20000
//! memory_capture = "staged"
//!
//! [env]
//! GOOS = "js"
//! GOARCH = "wasm"
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use super::{BuildConfig, ConfigError, MemoryCapture};

/// On-disk form of a [`BuildConfig`].
///
/// Callbacks and log sinks have no file representation; they keep their
/// defaults and can be attached afterwards with the `with_*` setters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub root_dir: Option<PathBuf>,
    pub command: Option<String>,
    pub entry: Option<String>,
    pub out_name: Option<String>,
    pub extension: Option<String>,
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub flags: Vec<String>,
    pub timeout_ms: Option<u64>,
    pub kill_grace_ms: Option<u64>,
    pub memory_capture: Option<MemoryCapture>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl ConfigFile {
    /// Convert into a validated [`BuildConfig`].
    pub fn into_config(self) -> Result<BuildConfig, ConfigError> {
        let entry = self.entry.ok_or(ConfigError::MissingKey("entry"))?;
        let out_name = self.out_name.ok_or(ConfigError::MissingKey("out_name"))?;

        let mut config = BuildConfig::new(entry, out_name);
        if let Some(root) = self.root_dir {
            config.root_dir = root;
        }
        if let Some(command) = self.command {
            config.command = command;
        }
        if let Some(extension) = self.extension {
            config.extension = extension;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if !self.flags.is_empty() {
            config = config.with_static_flags(self.flags);
        }
        if let Some(ms) = self.timeout_ms {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.kill_grace_ms {
            config.kill_grace = Duration::from_millis(ms);
        }
        if let Some(capture) = self.memory_capture {
            config.memory_capture = capture;
        }
        config.env = self.env;

        config.validate()?;
        Ok(config)
    }
}
