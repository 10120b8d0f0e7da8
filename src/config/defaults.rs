//! Built-in defaults for a build configuration.

use std::time::Duration;

/// Compiler command used when none is configured.
pub const DEFAULT_COMMAND: &str = "go";

/// Maximum compilation time when none (or zero) is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Time between SIGTERM and SIGKILL when stopping a compiler process.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_millis(500);
