//! Caller-facing log sink.

use std::fmt;
use std::sync::Arc;

/// Receives human-readable progress messages.
///
/// The default sink discards everything. Structured diagnostics go through
/// `tracing` independently of the sink.
#[derive(Clone)]
pub struct LogSink(Arc<dyn Fn(&str) + Send + Sync>);

impl LogSink {
    pub fn new<F>(sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self(Arc::new(sink))
    }

    /// A sink that drops every message.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn log(&self, message: impl AsRef<str>) {
        (self.0)(message.as_ref());
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LogSink")
    }
}
