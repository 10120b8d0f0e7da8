//! Human-readable binary sizes.

use std::fmt;
use std::sync::Arc;

const KB: f64 = 1024.0;
const MB: f64 = 1024.0 * 1024.0;
const GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Rendering used when no binary is available.
pub const EMPTY_SIZE: &str = "0.0 KB";

/// Returns the current binary image, if any.
pub type BinaryAccessor = Box<dyn Fn() -> Option<Arc<[u8]>> + Send + Sync>;

/// Format `len` bytes as `"<n>.<d> KB|MB|GB"`.
///
/// Picks the largest unit the size reaches, with KB as the floor, so sizes
/// under 1 KB still render in KB (`100` → `"0.1 KB"`).
pub fn format_size(len: u64) -> String {
    let size = len as f64;
    if size >= GB {
        format!("{:.1} GB", size / GB)
    } else if size >= MB {
        format!("{:.1} MB", size / MB)
    } else {
        format!("{:.1} KB", size / KB)
    }
}

/// Formats the size of whatever binary an accessor currently returns.
pub struct BinarySizer {
    accessor: Option<BinaryAccessor>,
}

impl BinarySizer {
    pub fn new<F>(accessor: F) -> Self
    where
        F: Fn() -> Option<Arc<[u8]>> + Send + Sync + 'static,
    {
        Self {
            accessor: Some(Box::new(accessor)),
        }
    }

    /// A sizer with no binary source; always reports [`EMPTY_SIZE`].
    pub fn empty() -> Self {
        Self { accessor: None }
    }

    pub fn binary_size(&self) -> String {
        match self.accessor.as_ref().and_then(|get| get()) {
            Some(bytes) if !bytes.is_empty() => format_size(bytes.len() as u64),
            _ => EMPTY_SIZE.to_string(),
        }
    }
}

impl fmt::Debug for BinarySizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinarySizer")
            .field("accessor", &self.accessor.is_some())
            .finish()
    }
}
