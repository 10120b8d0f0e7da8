//! Link-flag extraction.
//!
//! Linker defines (`-X key=value`) cannot be passed to `build` directly; they
//! must travel inside a single `-ldflags=` argument.

use crate::LDFLAGS_PREFIX;

/// Prefix of a linker define flag.
pub const LINK_DEFINE_PREFIX: &str = "-X";

/// Extra flags partitioned into pass-through flags and link flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitFlags {
    /// Flags passed to `build` unchanged, in original order.
    pub passthrough: Vec<String>,

    /// Tokens destined for the linker, in original order.
    pub link: Vec<String>,
}

impl SplitFlags {
    /// The consolidated `-ldflags=` argument, if any link flags were seen.
    pub fn ldflags_argument(&self) -> Option<String> {
        if self.link.is_empty() {
            None
        } else {
            Some(format!("{}{}", LDFLAGS_PREFIX, self.link.join(" ")))
        }
    }
}

/// Divert linker defines out of `flags`.
///
/// A bare `-X` followed by another token consumes that token as its value.
/// `-X key=value` in a single token and any other `-X`-prefixed token are
/// kept whole.
pub fn split_link_flags(flags: &[String]) -> SplitFlags {
    let mut split = SplitFlags::default();
    let mut iter = flags.iter().peekable();

    while let Some(flag) = iter.next() {
        if !flag.starts_with(LINK_DEFINE_PREFIX) {
            split.passthrough.push(flag.clone());
            continue;
        }

        split.link.push(flag.clone());
        if flag == LINK_DEFINE_PREFIX {
            if let Some(value) = iter.next() {
                split.link.push(value.clone());
            }
        }
    }

    split
}
