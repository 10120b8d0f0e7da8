//! Argument construction for compiler build invocations.
//!
//! Produces the ordered argv for `<command> build [flags...]
//! [-ldflags=<link flags>] -o <destination> <entry>`. Construction is pure:
//! identical inputs always yield identical output, and nothing here touches
//! the filesystem or the process environment.

mod link;

pub use link::{split_link_flags, SplitFlags, LINK_DEFINE_PREFIX};

use std::path::Path;

/// The build subcommand, always the first token.
pub const BUILD_SUBCOMMAND: &str = "build";

/// Flag that introduces the output destination.
pub const OUTPUT_FLAG: &str = "-o";

/// Prefix of the consolidated link-flags argument.
pub const LDFLAGS_PREFIX: &str = "-ldflags=";

/// Destination that makes the compiler write the binary to its stdout.
pub const STDOUT_PSEUDO_PATH: &str = "/dev/stdout";

/// Prefix shared by the standard-stream pseudo-paths.
const STREAM_PSEUDO_PREFIX: &str = "/dev/";

/// Build the full argument list for one invocation.
///
/// `destination` is used verbatim when it is absolute or a standard-stream
/// pseudo-path; otherwise it is joined onto `output_dir`.
pub fn build_arguments(
    extra_flags: &[String],
    destination: &str,
    output_dir: &Path,
    entry: &str,
) -> Vec<String> {
    let split = split_link_flags(extra_flags);
    let ldflags = split.ldflags_argument();

    let mut args = Vec::with_capacity(split.passthrough.len() + 5);
    args.push(BUILD_SUBCOMMAND.to_string());
    args.extend(split.passthrough);

    if let Some(ldflags) = ldflags {
        args.push(ldflags);
    }

    args.push(OUTPUT_FLAG.to_string());
    args.push(resolve_destination(destination, output_dir));
    args.push(entry.to_string());
    args
}

/// Resolve the `-o` value for `destination`.
pub fn resolve_destination(destination: &str, output_dir: &Path) -> String {
    if is_verbatim_destination(destination) {
        return destination.to_string();
    }
    output_dir.join(destination).to_string_lossy().into_owned()
}

/// Whether `destination` bypasses the output directory.
pub fn is_verbatim_destination(destination: &str) -> bool {
    destination.starts_with(STREAM_PSEUDO_PREFIX) || Path::new(destination).is_absolute()
}
