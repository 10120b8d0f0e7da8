//! Test fixtures for compiler orchestration tests
//!
//! Provides a shell-script stand-in for the compiler and throwaway project
//! directories. The fake compiler understands `build [flags...] -o <dest>
//! <entry>` and:
//! - records its argv, one token per line, in `last_args.txt`
//! - fails with a `syntax error` diagnostic when the entry contains `SYNTAX`
//! - exits cleanly without output for `-o /dev/stdout` while `nostdout.flag`
//!   exists
//! - sleeps while `slow.flag` exists, after touching `sleeping.flag`
//! - otherwise writes `FAKEBIN:<$FAKE_STAMP>:` followed by 2048 zero bytes

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use std::thread::sleep;
use std::time::{Duration, Instant};

use gobuild::BuildConfig;

pub const VALID_SOURCE: &str = "package main\n\nfunc main() {\n\tprintln(\"hello\")\n}\n";

pub const SYNTAX_ERROR_SOURCE: &str = "package main\n\n// SYNTAX\nfunc main() {\n\tprintln(\"hello\"\n}\n";

const FAKE_COMPILER: &str = r#"#!/bin/sh
printf '%s\n' "$@" > last_args.txt
out=""
entry=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    *) entry="$1"; shift ;;
  esac
done
if [ -z "$out" ] || [ ! -f "$entry" ]; then
  echo "fakego: cannot find entry '$entry'" >&2
  exit 1
fi
if grep -q SYNTAX "$entry"; then
  echo "$entry:3:1: syntax error: unexpected newline" >&2
  exit 2
fi
if [ -f nostdout.flag ] && [ "$out" = /dev/stdout ]; then
  exit 0
fi
if [ -f slow.flag ]; then
  touch sleeping.flag
  exec sleep 30
fi
{ printf 'FAKEBIN:%s:' "${FAKE_STAMP:-none}"; head -c 2048 /dev/zero; } > "$out"
"#;

/// Path to the fake compiler, written once per test binary.
///
/// Written before any test spawns a process, which keeps exec from racing
/// a still-open write handle.
pub fn fake_compiler() -> &'static Path {
    static COMPILER: OnceLock<PathBuf> = OnceLock::new();
    COMPILER.get_or_init(|| {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("gobuild-fake-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("fakego");
        fs::write(&path, FAKE_COMPILER).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    })
}

/// Whether a real `go` toolchain is on PATH.
pub fn go_available() -> bool {
    Command::new("go")
        .arg("version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// A throwaway project with `main.go` at its root.
pub struct Project {
    pub dir: tempfile::TempDir,
}

impl Project {
    pub fn new(source: &str) -> Self {
        // Force the compiler into existence before any process is spawned.
        fake_compiler();
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.go"), source).unwrap();
        Self { dir }
    }

    pub fn valid() -> Self {
        Self::new(VALID_SOURCE)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Configuration building `main.go` into `<project>/app` with the fake
    /// compiler.
    pub fn config(&self) -> BuildConfig {
        BuildConfig::new("main.go", "app")
            .with_command(fake_compiler().to_string_lossy())
            .with_root_dir(self.path())
            .with_output_dir(self.path())
            .with_timeout(Duration::from_secs(10))
            .with_kill_grace(Duration::from_millis(100))
    }

    pub fn set_slow(&self, slow: bool) {
        let flag = self.path().join("slow.flag");
        if slow {
            fs::write(flag, b"").unwrap();
        } else {
            let _ = fs::remove_file(flag);
        }
    }

    /// Make stdout capture come back empty.
    pub fn set_no_stdout(&self) {
        fs::write(self.path().join("nostdout.flag"), b"").unwrap();
    }

    /// Wait until a slow compilation is sleeping, then reset the marker.
    pub fn wait_until_sleeping(&self) -> bool {
        let marker = self.path().join("sleeping.flag");
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(5) {
            if marker.exists() {
                let _ = fs::remove_file(&marker);
                return true;
            }
            sleep(Duration::from_millis(10));
        }
        false
    }

    /// Argv of the most recent fake compiler run.
    pub fn last_args(&self) -> Vec<String> {
        fs::read_to_string(self.path().join("last_args.txt"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Names of temp artifacts left in the project directory.
    pub fn leftover_temp_files(&self) -> Vec<String> {
        fs::read_dir(self.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains("_temp"))
            .collect()
    }
}
