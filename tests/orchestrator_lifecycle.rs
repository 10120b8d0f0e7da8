//! Orchestrator lifecycle tests
//!
//! Asynchronous completion, supersession and cancellation. Slow
//! compilations are parked in the fake compiler until something stops them.

#![cfg(unix)]

mod fixtures;

use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use fixtures::{Project, SYNTAX_ERROR_SOURCE};
use gobuild::{CompileResult, ErrorKind, JobState, Orchestrator};

const WAIT: Duration = Duration::from_secs(10);

type Tagged = (u32, CompileResult<PathBuf>);

/// Receive `n` tagged results, ordered by tag.
fn collect(rx: &mpsc::Receiver<Tagged>, n: usize) -> Vec<Tagged> {
    let mut results: Vec<Tagged> = (0..n).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
    results.sort_by_key(|(tag, _)| *tag);
    results
}

// =============================================================================
// Asynchronous completion
// =============================================================================

#[test]
fn test_async_compile_reports_through_callback() {
    let project = Project::valid();
    let orch = Orchestrator::new(project.config()).unwrap();
    let (tx, rx) = mpsc::channel::<Tagged>();

    let pending = orch.compile_to_disk_async(move |result| {
        let _ = tx.send((1, result));
    });

    let (_, result) = rx.recv_timeout(WAIT).unwrap();
    let path = result.unwrap();
    assert_eq!(path, orch.final_output_path());
    assert!(path.exists());

    let job_id = pending.job_id();
    pending.join().unwrap();
    assert!(!orch.is_compiling());
    assert!(orch.active_job().map_or(true, |job| job.id != job_id));
}

#[test]
fn test_async_failure_reaches_callback() {
    let project = Project::new(SYNTAX_ERROR_SOURCE);
    let orch = Orchestrator::new(project.config()).unwrap();
    let (tx, rx) = mpsc::channel::<Tagged>();

    let pending = orch.compile_to_disk_async(move |result| {
        let _ = tx.send((1, result));
    });

    let (_, result) = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Build);

    let snapshot = pending.snapshot();
    pending.join().unwrap();
    assert_eq!(snapshot.state, JobState::Failed);
    assert!(!orch.is_compiling());
}

#[test]
fn test_compile_uses_configured_callback() {
    let project = Project::valid();
    let (tx, rx) = mpsc::channel::<Tagged>();
    let config = project.config().with_on_complete(move |result| {
        let _ = tx.send((1, result));
    });
    let orch = Orchestrator::new(config).unwrap();

    orch.compile().unwrap();

    let (_, result) = rx.recv_timeout(WAIT).unwrap();
    assert!(result.unwrap().exists());
}

#[test]
fn test_compile_without_callback_blocks() {
    let project = Project::valid();
    let orch = Orchestrator::new(project.config()).unwrap();

    orch.compile().unwrap();

    assert!(orch.final_output_path().exists());
    assert!(!orch.is_compiling());
}

// =============================================================================
// Cancellation
// =============================================================================

#[test]
fn test_async_compile_returns_immediately_and_cancels() {
    let project = Project::valid();
    project.set_slow(true);
    let orch = Orchestrator::new(project.config()).unwrap();
    let (tx, rx) = mpsc::channel::<Tagged>();

    let start = Instant::now();
    let pending = orch.compile_to_disk_async(move |result| {
        let _ = tx.send((1, result));
    });
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(orch.is_compiling());
    assert_eq!(orch.active_job().map(|job| job.id), Some(pending.job_id()));

    assert!(project.wait_until_sleeping());
    assert!(orch.cancel());
    assert!(!orch.is_compiling());

    let (_, result) = rx.recv_timeout(WAIT).unwrap();
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(err.is_interrupted());
    assert_eq!(pending.state(), JobState::Superseded);

    pending.join().unwrap();
    assert!(!orch.final_output_path().exists());
    assert!(project.leftover_temp_files().is_empty());
}

#[test]
fn test_cancel_twice_is_safe() {
    let project = Project::valid();
    project.set_slow(true);
    let orch = Orchestrator::new(project.config()).unwrap();

    let pending = orch.compile_to_disk_async(|_| {});
    assert!(project.wait_until_sleeping());

    assert!(orch.cancel());
    assert!(!orch.cancel());
    pending.join().unwrap();
    assert!(!orch.cancel());
}

#[test]
fn test_timeout_bounds_async_compile() {
    let project = Project::valid();
    project.set_slow(true);
    let orch =
        Orchestrator::new(project.config().with_timeout(Duration::from_millis(300))).unwrap();
    let (tx, rx) = mpsc::channel::<Tagged>();

    let pending = orch.compile_to_disk_async(move |result| {
        let _ = tx.send((1, result));
    });

    let (_, result) = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Timeout);
    pending.join().unwrap();
    assert!(!orch.is_compiling());
}

// =============================================================================
// Supersession
// =============================================================================

#[test]
fn test_second_async_compile_supersedes_first() {
    let project = Project::valid();
    project.set_slow(true);
    let orch = Orchestrator::new(project.config()).unwrap();
    let (tx, rx) = mpsc::channel::<Tagged>();

    let tx1 = tx.clone();
    let first = orch.compile_to_disk_async(move |result| {
        let _ = tx1.send((1, result));
    });
    assert!(project.wait_until_sleeping());

    project.set_slow(false);
    let start = Instant::now();
    let second = orch.compile_to_disk_async(move |result| {
        let _ = tx.send((2, result));
    });
    assert!(start.elapsed() < Duration::from_secs(1), "supersession must not wait");

    assert_eq!(first.state(), JobState::Superseded);
    assert_ne!(first.job_id(), second.job_id());

    let mut results = collect(&rx, 2).into_iter();
    let (_, first_result) = results.next().unwrap();
    assert_eq!(first_result.unwrap_err().kind(), ErrorKind::Cancelled);
    let (_, second_result) = results.next().unwrap();
    assert!(second_result.unwrap().exists());

    first.join().unwrap();
    second.join().unwrap();
    assert!(!orch.is_compiling());
    assert!(project.leftover_temp_files().is_empty());
}

#[test]
fn test_sync_compile_supersedes_async() {
    let project = Project::valid();
    project.set_slow(true);
    let orch = Orchestrator::new(project.config()).unwrap();
    let (tx, rx) = mpsc::channel::<Tagged>();

    let first = orch.compile_to_disk_async(move |result| {
        let _ = tx.send((1, result));
    });
    assert!(project.wait_until_sleeping());

    project.set_slow(false);
    let path = orch.compile_to_disk().unwrap();
    assert!(path.exists());

    let (_, result) = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Cancelled);
    first.join().unwrap();

    // The superseded job's cleanup must not touch the promoted binary.
    assert!(path.exists());
    assert!(!orch.is_compiling());
}

#[test]
fn test_memory_compile_supersedes_disk() {
    let project = Project::valid();
    project.set_slow(true);
    let orch = Orchestrator::new(project.config()).unwrap();
    let (tx, rx) = mpsc::channel::<Tagged>();

    let first = orch.compile_to_disk_async(move |result| {
        let _ = tx.send((1, result));
    });
    assert!(project.wait_until_sleeping());

    project.set_slow(false);
    let bytes = orch.compile_to_memory().unwrap();
    assert!(bytes.starts_with(b"FAKEBIN:"));

    let (_, result) = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Cancelled);
    first.join().unwrap();
    assert!(!orch.final_output_path().exists());
}

#[test]
fn test_clones_share_the_active_slot() {
    let project = Project::valid();
    project.set_slow(true);
    let orch = Orchestrator::new(project.config()).unwrap();
    let handle = orch.clone();

    let pending = orch.compile_to_disk_async(|_| {});
    assert!(project.wait_until_sleeping());

    assert!(handle.is_compiling());
    assert!(handle.cancel());
    assert!(!orch.is_compiling());
    pending.join().unwrap();
}
