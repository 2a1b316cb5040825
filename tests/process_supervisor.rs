//! Launch and terminate real processes.
#![cfg(unix)]

use std::path::Path;
use std::thread;
use std::time::Duration;

use gui_harness::process::{
    LaunchError, ProcessControl, ProcessState, ProcessSupervisor, TerminationOutcome,
};

const GRACE: Duration = Duration::from_millis(300);

#[test]
fn test_missing_executable() {
    let mut supervisor = ProcessSupervisor::new(GRACE);
    let err = supervisor.launch(Path::new("/nonexistent/xenia")).unwrap_err();
    assert!(matches!(err, LaunchError::NotFound(_)));
}

#[test]
fn test_immediate_exit_reports_code() {
    let mut supervisor = ProcessSupervisor::new(GRACE);
    match supervisor.launch(Path::new("/bin/false")) {
        Err(LaunchError::ExitedImmediately { code, .. }) => assert_eq!(code, Some(1)),
        other => panic!("expected ExitedImmediately, got {:?}", other.map(|p| p.pid())),
    }
}

#[test]
fn test_immediate_exit_captures_output() {
    let mut supervisor =
        ProcessSupervisor::new(GRACE).args(["-c", "echo starting; echo oops >&2; exit 3"]);
    match supervisor.launch(Path::new("/bin/sh")) {
        Err(LaunchError::ExitedImmediately {
            code,
            stdout,
            stderr,
        }) => {
            assert_eq!(code, Some(3));
            assert!(stdout.contains("starting"), "stdout: {:?}", stdout);
            assert!(stderr.contains("oops"), "stderr: {:?}", stderr);
        }
        other => panic!("expected ExitedImmediately, got {:?}", other.map(|p| p.pid())),
    }
}

#[test]
fn test_graceful_terminate_then_idempotent() {
    let mut supervisor = ProcessSupervisor::new(GRACE);
    // cat blocks on its stdin pipe, which the supervisor keeps open
    let mut process = supervisor.launch(Path::new("/bin/cat")).unwrap();
    assert_eq!(process.state(), ProcessState::Running);
    assert_eq!(supervisor.pid(&process), process.pid());

    let first = supervisor
        .terminate(&mut process, Duration::from_secs(5))
        .unwrap();
    assert_eq!(first, TerminationOutcome::GracefulExit);
    assert!(process.state().has_exited());

    let second = supervisor
        .terminate(&mut process, Duration::from_secs(5))
        .unwrap();
    assert_eq!(second, TerminationOutcome::AlreadyExited);
}

#[test]
fn test_ignored_terminate_escalates_to_kill() {
    let mut supervisor = ProcessSupervisor::new(GRACE)
        .args(["-c", "trap '' TERM; while :; do sleep 0.05; done"]);
    let mut process = supervisor.launch(Path::new("/bin/sh")).unwrap();

    let outcome = supervisor
        .terminate(&mut process, Duration::from_millis(300))
        .unwrap();
    assert_eq!(outcome, TerminationOutcome::ForcedKill);
    assert_eq!(process.state(), ProcessState::Killed);

    let again = supervisor
        .terminate(&mut process, Duration::from_millis(300))
        .unwrap();
    assert_eq!(again, TerminationOutcome::AlreadyExited);
}

#[test]
fn test_process_that_exits_on_its_own_is_already_exited() {
    let mut supervisor =
        ProcessSupervisor::new(Duration::from_millis(100)).args(["-c", "sleep 0.4"]);
    let mut process = supervisor.launch(Path::new("/bin/sh")).unwrap();

    thread::sleep(Duration::from_millis(1_000));
    let outcome = supervisor
        .terminate(&mut process, Duration::from_secs(1))
        .unwrap();
    assert_eq!(outcome, TerminationOutcome::AlreadyExited);
    assert_eq!(process.state(), ProcessState::ExitedNormally(0));
}
