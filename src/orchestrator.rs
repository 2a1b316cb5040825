//! Wires the probe, the process supervisor and the sequencer into one run.
//!
//! The flow:
//! 1. Check that the executable and the target file exist (exit 1 otherwise)
//! 2. Probe the automation capability once
//! 3. Prepare the output directory
//! 4. Launch the target under a [`ProcessGuard`]
//! 5. Run the script if a display is ready, otherwise take one
//!    documentation screenshot
//! 6. Terminate the target exactly once, then write `summary.json` listing
//!    the screenshots this run captured

use chrono::Utc;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::capability::{Capability, panic_message};
use crate::config::{self, Timings};
use crate::harness::script::Script;
use crate::harness::sequencer;
use crate::harness::types::{InteractionStep, SequenceReport, StepRecord, StopCause};
use crate::process::{LaunchError, ProcessControl};
use crate::runner::{CleanupReport, LaunchReport, RunOutcome, RunSummary};
use crate::session::Session;
use crate::snapshot::{ScreenshotSink, SnapshotConfig};

/// Label of the single capture taken when no display is available
pub const HEADLESS_LABEL: &str = "headless_environment";

/// Label of the single capture taken in skip-launch mode
pub const SKIP_LAUNCH_LABEL: &str = "skip_launch_mode";

/// Inputs for one run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub executable: PathBuf,
    pub target_file: PathBuf,
    pub output_dir: PathBuf,
    pub skip_launch: bool,
    /// None means the built-in open-file script
    pub script: Option<Script>,
    pub timings: Timings,
    pub include_manifest: bool,
    pub cancel: Arc<AtomicBool>,
}

impl RunOptions {
    /// Options with output directory and timings taken from the environment
    pub fn new(executable: impl Into<PathBuf>, target_file: impl Into<PathBuf>) -> Self {
        let config = config::get();
        Self {
            executable: executable.into(),
            target_file: target_file.into(),
            output_dir: PathBuf::from(&config.output_dir),
            skip_launch: false,
            script: None,
            timings: config.timings.clone(),
            include_manifest: true,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn skip_launch(mut self, skip: bool) -> Self {
        self.skip_launch = skip;
        self
    }

    pub fn script(mut self, script: Script) -> Self {
        self.script = Some(script);
        self
    }

    pub fn timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn include_manifest(mut self, include: bool) -> Self {
        self.include_manifest = include;
        self
    }

    pub fn cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// The script to run, with the target file bound
    fn steps(&self) -> Vec<InteractionStep> {
        match &self.script {
            Some(script) => script.bind_file(&self.target_file),
            None => Script::open_file(&self.timings).bind_file(&self.target_file),
        }
    }

    fn check_preconditions(&self) -> Result<(), String> {
        if !self.executable.exists() {
            return Err(format!(
                "executable not found: {}",
                self.executable.display()
            ));
        }
        if !self.target_file.exists() {
            return Err(format!(
                "target file not found: {}",
                self.target_file.display()
            ));
        }
        Ok(())
    }
}

/// Runs the whole launch / interact / cleanup cycle
pub struct Orchestrator<C: ProcessControl> {
    control: C,
    options: RunOptions,
}

impl<C: ProcessControl> Orchestrator<C> {
    pub fn new(control: C, options: RunOptions) -> Self {
        Self { control, options }
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Execute one run. `probe` is called at most once, after the preconditions pass.
    ///
    /// Never panics past this call and never leaves the target running: every
    /// path after a successful launch goes through [`ProcessGuard::finish`].
    pub fn run<P>(&mut self, probe: P) -> RunSummary
    where
        P: FnOnce() -> Capability,
    {
        let mut summary = RunSummary::new(Utc::now());

        if let Err(reason) = self.options.check_preconditions() {
            error!(%reason, "Precondition failed");
            summary.outcome = RunOutcome::PreconditionFailed { reason };
            summary.finished_at = Utc::now();
            return summary;
        }

        let mut capability = probe();
        summary.capability = Some(capability.status().clone());

        let session = Session::in_dir(&self.options.output_dir);
        if let Err(err) = session.init(Some(&self.options.executable), &self.options.target_file) {
            let reason = format!(
                "cannot prepare output directory {}: {}",
                self.options.output_dir.display(),
                err
            );
            error!(%reason, "Precondition failed");
            summary.outcome = RunOutcome::PreconditionFailed { reason };
            summary.finished_at = Utc::now();
            return summary;
        }
        info!(dir = %session.dir.display(), session = %session.id, "Output directory ready");

        let mut sink = ScreenshotSink::new(SnapshotConfig {
            output_dir: self.options.output_dir.clone(),
            include_manifest: self.options.include_manifest,
        });

        if self.options.skip_launch {
            info!("Skipping application launch");
            summary.launch = LaunchReport::Skipped;
            if capability.is_ready() {
                let outcome = sink.capture(&mut capability, SKIP_LAUNCH_LABEL);
                summary.steps.push(StepRecord {
                    index: 1,
                    step: InteractionStep::Capture {
                        label: SKIP_LAUNCH_LABEL.to_string(),
                    },
                    outcome,
                });
            }
            summary.capture_failures = count_capture_failures(&summary.steps);
            summary.cleanup = Some(CleanupReport::NotLaunched);
            return finalize(summary, &session);
        }

        let steps = self.options.steps();
        let grace = self.options.timings.terminate_grace;
        let cancel = Arc::clone(&self.options.cancel);

        let guard = match ProcessGuard::launch(&mut self.control, &self.options.executable, grace) {
            Ok(guard) => guard,
            Err(err) => {
                error!(error = %err, "Failed to launch target");
                summary.outcome = RunOutcome::LaunchFailed {
                    reason: err.to_string(),
                };
                summary.launch = launch_failure(err);
                summary.cleanup = Some(CleanupReport::NotLaunched);
                return finalize(summary, &session);
            }
        };
        summary.launch = LaunchReport::Launched { pid: guard.pid() };

        let mut report = SequenceReport::default();
        let body = panic::catch_unwind(AssertUnwindSafe(|| {
            interact(&steps, &mut capability, &mut sink, &cancel, &mut report)
        }));
        if let Err(payload) = body {
            let message = panic_message(payload.as_ref());
            error!(%message, "Interaction failed unexpectedly");
            report.stop = Some(StopCause::InternalError { message });
        }

        summary.cleanup = Some(guard.finish());

        summary.automation_success = report.success();
        summary.capture_failures = report.capture_failures();
        summary.stop_cause = report.stop;
        summary.steps = report.records;

        finalize(summary, &session)
    }
}

/// Run the script if the display is ready, otherwise document the headless state
fn interact(
    steps: &[InteractionStep],
    capability: &mut Capability,
    sink: &mut ScreenshotSink,
    cancel: &AtomicBool,
    report: &mut SequenceReport,
) {
    if capability.is_ready() {
        sequencer::run_into(steps, capability, sink, cancel, report);
        return;
    }

    info!("Skipping GUI automation (no display available)");
    let outcome = sink.capture(capability, HEADLESS_LABEL);
    report.records.push(StepRecord {
        index: 1,
        step: InteractionStep::Capture {
            label: HEADLESS_LABEL.to_string(),
        },
        outcome,
    });
    report.stop = Some(StopCause::CapabilityNotReady);
}

fn launch_failure(err: LaunchError) -> LaunchReport {
    let error = err.to_string();
    match err {
        LaunchError::ExitedImmediately {
            code,
            stdout,
            stderr,
        } => LaunchReport::Failed {
            error,
            exit_code: code,
            stdout,
            stderr,
        },
        _ => LaunchReport::Failed {
            error,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
        },
    }
}

fn count_capture_failures(records: &[StepRecord]) -> usize {
    records
        .iter()
        .filter(|r| r.step.is_capture() && !r.outcome.is_success())
        .count()
}

/// Collect this run's screenshots, stamp the finish time and persist the summary
fn finalize(mut summary: RunSummary, session: &Session) -> RunSummary {
    summary.screenshots = summary
        .steps
        .iter()
        .filter_map(|r| r.outcome.artifact().map(Path::to_path_buf))
        .collect();
    summary.finished_at = Utc::now();

    match session.write_summary(&summary) {
        Ok(path) => info!(path = %path.display(), "Summary written"),
        Err(err) => warn!(error = %err, "Failed to write summary"),
    }
    summary
}

/// Owns a launched process and terminates it exactly once.
///
/// Call [`ProcessGuard::finish`] on the normal path to get the cleanup
/// report; if the guard is dropped without it (an unwinding panic), the
/// process is terminated from `Drop` instead.
pub struct ProcessGuard<'a, C: ProcessControl> {
    control: &'a mut C,
    handle: Option<C::Handle>,
    pid: u32,
    grace: Duration,
}

impl<'a, C: ProcessControl> ProcessGuard<'a, C> {
    pub fn launch(
        control: &'a mut C,
        executable: &Path,
        grace: Duration,
    ) -> Result<Self, LaunchError> {
        let handle = control.launch(executable)?;
        let pid = control.pid(&handle);
        Ok(Self {
            control,
            handle: Some(handle),
            pid,
            grace,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Terminate the process and report how it went
    pub fn finish(mut self) -> CleanupReport {
        self.cleanup()
    }

    fn cleanup(&mut self) -> CleanupReport {
        let Some(mut handle) = self.handle.take() else {
            return CleanupReport::NotLaunched;
        };

        info!(pid = self.pid, "Cleaning up target process");
        match self.control.terminate(&mut handle, self.grace) {
            Ok(outcome) => {
                info!(pid = self.pid, ?outcome, "Cleanup complete");
                CleanupReport::Terminated { outcome }
            }
            Err(err) => {
                error!(pid = self.pid, error = %err, "Cleanup failed");
                CleanupReport::Failed {
                    error: err.to_string(),
                }
            }
        }
    }
}

impl<C: ProcessControl> Drop for ProcessGuard<'_, C> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            warn!(pid = self.pid, "Process guard dropped without finish; cleaning up");
            let _ = self.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{TerminateError, TerminationOutcome};

    #[derive(Default)]
    struct CountingControl {
        terminations: usize,
    }

    impl ProcessControl for CountingControl {
        type Handle = bool;

        fn launch(&mut self, _executable: &Path) -> Result<bool, LaunchError> {
            Ok(false)
        }

        fn terminate(
            &mut self,
            exited: &mut bool,
            _grace: Duration,
        ) -> Result<TerminationOutcome, TerminateError> {
            self.terminations += 1;
            if *exited {
                return Ok(TerminationOutcome::AlreadyExited);
            }
            *exited = true;
            Ok(TerminationOutcome::GracefulExit)
        }

        fn pid(&self, _handle: &bool) -> u32 {
            7
        }
    }

    #[test]
    fn test_guard_finish_terminates_once() {
        let mut control = CountingControl::default();
        let guard = ProcessGuard::launch(&mut control, Path::new("x"), Duration::ZERO).unwrap();
        assert_eq!(guard.pid(), 7);
        assert_eq!(
            guard.finish(),
            CleanupReport::Terminated {
                outcome: TerminationOutcome::GracefulExit
            }
        );
        assert_eq!(control.terminations, 1);
    }

    #[test]
    fn test_guard_drop_terminates() {
        let mut control = CountingControl::default();
        {
            let _guard =
                ProcessGuard::launch(&mut control, Path::new("x"), Duration::ZERO).unwrap();
        }
        assert_eq!(control.terminations, 1);
    }

    #[test]
    fn test_guard_terminates_during_unwind() {
        let mut control = CountingControl::default();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard =
                ProcessGuard::launch(&mut control, Path::new("x"), Duration::ZERO).unwrap();
            panic!("interaction blew up");
        }));
        assert!(result.is_err());
        assert_eq!(control.terminations, 1);
    }
}
