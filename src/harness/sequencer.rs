//! Runs an interaction script step by step against a capability.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{info, warn};

use super::types::{
    InteractionStep, SequenceReport, StepFailure, StepOutcome, StepRecord, StopCause,
};
use crate::capability::{Automation, AutomationResult, Capability, looks_headless};
use crate::snapshot::ScreenshotSink;

/// Execute `steps` in order.
///
/// - Capture steps go through `sink`; their failures are recorded and tolerated.
/// - Other steps go to the automation backend and wait their settle delay afterwards.
/// - A safety-interlock failure stops the sequence; any other failure is
///   recorded and the next step runs.
/// - `cancel` is checked before each step.
///
/// Without a ready capability nothing runs and the report carries
/// [`StopCause::CapabilityNotReady`].
pub fn run(
    steps: &[InteractionStep],
    capability: &mut Capability,
    sink: &mut ScreenshotSink,
    cancel: &AtomicBool,
) -> SequenceReport {
    let mut report = SequenceReport::default();
    run_into(steps, capability, sink, cancel, &mut report);
    report
}

/// Same as [`run`], appending to a report owned by the caller.
///
/// Records are pushed as each step finishes, so a caller that catches a
/// panic still sees every step that completed before it.
pub fn run_into(
    steps: &[InteractionStep],
    capability: &mut Capability,
    sink: &mut ScreenshotSink,
    cancel: &AtomicBool,
    report: &mut SequenceReport,
) {
    if !capability.is_ready() {
        warn!(status = %capability.status(), "Skipping interaction sequence");
        report.stop = Some(StopCause::CapabilityNotReady);
        return;
    }

    info!(steps = steps.len(), "Starting interaction sequence");

    for (i, step) in steps.iter().enumerate() {
        let index = i + 1;

        if cancel.load(Ordering::SeqCst) {
            warn!(before_step = index, "Stop requested; ending sequence");
            report.stop = Some(StopCause::Interrupted { before_step: index });
            break;
        }

        info!(step = index, action = %step, "Executing step");

        let outcome = match step {
            InteractionStep::Capture { label } => sink.capture(capability, label),
            InteractionStep::SendHotkey { keys, .. } => {
                perform(capability, |a| a.send_hotkey(keys))
            }
            InteractionStep::SendKey { key, .. } => perform(capability, |a| a.send_key(key)),
            InteractionStep::TypeText { text, interval, .. } => {
                perform(capability, |a| a.type_text(text, *interval))
            }
        };

        let interlock = outcome.interlock_message().map(str::to_string);
        if let Some(cause) = outcome.failure() {
            if !step.is_capture() {
                warn!(step = index, error = %cause, "Step failed");
            }
        }

        report.records.push(StepRecord {
            index,
            step: step.clone(),
            outcome,
        });

        if let Some(message) = interlock {
            warn!(step = index, %message, "Safety interlock triggered; stopping sequence");
            report.stop = Some(StopCause::Interlock {
                step: index,
                message,
            });
            break;
        }

        let settle = step.settle();
        if !settle.is_zero() {
            thread::sleep(settle);
        }
    }

    if report.success() {
        info!("Interaction sequence completed");
    } else {
        warn!(
            records = report.records.len(),
            stop = ?report.stop,
            "Interaction sequence did not complete cleanly"
        );
    }
}

/// Run one input action and turn its result into a step outcome
fn perform<F>(capability: &mut Capability, action: F) -> StepOutcome
where
    F: FnOnce(&mut dyn Automation) -> AutomationResult<()>,
{
    let Some(automation) = capability.automation() else {
        return StepOutcome::failed(StepFailure::CapabilityUnavailable);
    };

    match action(automation) {
        Ok(()) => StepOutcome::succeeded(),
        Err(err) => {
            if looks_headless(&err.to_string()) {
                warn!("This appears to be a headless environment issue");
            }
            StepOutcome::failed(StepFailure::from(err))
        }
    }
}
