//! Screenshot sink: turns a capture request into a PNG on disk and a step outcome.

use chrono::Utc;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use super::types::{Snapshot, SnapshotConfig, SnapshotResult};
use super::utils::{capture_filename, write_manifest};
use crate::capability::{Automation, Capability, looks_headless};
use crate::harness::types::{StepFailure, StepOutcome};

/// Persists screenshots under `NN_label.png` in one output directory.
///
/// The ordinal advances on every attempt, successful or not, so a given
/// step always maps to the same filename regardless of earlier failures.
#[derive(Debug)]
pub struct ScreenshotSink {
    config: SnapshotConfig,
    next_ordinal: usize,
    dir_ready: bool,
    captured: Vec<Snapshot>,
}

impl ScreenshotSink {
    pub fn new(config: SnapshotConfig) -> Self {
        Self {
            config,
            next_ordinal: 1,
            dir_ready: false,
            captured: Vec::new(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Screenshots written so far, in capture order
    pub fn captured(&self) -> &[Snapshot] {
        &self.captured
    }

    /// Capture the screen for `label`.
    ///
    /// Never fails: a capability that is not ready, a capture error and a
    /// write error all come back as a failed [`StepOutcome`].
    pub fn capture(&mut self, capability: &mut Capability, label: &str) -> StepOutcome {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;

        let Some(automation) = capability.automation() else {
            warn!(label, "Cannot take screenshot: capability unavailable");
            return StepOutcome::failed(StepFailure::CapabilityUnavailable);
        };

        match self.try_capture(automation, ordinal, label) {
            Ok(snapshot) => {
                info!(path = %snapshot.image_path.display(), "Screenshot saved");
                let path = snapshot.image_path.clone();
                self.captured.push(snapshot);
                StepOutcome::captured(path)
            }
            Err(err) => {
                let message = err.to_string();
                warn!(label, error = %message, "Failed to take screenshot");
                if looks_headless(&message) {
                    warn!("This appears to be a headless environment issue");
                }
                StepOutcome::failed(StepFailure::Capture(message))
            }
        }
    }

    fn try_capture(
        &mut self,
        automation: &mut dyn Automation,
        ordinal: usize,
        label: &str,
    ) -> SnapshotResult<Snapshot> {
        if !self.dir_ready {
            fs::create_dir_all(&self.config.output_dir)?;
            self.dir_ready = true;
        }

        let capture = automation.capture_screen()?;
        let image_path = self
            .config
            .output_dir
            .join(capture_filename(ordinal, label));
        fs::write(&image_path, &capture.image_data)?;

        let snapshot = Snapshot {
            image_path,
            ordinal,
            label: label.to_string(),
            source: automation.source_type().to_string(),
            width: capture.width,
            height: capture.height,
            timestamp: Utc::now(),
        };
        write_manifest(&snapshot, &self.config)?;

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{AutomationError, VirtualDisplay};

    fn ready(display: VirtualDisplay) -> Capability {
        Capability::probe_with(move || Ok(Box::new(display) as Box<dyn Automation>))
    }

    fn sink_in(dir: &Path, include_manifest: bool) -> ScreenshotSink {
        ScreenshotSink::new(SnapshotConfig {
            output_dir: dir.join("shots"),
            include_manifest,
        })
    }

    #[test]
    fn test_capture_creates_directory_and_numbered_png() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = sink_in(tmp.path(), true);
        let mut capability = ready(VirtualDisplay::new(40, 30));

        let first = sink.capture(&mut capability, "initial window");
        let second = sink.capture(&mut capability, "menu");

        let first_path = first.artifact().unwrap().to_path_buf();
        assert!(first_path.ends_with("01_initial_window.png"));
        assert!(second.artifact().unwrap().ends_with("02_menu.png"));
        assert!(first_path.exists());
        assert!(first_path.with_extension("json").exists());
        assert_eq!(sink.captured().len(), 2);
        assert_eq!(sink.captured()[0].source, "virtual");
    }

    #[test]
    fn test_capture_without_capability_touches_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = sink_in(tmp.path(), false);
        let mut capability = Capability::unavailable("no backend");

        let outcome = sink.capture(&mut capability, "headless");
        assert_eq!(
            outcome,
            StepOutcome::failed(StepFailure::CapabilityUnavailable)
        );
        assert!(!tmp.path().join("shots").exists());
    }

    #[test]
    fn test_failed_capture_still_consumes_ordinal() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = sink_in(tmp.path(), false);
        let display = VirtualDisplay::new(20, 20)
            .fail_on("capture", AutomationError::Capture("device busy".into()));
        let mut capability = ready(display);

        let outcome = sink.capture(&mut capability, "first");
        assert!(matches!(
            outcome,
            StepOutcome::Failure {
                cause: StepFailure::Capture(_)
            }
        ));
        assert!(sink.captured().is_empty());
        assert_eq!(sink.next_ordinal, 2);
    }

    #[test]
    fn test_write_failure_is_reported_not_raised() {
        let tmp = tempfile::tempdir().unwrap();
        // A regular file where the output directory should be
        let blocker = tmp.path().join("shots");
        fs::write(&blocker, b"not a directory").unwrap();
        let mut sink = sink_in(tmp.path(), false);
        let mut capability = ready(VirtualDisplay::new(20, 20));

        let outcome = sink.capture(&mut capability, "x");
        assert!(!outcome.is_success());
    }
}
