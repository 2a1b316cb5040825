use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capability::AutomationError;

/// One step of an interaction script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InteractionStep {
    /// Press a key combination (e.g. alt+f), then wait `settle`
    SendHotkey {
        keys: Vec<String>,
        #[serde(default, rename = "settle_ms", with = "millis")]
        settle: Duration,
    },

    /// Press a single key, then wait `settle`
    SendKey {
        key: String,
        #[serde(default, rename = "settle_ms", with = "millis")]
        settle: Duration,
    },

    /// Type text one character at a time, then wait `settle`
    TypeText {
        text: String,
        #[serde(default, rename = "interval_ms", with = "millis")]
        interval: Duration,
        #[serde(default, rename = "settle_ms", with = "millis")]
        settle: Duration,
    },

    /// Capture the screen under `label`
    Capture { label: String },
}

impl InteractionStep {
    pub fn is_capture(&self) -> bool {
        matches!(self, InteractionStep::Capture { .. })
    }

    /// Wait after the step; zero for captures
    pub fn settle(&self) -> Duration {
        match self {
            InteractionStep::SendHotkey { settle, .. }
            | InteractionStep::SendKey { settle, .. }
            | InteractionStep::TypeText { settle, .. } => *settle,
            InteractionStep::Capture { .. } => Duration::ZERO,
        }
    }
}

impl fmt::Display for InteractionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractionStep::SendHotkey { keys, .. } => write!(f, "hotkey {}", keys.join("+")),
            InteractionStep::SendKey { key, .. } => write!(f, "key {}", key),
            InteractionStep::TypeText { text, .. } => write!(f, "type {:?}", text),
            InteractionStep::Capture { label } => write!(f, "capture {}", label),
        }
    }
}

/// Why a step did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum StepFailure {
    /// The capability was not ready, so nothing was attempted
    #[error("capability unavailable")]
    CapabilityUnavailable,

    /// The automation safety interlock refused the input
    #[error("safety interlock triggered: {0}")]
    Interlock(String),

    /// A synthetic-input action failed
    #[error("action failed: {0}")]
    Action(String),

    /// A screenshot could not be taken or written
    #[error("screenshot failed: {0}")]
    Capture(String),
}

impl From<AutomationError> for StepFailure {
    fn from(err: AutomationError) -> Self {
        match err {
            AutomationError::Interlock(message) => StepFailure::Interlock(message),
            other => StepFailure::Action(other.to_string()),
        }
    }
}

/// Result of executing one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StepOutcome {
    Success {
        /// Screenshot path, for capture steps
        #[serde(default, skip_serializing_if = "Option::is_none")]
        artifact: Option<PathBuf>,
    },
    Failure { cause: StepFailure },
}

impl StepOutcome {
    pub fn succeeded() -> Self {
        StepOutcome::Success { artifact: None }
    }

    pub fn captured(path: PathBuf) -> Self {
        StepOutcome::Success {
            artifact: Some(path),
        }
    }

    pub fn failed(cause: StepFailure) -> Self {
        StepOutcome::Failure { cause }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Success { .. })
    }

    pub fn artifact(&self) -> Option<&Path> {
        match self {
            StepOutcome::Success { artifact } => artifact.as_deref(),
            StepOutcome::Failure { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&StepFailure> {
        match self {
            StepOutcome::Failure { cause } => Some(cause),
            StepOutcome::Success { .. } => None,
        }
    }

    /// The interlock message, if this outcome is a safety stop
    pub fn interlock_message(&self) -> Option<&str> {
        match self.failure() {
            Some(StepFailure::Interlock(message)) => Some(message.as_str()),
            _ => None,
        }
    }
}

/// A step paired with its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Position in the script (1-based)
    pub index: usize,
    pub step: InteractionStep,
    pub outcome: StepOutcome,
}

/// Why a sequence ended before its last step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum StopCause {
    /// The safety interlock fired on `step`
    Interlock { step: usize, message: String },
    /// A stop was requested (signal) before `before_step` started
    Interrupted { before_step: usize },
    /// The sequence was asked to run without a ready capability
    CapabilityNotReady,
    /// The interaction body failed unexpectedly
    InternalError { message: String },
}

impl fmt::Display for StopCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopCause::Interlock { step, message } => {
                write!(f, "safety interlock at step {}: {}", step, message)
            }
            StopCause::Interrupted { before_step } => {
                write!(f, "interrupted before step {}", before_step)
            }
            StopCause::CapabilityNotReady => write!(f, "capability not ready"),
            StopCause::InternalError { message } => write!(f, "internal error: {}", message),
        }
    }
}

/// Everything a sequence run produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceReport {
    pub records: Vec<StepRecord>,
    pub stop: Option<StopCause>,
}

impl SequenceReport {
    /// True only if the sequence ran to the end and every non-capture step succeeded.
    /// Capture failures are tolerated.
    pub fn success(&self) -> bool {
        self.stop.is_none()
            && self
                .records
                .iter()
                .filter(|r| !r.step.is_capture())
                .all(|r| r.outcome.is_success())
    }

    /// Paths of screenshots written, in capture order
    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.records
            .iter()
            .filter_map(|r| r.outcome.artifact().map(Path::to_path_buf))
            .collect()
    }

    /// Number of capture steps that failed
    pub fn capture_failures(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.step.is_capture() && !r.outcome.is_success())
            .count()
    }
}

/// Serialize a `Duration` as whole milliseconds
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(index: usize, step: InteractionStep, outcome: StepOutcome) -> StepRecord {
        StepRecord {
            index,
            step,
            outcome,
        }
    }

    fn key(k: &str) -> InteractionStep {
        InteractionStep::SendKey {
            key: k.to_string(),
            settle: Duration::ZERO,
        }
    }

    fn capture(label: &str) -> InteractionStep {
        InteractionStep::Capture {
            label: label.to_string(),
        }
    }

    #[test]
    fn test_step_json_uses_millisecond_fields() {
        let step: InteractionStep = serde_json::from_str(
            r#"{"action": "type_text", "text": "{file}", "interval_ms": 50, "settle_ms": 1000}"#,
        )
        .unwrap();
        assert_eq!(
            step,
            InteractionStep::TypeText {
                text: "{file}".to_string(),
                interval: Duration::from_millis(50),
                settle: Duration::from_secs(1),
            }
        );

        let hotkey: InteractionStep =
            serde_json::from_str(r#"{"action": "send_hotkey", "keys": ["alt", "f"]}"#).unwrap();
        assert_eq!(hotkey.settle(), Duration::ZERO);
    }

    #[test]
    fn test_success_ignores_capture_failures() {
        let report = SequenceReport {
            records: vec![
                record(
                    1,
                    capture("a"),
                    StepOutcome::failed(StepFailure::Capture("disk".into())),
                ),
                record(2, key("o"), StepOutcome::succeeded()),
            ],
            stop: None,
        };
        assert!(report.success());
        assert_eq!(report.capture_failures(), 1);
        assert!(report.screenshots().is_empty());
    }

    #[test]
    fn test_success_false_on_action_failure_or_stop() {
        let failed = SequenceReport {
            records: vec![record(
                1,
                key("o"),
                StepOutcome::failed(StepFailure::Action("boom".into())),
            )],
            stop: None,
        };
        assert!(!failed.success());

        let stopped = SequenceReport {
            records: vec![],
            stop: Some(StopCause::Interrupted { before_step: 1 }),
        };
        assert!(!stopped.success());
    }

    #[test]
    fn test_interlock_maps_to_distinct_failure() {
        let failure = StepFailure::from(AutomationError::Interlock("corner".into()));
        assert_eq!(failure, StepFailure::Interlock("corner".into()));
        assert_eq!(
            StepOutcome::failed(failure).interlock_message(),
            Some("corner")
        );

        let ordinary = StepFailure::from(AutomationError::Input("no focus".into()));
        assert!(matches!(ordinary, StepFailure::Action(_)));
    }

    #[test]
    fn test_outcome_serializes_with_tags() {
        let value = serde_json::to_value(StepOutcome::failed(
            StepFailure::CapabilityUnavailable,
        ))
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({"result": "failure", "cause": {"kind": "capability_unavailable"}})
        );
    }
}
