//! Interaction scripts.
//!
//! The built-in script is the nine-step File-Open workflow. Menu shortcuts
//! differ between applications, so a JSON file can replace it:
//!
//! ```json
//! {
//!   "name": "open-file",
//!   "steps": [
//!     {"action": "capture", "label": "initial_window"},
//!     {"action": "send_hotkey", "keys": ["ctrl", "o"], "settle_ms": 2000},
//!     {"action": "capture", "label": "open_dialog"},
//!     {"action": "type_text", "text": "{file}", "interval_ms": 50, "settle_ms": 1000},
//!     {"action": "send_key", "key": "enter", "settle_ms": 3000},
//!     {"action": "capture", "label": "file_loaded"}
//!   ]
//! }
//! ```
//!
//! `{file}` inside `type_text` is replaced with the target file path.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::types::InteractionStep;
use crate::capability::KeyCode;
use crate::config::Timings;

/// Placeholder substituted with the target file path
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Errors loading or validating a script
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("failed to read script {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid script JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid script: {0}")]
    Invalid(String),
}

/// An ordered, immutable list of interaction steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub name: String,
    pub steps: Vec<InteractionStep>,
}

impl Script {
    /// The File-Open workflow: open the File menu, choose Open, type the path,
    /// confirm, with a capture before and after each stage
    pub fn open_file(timings: &Timings) -> Self {
        Self {
            name: "open-file".to_string(),
            steps: vec![
                InteractionStep::Capture {
                    label: "initial_window".to_string(),
                },
                InteractionStep::SendHotkey {
                    keys: vec!["alt".to_string(), "f".to_string()],
                    settle: timings.menu_settle,
                },
                InteractionStep::Capture {
                    label: "file_menu_opened".to_string(),
                },
                InteractionStep::SendKey {
                    key: "o".to_string(),
                    settle: timings.dialog_settle,
                },
                InteractionStep::Capture {
                    label: "open_dialog".to_string(),
                },
                InteractionStep::TypeText {
                    text: FILE_PLACEHOLDER.to_string(),
                    interval: timings.type_interval,
                    settle: timings.path_settle,
                },
                InteractionStep::Capture {
                    label: "path_entered".to_string(),
                },
                InteractionStep::SendKey {
                    key: "enter".to_string(),
                    settle: timings.confirm_settle,
                },
                InteractionStep::Capture {
                    label: "file_loaded".to_string(),
                },
            ],
        }
    }

    /// Parse and validate a script from JSON text
    pub fn from_json_str(json: &str) -> Result<Self, ScriptError> {
        let script: Script = serde_json::from_str(json)?;
        script.validate()?;
        Ok(script)
    }

    /// Load and validate a script file
    pub fn from_path(path: &Path) -> Result<Self, ScriptError> {
        let json = fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Reject scripts that could never run: no steps, empty hotkeys or labels, unknown keys
    pub fn validate(&self) -> Result<(), ScriptError> {
        if self.steps.is_empty() {
            return Err(ScriptError::Invalid("script has no steps".to_string()));
        }

        for (i, step) in self.steps.iter().enumerate() {
            let index = i + 1;
            match step {
                InteractionStep::SendHotkey { keys, .. } => {
                    if keys.is_empty() {
                        return Err(ScriptError::Invalid(format!(
                            "step {}: hotkey needs at least one key",
                            index
                        )));
                    }
                    for key in keys {
                        check_key(index, key)?;
                    }
                }
                InteractionStep::SendKey { key, .. } => check_key(index, key)?,
                InteractionStep::TypeText { .. } => {}
                InteractionStep::Capture { label } => {
                    if label.trim().is_empty() {
                        return Err(ScriptError::Invalid(format!(
                            "step {}: capture label is empty",
                            index
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// The steps with `{file}` replaced by `file`
    pub fn bind_file(&self, file: &Path) -> Vec<InteractionStep> {
        let file = file.to_string_lossy();
        self.steps
            .iter()
            .map(|step| match step {
                InteractionStep::TypeText {
                    text,
                    interval,
                    settle,
                } => InteractionStep::TypeText {
                    text: text.replace(FILE_PLACEHOLDER, &file),
                    interval: *interval,
                    settle: *settle,
                },
                other => other.clone(),
            })
            .collect()
    }

    /// Labels of the capture steps, in order
    pub fn capture_labels(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                InteractionStep::Capture { label } => Some(label.as_str()),
                _ => None,
            })
            .collect()
    }
}

fn check_key(index: usize, key: &str) -> Result<(), ScriptError> {
    KeyCode::parse(key)
        .map(|_| ())
        .map_err(|e| ScriptError::Invalid(format!("step {}: {}", index, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_open_file_script_shape() {
        let script = Script::open_file(&Timings::defaults());
        assert_eq!(script.steps.len(), 9);
        assert!(script.validate().is_ok());
        assert_eq!(
            script.capture_labels(),
            vec![
                "initial_window",
                "file_menu_opened",
                "open_dialog",
                "path_entered",
                "file_loaded"
            ]
        );
        // captures alternate with actions, starting and ending with a capture
        for (i, step) in script.steps.iter().enumerate() {
            assert_eq!(step.is_capture(), i % 2 == 0, "step {}", i + 1);
        }
    }

    #[test]
    fn test_open_file_script_uses_step_specific_settles() {
        let timings = Timings::defaults();
        let script = Script::open_file(&timings);
        assert_eq!(script.steps[1].settle(), timings.menu_settle);
        assert_eq!(script.steps[3].settle(), timings.dialog_settle);
        assert_eq!(script.steps[5].settle(), timings.path_settle);
        assert_eq!(script.steps[7].settle(), timings.confirm_settle);
    }

    #[test]
    fn test_bind_file_substitutes_placeholder() {
        let script = Script::open_file(&Timings::immediate());
        let steps = script.bind_file(Path::new("/games/halo.iso"));
        assert_eq!(
            steps[5],
            InteractionStep::TypeText {
                text: "/games/halo.iso".to_string(),
                interval: Duration::ZERO,
                settle: Duration::ZERO,
            }
        );
        assert_eq!(steps[0], script.steps[0]);
    }

    #[test]
    fn test_from_json_str() {
        let script = Script::from_json_str(
            r#"{
                "name": "ctrl-o",
                "steps": [
                    {"action": "send_hotkey", "keys": ["ctrl", "o"], "settle_ms": 10},
                    {"action": "capture", "label": "dialog"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(script.name, "ctrl-o");
        assert_eq!(script.steps[0].settle(), Duration::from_millis(10));
    }

    #[test]
    fn test_validation_rejects_bad_scripts() {
        let empty = Script::from_json_str(r#"{"name": "x", "steps": []}"#);
        assert!(matches!(empty, Err(ScriptError::Invalid(_))));

        let unknown = Script::from_json_str(
            r#"{"name": "x", "steps": [{"action": "send_key", "key": "hyper"}]}"#,
        );
        assert!(matches!(unknown, Err(ScriptError::Invalid(msg)) if msg.contains("hyper")));

        let no_keys = Script::from_json_str(
            r#"{"name": "x", "steps": [{"action": "send_hotkey", "keys": []}]}"#,
        );
        assert!(matches!(no_keys, Err(ScriptError::Invalid(_))));

        let bad_json = Script::from_json_str("{");
        assert!(matches!(bad_json, Err(ScriptError::Parse(_))));
    }

    #[test]
    fn test_from_path_reports_missing_file() {
        let err = Script::from_path(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ScriptError::Io { .. }));
    }
}
