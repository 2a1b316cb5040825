//! Types for run results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::capability::CapabilityStatus;
use crate::harness::types::{StepRecord, StopCause};
use crate::process::TerminationOutcome;

/// What happened when launching the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LaunchReport {
    /// `--skip-launch`: nothing was started on purpose
    Skipped,
    /// The run ended before reaching the launch
    NotAttempted,
    Launched {
        pid: u32,
    },
    Failed {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        stdout: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        stderr: String,
    },
}

/// What happened when tearing the target down
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CleanupReport {
    /// No live process to clean up
    NotLaunched,
    Terminated { outcome: TerminationOutcome },
    /// Termination failed; logged, never the run's failure
    Failed { error: String },
}

/// How the run as a whole ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Ran to the end, including headless degradation and early stops
    Completed,
    /// Executable or file missing, or the output directory unusable
    PreconditionFailed { reason: String },
    /// The target could not be started or died immediately
    LaunchFailed { reason: String },
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Completed => 0,
            RunOutcome::PreconditionFailed { .. } | RunOutcome::LaunchFailed { .. } => 1,
        }
    }
}

/// The externally observable result of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,

    /// None when preconditions failed before probing
    pub capability: Option<CapabilityStatus>,
    pub launch: LaunchReport,

    /// Every attempted step with its outcome, in execution order
    pub steps: Vec<StepRecord>,
    pub stop_cause: Option<StopCause>,

    /// True only if the sequence ran and no non-capture step failed
    pub automation_success: bool,
    pub capture_failures: usize,

    /// Screenshots written by this run, in capture order
    pub screenshots: Vec<PathBuf>,

    /// None when nothing reached the cleanup stage
    pub cleanup: Option<CleanupReport>,
}

impl RunSummary {
    pub(crate) fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            outcome: RunOutcome::Completed,
            capability: None,
            launch: LaunchReport::NotAttempted,
            steps: Vec::new(),
            stop_cause: None,
            automation_success: false,
            capture_failures: 0,
            screenshots: Vec::new(),
            cleanup: None,
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.outcome.exit_code()
    }
}
