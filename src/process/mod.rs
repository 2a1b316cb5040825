//! Target process lifecycle: launch with a liveness check, terminate with escalation.
//!
//! [`ProcessControl`] is the seam the orchestrator depends on;
//! [`ProcessSupervisor`] implements it over `std::process` (plus `nix`
//! signals on unix). Tests substitute a fake.

pub mod output;
pub mod supervisor;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

pub use supervisor::{ManagedProcess, ProcessSupervisor};

/// Liveness state of a launched process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "code", rename_all = "snake_case")]
pub enum ProcessState {
    Running,
    /// Exited with status 0
    ExitedNormally(i32),
    /// Exited non-zero, or by a signal (no code)
    ExitedAbnormally(Option<i32>),
    /// Force-killed by the supervisor
    Killed,
}

impl ProcessState {
    pub fn has_exited(&self) -> bool {
        !matches!(self, ProcessState::Running)
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessState::ExitedNormally(code) => Some(*code),
            ProcessState::ExitedAbnormally(code) => *code,
            ProcessState::Running | ProcessState::Killed => None,
        }
    }

    pub fn from_status(status: ExitStatus) -> Self {
        match status.code() {
            Some(0) => ProcessState::ExitedNormally(0),
            code => ProcessState::ExitedAbnormally(code),
        }
    }
}

/// Which path `terminate` took
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationOutcome {
    /// Exited within the grace period after the terminate request
    GracefulExit,
    /// Still running after the grace period; killed
    ForcedKill,
    /// Had already exited; nothing was sent
    AlreadyExited,
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("executable not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to spawn {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("process exited immediately with code {}", describe_code(.code))]
    ExitedImmediately {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

fn describe_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

impl LaunchError {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            LaunchError::ExitedImmediately { code, .. } => *code,
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TerminateError {
    #[error("failed to signal pid {pid}: {message}")]
    Signal { pid: u32, message: String },

    #[error("failed to kill pid {pid}: {source}")]
    Kill {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for pid {pid}: {source}")]
    Wait {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

/// Spawn and tear down the target process
pub trait ProcessControl {
    type Handle;

    /// Spawn `executable`, wait the launch grace period, and check it is still running
    fn launch(&mut self, executable: &Path) -> Result<Self::Handle, LaunchError>;

    /// Request a graceful exit, wait up to `grace`, then kill.
    ///
    /// Must be idempotent: an exited handle yields `AlreadyExited` without
    /// sending anything.
    fn terminate(
        &mut self,
        handle: &mut Self::Handle,
        grace: Duration,
    ) -> Result<TerminationOutcome, TerminateError>;

    fn pid(&self, handle: &Self::Handle) -> u32;
}
