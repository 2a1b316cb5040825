//! GUI Harness - launch a desktop application, drive it with synthetic input,
//! and document every step with screenshots.
//!
//! This crate provides:
//! - Capability probing (unavailable / no display / ready) over a pluggable automation backend
//! - A real desktop backend (enigo + xcap) and an in-memory virtual display
//! - Process supervision with a launch liveness check and terminate-then-kill cleanup
//! - A scripted interaction sequencer with a safety-interlock stop
//! - Numbered, lexicographically ordered screenshots plus a JSON run summary
//!
//! # Example
//!
//! ```rust,no_run
//! use gui_harness::{Capability, Orchestrator, ProcessSupervisor, RunOptions};
//!
//! let options = RunOptions::new("/opt/xenia/xenia", "/games/demo.iso").output_dir("screenshots");
//! let supervisor = ProcessSupervisor::new(options.timings.launch_grace);
//! let mut orchestrator = Orchestrator::new(supervisor, options);
//! let summary = orchestrator.run(Capability::probe);
//! std::process::exit(i32::from(summary.exit_code()));
//! ```

pub mod capability;
pub mod config;
pub mod harness;
pub mod interrupt;
pub mod orchestrator;
pub mod process;
pub mod runner;
pub mod session;
pub mod snapshot;

// Re-export capability types
pub use capability::{
    Automation, AutomationError, AutomationResult, Capability, CapabilityStatus, CaptureResult,
    DesktopAutomation, VirtualDisplay,
};

// Re-export harness types
pub use harness::{
    InteractionStep, Script, ScriptError, SequenceReport, StepFailure, StepOutcome, StepRecord,
    StopCause,
};

// Re-export process supervision
pub use process::{
    LaunchError, ManagedProcess, ProcessControl, ProcessState, ProcessSupervisor, TerminateError,
    TerminationOutcome,
};

// Re-export orchestration and results
pub use orchestrator::{Orchestrator, ProcessGuard, RunOptions};
pub use runner::{CleanupReport, LaunchReport, RunOutcome, RunSummary};

// Re-export snapshot and session management
pub use session::Session;
pub use snapshot::{ScreenshotSink, Snapshot, SnapshotConfig, SnapshotError, SnapshotResult};
