pub mod script;
pub mod sequencer;
pub mod types;

pub use script::{FILE_PLACEHOLDER, Script, ScriptError};
pub use sequencer::{run, run_into};
pub use types::{
    InteractionStep, SequenceReport, StepFailure, StepOutcome, StepRecord, StopCause,
};
