//! Dispatch of resolved requests to HuMo's inference scripts

mod cancel;
mod runner;
mod script;

pub use cancel::{CancellationHandle, CancellationToken};
pub use runner::{locate_video, RunOptions, RunOutcome, ScriptRunner, HUMO_OUTPUTS_DIR, INFERENCE_LOG};
pub use script::{locate_script, select_script, SCRIPT_MATRIX, SCRIPTS_DIR};
