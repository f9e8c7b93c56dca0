//! Distributed launch parameters
//!
//! Detects how many devices and processes a run has, keeps
//! `dit.sp_size` a divisor of the world size, and rewrites `torchrun`
//! invocations to fit the host.

pub mod detect;
pub mod env;
mod fix;
mod reconcile;
pub mod torchrun;


pub use detect::{DeviceProbe, NvidiaSmi, Topology, WorldSizeSource};
pub use env::LaunchEnv;
pub use fix::{fix_config_file, FixOutcome};
pub use reconcile::{reconcile, reconcile_config, Reconciliation, ReconciliationWarning};
pub use torchrun::{plan_torchrun, rewrite_torchrun_args, LaunchPlan, TorchrunPlan};
