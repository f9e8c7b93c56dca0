//! # humo-runner: HuMo inference launcher
//!
//! Turns a prompt, audio and optional reference image into a run of the
//! HuMo video model's own inference scripts. The model itself is external;
//! this crate owns the configuration and launch parameters around it.
//!
//! ## Architecture
//!
//! - **config**: YAML configuration, override merging and validation
//! - **distributed**: GPU topology detection, sequence-parallel
//!   reconciliation and `torchrun` argument rewriting
//! - **dispatch**: script selection and supervised script execution
//! - **manifest**: resolved configuration and request manifests
//! - **pipeline**: the `generate` flow from request to video
//! - **weights**: model weight downloads from the Hugging Face Hub

pub mod config;
pub mod dispatch;
pub mod distributed;
pub mod manifest;
pub mod pipeline;
pub mod weights;

pub mod error;

// Re-export commonly used types
pub use config::{resolve, GenerateConfig, OverrideSet};
pub use distributed::{reconcile, LaunchEnv, Reconciliation, ReconciliationWarning};
pub use error::{Error, Result};
pub use pipeline::{prepare_run, GenerateRequest, PreparedRun};
