//! Sequence-parallel reconciliation
//!
//! `dit.sp_size` must evenly divide the world size. When it does not, the
//! largest divisor of the world size not exceeding the request is used
//! instead and the change is reported as a typed warning.

use super::detect::Topology;
use crate::config::{GenerateConfig, ParallelDegree};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A value that reconciliation replaced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconciliationWarning {
    /// The configured value was unusable and `value` was used instead
    Defaulted {
        field: String,
        raw: String,
        value: usize,
    },
    /// The request did not divide the world size
    Clamped {
        field: String,
        requested: usize,
        resolved: usize,
        world_size: usize,
    },
}

impl fmt::Display for ReconciliationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconciliationWarning::Defaulted { field, raw, value } => {
                write!(f, "invalid {field} value {raw:?}, using {value}")
            }
            ReconciliationWarning::Clamped {
                field,
                requested,
                resolved,
                world_size,
            } => write!(
                f,
                "{field}={requested} does not divide world size {world_size}, using {resolved}"
            ),
        }
    }
}

/// Outcome of reconciling a configuration against a topology
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub topology: Topology,
    /// Requested degree after fail-soft parsing
    pub requested_sp_size: usize,
    /// Degree written back into the configuration
    pub sp_size: usize,
    pub warnings: Vec<ReconciliationWarning>,
}

impl Reconciliation {
    /// True when every value was taken as given
    pub fn is_validated(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn world_size(&self) -> usize {
        self.topology.world_size
    }

    /// Environment for the launched process
    pub fn child_env(&self) -> Vec<(String, String)> {
        self.topology.child_env()
    }
}

/// Largest divisor of `world_size` that does not exceed `requested`.
///
/// Both inputs are floored at 1. A request that already divides the world
/// size is returned unchanged.
pub fn reconcile(requested: usize, world_size: usize) -> usize {
    let world = world_size.max(1);
    let requested = requested.max(1);
    if world % requested == 0 {
        return requested;
    }
    (1..=requested.min(world))
        .rev()
        .find(|candidate| world % candidate == 0)
        .unwrap_or(1)
}

/// Parse a configured degree, falling back to 1 with a warning.
///
/// An absent value means 1 and is not a warning.
pub fn requested_degree(
    field: &str,
    degree: Option<&ParallelDegree>,
    warnings: &mut Vec<ReconciliationWarning>,
) -> usize {
    let raw = match degree {
        None => return 1,
        Some(ParallelDegree::Count(n)) if *n >= 1 => {
            return usize::try_from(*n).unwrap_or(usize::MAX);
        }
        Some(ParallelDegree::Count(n)) => n.to_string(),
        Some(ParallelDegree::Malformed(value)) => describe_value(value),
    };

    let warning = ReconciliationWarning::Defaulted {
        field: field.to_string(),
        raw,
        value: 1,
    };
    tracing::warn!("{warning}");
    warnings.push(warning);
    1
}

/// Reconcile `dit.sp_size` against `topology` and write the result into
/// `dit.sp_size` and `generation.sequence_parallel`
pub fn reconcile_config(config: &mut GenerateConfig, topology: &Topology) -> Reconciliation {
    let mut warnings = topology.warnings.clone();

    let requested = requested_degree("dit.sp_size", config.dit.sp_size.as_ref(), &mut warnings);
    let sp_size = reconcile(requested, topology.world_size);
    if sp_size != requested {
        let warning = ReconciliationWarning::Clamped {
            field: "dit.sp_size".to_string(),
            requested,
            resolved: sp_size,
            world_size: topology.world_size,
        };
        tracing::warn!("{warning}");
        warnings.push(warning);
    }

    let degree = ParallelDegree::Count(sp_size as i64);
    config.dit.sp_size = Some(degree.clone());
    config.generation.sequence_parallel = Some(degree);

    tracing::info!(
        world_size = topology.world_size,
        devices = topology.device_count,
        sp_size,
        "reconciled sequence parallelism"
    );

    Reconciliation {
        topology: topology.clone(),
        requested_sp_size: requested,
        sp_size,
        warnings,
    }
}

fn describe_value(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| format!("{other:?}")),
    }
}
