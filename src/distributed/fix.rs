//! In-place repair of `dit.sp_size` in a configuration file
//!
//! Works on the raw YAML tree so every other key, including ones the
//! configuration schema does not model, is written back untouched.

use super::detect::Topology;
use super::reconcile::{reconcile, requested_degree, ReconciliationWarning};
use crate::config::ParallelDegree;
use crate::error::{Error, Result};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;

/// Result of fixing a configuration file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixOutcome {
    /// `dit.sp_size` as found, if any
    pub previous: Option<Value>,
    pub sp_size: usize,
    pub world_size: usize,
    /// Whether the file content needed a change
    pub changed: bool,
    /// Whether the file was rewritten
    pub written: bool,
    pub warnings: Vec<ReconciliationWarning>,
}

/// Reconcile `dit.sp_size` of the file at `path` against `topology`.
///
/// The file is rewritten only when the value changes and `write` is set.
/// A present `generation.sequence_parallel` is kept equal to the new value.
///
/// # Errors
///
/// `Error::Config` when the file is missing or is not a YAML mapping.
pub fn fix_config_file(path: &Path, topology: &Topology, write: bool) -> Result<FixOutcome> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let content = fs::read_to_string(path)?;
    let mut root: Value = serde_yaml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse YAML config: {}", e)))?;
    if root.is_null() {
        root = Value::Mapping(Mapping::new());
    }
    let Value::Mapping(root_map) = &mut root else {
        return Err(Error::Config(format!(
            "Configuration root of {} must be a mapping",
            path.display()
        )));
    };

    let mut warnings = topology.warnings.clone();
    let dit = section_mut(root_map, "dit", path)?;
    let previous = dit.get("sp_size").cloned();
    let parsed: Option<ParallelDegree> = previous
        .clone()
        .map(|value| {
            serde_yaml::from_value(value.clone()).unwrap_or(ParallelDegree::Malformed(value))
        });

    let requested = requested_degree("dit.sp_size", parsed.as_ref(), &mut warnings);
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

    let new_value = Value::from(sp_size as u64);
    let mut changed = previous.as_ref() != Some(&new_value);
    if changed {
        dit.insert(Value::from("sp_size"), new_value.clone());
    }

    if let Some(Value::Mapping(generation)) = root_map.get_mut("generation") {
        if let Some(current) = generation.get_mut("sequence_parallel") {
            if *current != new_value {
                *current = new_value;
                changed = true;
            }
        }
    }

    let written = changed && write;
    if written {
        fs::write(path, serde_yaml::to_string(&root)?)?;
        tracing::info!(path = %path.display(), sp_size, "updated dit.sp_size");
    } else if !changed {
        tracing::info!(path = %path.display(), sp_size, "configuration already matches hardware");
    }

    Ok(FixOutcome {
        previous,
        sp_size,
        world_size: topology.world_size,
        changed,
        written,
        warnings,
    })
}

fn section_mut<'a>(root: &'a mut Mapping, key: &str, path: &Path) -> Result<&'a mut Mapping> {
    let entry = root
        .entry(Value::from(key))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if entry.is_null() {
        *entry = Value::Mapping(Mapping::new());
    }
    match entry {
        Value::Mapping(section) => Ok(section),
        _ => Err(Error::Config(format!(
            "Section '{}' in {} must be a mapping",
            key,
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;

    fn write_config(yaml: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generate.yaml");
        fs::write(&path, yaml).unwrap();
        (dir, path)
    }

    #[test]
    fn test_fix_clamps_and_preserves_other_keys() {
        let (_dir, path) = write_config(
            "dit:\n  sp_size: 4\n  attention: flash\ngeneration:\n  sequence_parallel: 4\nvae:\n  dtype: bf16\n",
        );

        let outcome = fix_config_file(&path, &Topology::fixed(6, 6), true).unwrap();
        assert!(outcome.changed);
        assert!(outcome.written);
        assert_eq!(outcome.sp_size, 3);

        let config = load_config(&path).unwrap();
        assert_eq!(config.dit.sp_size, Some(ParallelDegree::Count(3)));
        assert_eq!(
            config.generation.sequence_parallel,
            Some(ParallelDegree::Count(3))
        );
        assert_eq!(config.dit.other["attention"].as_str(), Some("flash"));
        assert!(config.other.contains_key("vae"));
    }

    #[test]
    fn test_fix_leaves_valid_file_alone() {
        let yaml = "dit:\n  sp_size: 2\n";
        let (_dir, path) = write_config(yaml);

        let outcome = fix_config_file(&path, &Topology::fixed(4, 4), true).unwrap();
        assert!(!outcome.changed);
        assert!(!outcome.written);
        assert_eq!(fs::read_to_string(&path).unwrap(), yaml);
    }

    #[test]
    fn test_fix_rewrites_stale_sequence_parallel() {
        let (_dir, path) = write_config("dit:\n  sp_size: 2\ngeneration:\n  sequence_parallel: 8\n");

        let outcome = fix_config_file(&path, &Topology::fixed(4, 4), true).unwrap();
        assert_eq!(outcome.sp_size, 2);
        assert!(outcome.changed);
        assert!(outcome.written);

        let config = load_config(&path).unwrap();
        assert_eq!(config.dit.sp_size, Some(ParallelDegree::Count(2)));
        assert_eq!(
            config.generation.sequence_parallel,
            Some(ParallelDegree::Count(2))
        );
    }

    #[test]
    fn test_fix_adds_missing_sp_size() {
        let (_dir, path) = write_config("inputs:\n  prompt: hi\n");
        let outcome = fix_config_file(&path, &Topology::fixed(1, 1), true).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.previous, None);

        let config = load_config(&path).unwrap();
        assert_eq!(config.dit.sp_size, Some(ParallelDegree::Count(1)));
    }

    #[test]
    fn test_fix_dry_run_does_not_write() {
        let yaml = "dit:\n  sp_size: 8\n";
        let (_dir, path) = write_config(yaml);

        let outcome = fix_config_file(&path, &Topology::fixed(2, 2), false).unwrap();
        assert!(outcome.changed);
        assert!(!outcome.written);
        assert_eq!(outcome.sp_size, 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), yaml);
    }

    #[test]
    fn test_fix_malformed_value() {
        let (_dir, path) = write_config("dit:\n  sp_size: auto\n");
        let outcome = fix_config_file(&path, &Topology::fixed(4, 4), true).unwrap();
        assert_eq!(outcome.sp_size, 1);
        assert!(matches!(
            outcome.warnings.as_slice(),
            [ReconciliationWarning::Defaulted { .. }]
        ));
    }

    #[test]
    fn test_fix_missing_file() {
        let err = fix_config_file(Path::new("/nonexistent.yaml"), &Topology::fixed(1, 1), true)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_fix_rejects_non_mapping_root() {
        let (_dir, path) = write_config("- a\n- b\n");
        let err = fix_config_file(&path, &Topology::fixed(1, 1), true).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
