//! Files written for each generation request
//!
//! - `generate_resolved.yaml`: the merged, reconciled configuration
//! - `<humo>/generate.yaml`: the same file synced into the HuMo checkout
//! - `request_manifest.json`: configuration, script and reconciliation

use crate::config::{save_config, GenerateConfig};
use crate::distributed::Reconciliation;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const RESOLVED_CONFIG_FILE: &str = "generate_resolved.yaml";
pub const REQUEST_MANIFEST_FILE: &str = "request_manifest.json";
/// Name HuMo reads its configuration from inside the checkout
pub const HUMO_CONFIG_FILE: &str = "generate.yaml";

/// Timestamp layout of per-run directories
pub const RUN_DIR_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Snapshot of one request, written once and never modified
#[derive(Debug, Clone, Serialize)]
pub struct RequestManifest {
    config: GenerateConfig,
    script: String,
    reconciliation: Reconciliation,
}

impl RequestManifest {
    pub fn new(
        config: GenerateConfig,
        script: impl Into<String>,
        reconciliation: Reconciliation,
    ) -> Self {
        Self {
            config,
            script: script.into(),
            reconciliation,
        }
    }

    pub fn config(&self) -> &GenerateConfig {
        &self.config
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn reconciliation(&self) -> &Reconciliation {
        &self.reconciliation
    }

    /// Write `request_manifest.json` into `dir` as pretty JSON
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(REQUEST_MANIFEST_FILE);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        tracing::info!("wrote request manifest to {}", path.display());
        Ok(path)
    }
}

/// Write `generate_resolved.yaml` into `dir`
pub fn write_resolved_config(config: &GenerateConfig, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(RESOLVED_CONFIG_FILE);
    save_config(config, &path)?;
    Ok(path)
}

/// Copy the resolved configuration to `<humo_dir>/generate.yaml`
///
/// # Errors
///
/// `Error::MissingDependency` when the HuMo checkout does not exist.
pub fn sync_config(resolved: &Path, humo_dir: &Path) -> Result<PathBuf> {
    if !humo_dir.is_dir() {
        return Err(Error::MissingDependency(humo_dir.to_path_buf()));
    }
    let target = humo_dir.join(HUMO_CONFIG_FILE);
    fs::copy(resolved, &target)?;
    tracing::debug!("synced {} to {}", resolved.display(), target.display());
    Ok(target)
}

/// `<root>/<YYYYmmddTHHMMSSZ>` for `now`
pub fn timestamped_run_dir(root: &Path, now: DateTime<Utc>) -> PathBuf {
    root.join(now.format(RUN_DIR_FORMAT).to_string())
}
