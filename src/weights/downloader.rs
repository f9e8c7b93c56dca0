//! Downloading, validating and recording model weights

use super::registry::ModelSpec;
use super::source::SnapshotSource;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Manifest written into the weights directory after a download run
pub const DOWNLOAD_MANIFEST: &str = "download_manifest.json";

/// Outcome of downloading one model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub key: &'static str,
    pub downloaded: bool,
    pub files: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub key: String,
    pub repo_id: String,
    pub local_path: PathBuf,
    pub required: bool,
    pub downloaded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadManifest {
    pub weights_dir: PathBuf,
    pub models: Vec<ManifestEntry>,
}

/// Fetches registry models into a weights directory
pub struct ModelDownloader<S> {
    source: S,
    weights_dir: PathBuf,
}

impl<S: SnapshotSource> ModelDownloader<S> {
    /// Create a downloader, creating `weights_dir` if needed
    pub fn new(source: S, weights_dir: impl Into<PathBuf>) -> Result<Self> {
        let weights_dir = weights_dir.into();
        fs::create_dir_all(&weights_dir)?;
        Ok(Self {
            source,
            weights_dir,
        })
    }

    pub fn weights_dir(&self) -> &Path {
        &self.weights_dir
    }

    pub fn target_dir(&self, spec: &ModelSpec) -> PathBuf {
        self.weights_dir.join(spec.local_subdir)
    }

    /// Download every file of `spec` and return how many were placed
    pub fn download_model(&self, spec: &ModelSpec) -> Result<usize> {
        let target = self.target_dir(spec);
        fs::create_dir_all(&target)?;
        tracing::info!("downloading {} -> {}", spec.repo_id, target.display());

        let files = if spec.files.is_empty() {
            self.source.list_files(spec.repo_id)?
        } else {
            spec.files.iter().map(|f| f.to_string()).collect()
        };

        for file in &files {
            let fetched = self.source.fetch_file(spec.repo_id, file)?;
            let dest = target.join(file);
            if dest.exists() {
                tracing::debug!("{} already present", dest.display());
                continue;
            }
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            place_file(&fetched, &dest)?;
        }

        tracing::info!("downloaded {} ({} files)", spec.repo_id, files.len());
        Ok(files.len())
    }

    /// Download each model, recording failures instead of stopping
    pub fn download_all(&self, specs: &[&ModelSpec]) -> Vec<DownloadResult> {
        specs
            .iter()
            .map(|spec| match self.download_model(spec) {
                Ok(files) => DownloadResult {
                    key: spec.key,
                    downloaded: true,
                    files,
                    error: None,
                },
                Err(e) => {
                    if spec.required {
                        tracing::error!("required model {} failed to download: {e}", spec.key);
                    } else {
                        tracing::warn!("optional model {} failed to download: {e}", spec.key);
                    }
                    DownloadResult {
                        key: spec.key,
                        downloaded: false,
                        files: 0,
                        error: Some(e.to_string()),
                    }
                }
            })
            .collect()
    }

    /// Missing directories and files of the required models in `specs`.
    /// An empty list means the installation is complete.
    pub fn validate_downloads(&self, specs: &[&ModelSpec]) -> Vec<PathBuf> {
        let mut missing = Vec::new();
        for spec in specs.iter().filter(|s| s.required) {
            let dir = self.target_dir(spec);
            if !dir.is_dir() {
                tracing::error!("model directory missing: {}", dir.display());
                missing.push(dir);
                continue;
            }
            for file in spec.files_to_validate {
                let path = dir.join(file);
                if !path.exists() {
                    tracing::warn!("required file missing for {}: {}", spec.key, path.display());
                    missing.push(path);
                }
            }
        }
        missing
    }

    /// Write `download_manifest.json` describing `specs` and `results`
    pub fn write_manifest(
        &self,
        specs: &[&ModelSpec],
        results: &[DownloadResult],
    ) -> Result<PathBuf> {
        let weights_dir = fs::canonicalize(&self.weights_dir)?;
        let models = specs
            .iter()
            .map(|spec| ManifestEntry {
                key: spec.key.to_string(),
                repo_id: spec.repo_id.to_string(),
                local_path: self.target_dir(spec),
                required: spec.required,
                downloaded: results
                    .iter()
                    .any(|r| r.key == spec.key && r.downloaded),
            })
            .collect();

        let manifest = DownloadManifest {
            weights_dir,
            models,
        };
        let path = self.weights_dir.join(DOWNLOAD_MANIFEST);
        fs::write(&path, serde_json::to_string_pretty(&manifest)?)?;
        Ok(path)
    }
}

/// Hard-link `src` to `dest`, copying when linking is not possible.
/// Hub caches store files behind symlinks, so the target is resolved first.
fn place_file(src: &Path, dest: &Path) -> Result<()> {
    let src = fs::canonicalize(src)?;
    if fs::hard_link(&src, dest).is_err() {
        fs::copy(&src, dest)?;
    }
    Ok(())
}
