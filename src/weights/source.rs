//! Where model files come from

use crate::error::{Error, Result};
use hf_hub::api::sync::{Api, ApiBuilder};
use std::path::{Path, PathBuf};

/// A store of model repositories
pub trait SnapshotSource {
    /// Every file path in the repository
    fn list_files(&self, repo_id: &str) -> Result<Vec<String>>;

    /// Fetch one file and return a local path to its content
    fn fetch_file(&self, repo_id: &str, filename: &str) -> Result<PathBuf>;
}

/// Hugging Face Hub through the `hf-hub` blocking client
pub struct HfHubSource {
    api: Api,
}

impl HfHubSource {
    /// Build a client caching under `cache_dir`
    ///
    /// # Errors
    ///
    /// `Error::Download` when the client cannot be initialized.
    pub fn new(cache_dir: &Path, token: Option<String>) -> Result<Self> {
        let api = ApiBuilder::new()
            .with_cache_dir(cache_dir.to_path_buf())
            .with_token(token)
            .with_progress(false)
            .build()
            .map_err(|e| Error::Download(format!("Failed to initialize HF API: {e}")))?;
        Ok(Self { api })
    }
}

impl SnapshotSource for HfHubSource {
    fn list_files(&self, repo_id: &str) -> Result<Vec<String>> {
        let info = self
            .api
            .model(repo_id.to_string())
            .info()
            .map_err(|e| Error::Download(format!("Failed to list {repo_id}: {e}")))?;
        Ok(info.siblings.into_iter().map(|s| s.rfilename).collect())
    }

    fn fetch_file(&self, repo_id: &str, filename: &str) -> Result<PathBuf> {
        self.api
            .model(repo_id.to_string())
            .get(filename)
            .map_err(|e| Error::Download(format!("Failed to download {repo_id}/{filename}: {e}")))
    }
}
