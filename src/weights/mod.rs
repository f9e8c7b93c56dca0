//! Model weights for HuMo
//!
//! Fetches the Wan, HuMo, Whisper and vocal separation repositories into a
//! weights directory, checks that the files inference needs are present,
//! and records what was fetched in `download_manifest.json`.

mod downloader;
mod registry;
mod source;

pub use downloader::{
    DownloadManifest, DownloadResult, ManifestEntry, ModelDownloader, DOWNLOAD_MANIFEST,
};
pub use registry::{find_model, select_models, ModelSpec, MODEL_REGISTRY};
pub use source::{HfHubSource, SnapshotSource};

/// Hub cache directory kept inside the weights root
pub const HUB_CACHE_SUBDIR: &str = ".hf-cache";
