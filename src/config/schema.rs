//! YAML schema for `generate.yaml`
//!
//! Each section names the fields this crate reads or overrides and keeps any
//! other keys in a flattened map, so a resolved file stays a superset of the
//! base file handed to HuMo.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Keys a section does not model explicitly.
pub type OtherKeys = BTreeMap<String, serde_yaml::Value>;

/// Video filename used when `outputs.video_filename` is unset.
pub const DEFAULT_VIDEO_FILENAME: &str = "humo_output.mp4";

/// Complete generation configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateConfig {
    /// Prompt, audio and image inputs
    #[serde(default)]
    pub inputs: InputsSection,

    /// Generation mode and sampling knobs
    #[serde(default)]
    pub generation: GenerationSection,

    /// Diffusion transformer settings
    #[serde(default)]
    pub dit: DitSection,

    /// Diffusion schedule (`diffusion.timesteps.sampling.steps`)
    #[serde(default)]
    pub diffusion: DiffusionSection,

    /// Output locations
    #[serde(default)]
    pub outputs: OutputsSection,

    /// Model variant selection
    #[serde(default)]
    pub model: ModelSection,

    /// Free-form metadata merged from a JSON file
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_yaml::Value>,

    /// Top-level sections owned by HuMo itself
    #[serde(flatten)]
    pub other: OtherKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<PathBuf>,

    /// Reference image, required in TIA mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,

    #[serde(flatten)]
    pub other: OtherKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationSection {
    /// Generation mode: "TA" | "TIA"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,

    /// Text guidance scale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_t: Option<f64>,

    /// Audio guidance scale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_a: Option<f64>,

    /// Mirror of `dit.sp_size`, rewritten on every reconciliation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_parallel: Option<ParallelDegree>,

    #[serde(flatten)]
    pub other: OtherKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DitSection {
    /// Requested sequence-parallel degree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sp_size: Option<ParallelDegree>,

    #[serde(flatten)]
    pub other: OtherKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffusionSection {
    #[serde(default)]
    pub timesteps: TimestepsSection,

    #[serde(flatten)]
    pub other: OtherKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimestepsSection {
    #[serde(default)]
    pub sampling: SamplingSection,

    #[serde(flatten)]
    pub other: OtherKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,

    #[serde(flatten)]
    pub other: OtherKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_filename: Option<String>,

    #[serde(flatten)]
    pub other: OtherKeys,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSection {
    /// Model variant: "1.3B" | "14B" once resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,

    #[serde(flatten)]
    pub other: OtherKeys,
}

/// A parallelism degree as written in YAML.
///
/// Anything that is not an integer is kept verbatim so reconciliation can
/// replace it with a logged default instead of rejecting the whole file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParallelDegree {
    Count(i64),
    Malformed(serde_yaml::Value),
}

impl From<u32> for ParallelDegree {
    fn from(value: u32) -> Self {
        ParallelDegree::Count(i64::from(value))
    }
}

impl GenerateConfig {
    /// Effective video filename inside the output directory
    pub fn video_filename(&self) -> &str {
        self.outputs
            .video_filename
            .as_deref()
            .unwrap_or(DEFAULT_VIDEO_FILENAME)
    }
}
