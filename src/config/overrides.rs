//! Field-level overrides from the CLI or any other front end

use super::variant::{GenerationMode, ModelVariant};
use std::path::PathBuf;

/// Values that replace configuration fields when present.
///
/// `None` always means "keep the base value". Front ends that receive empty
/// strings for optional text fields should map them to `None` before
/// building the set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideSet {
    pub prompt: Option<String>,
    /// Takes precedence over `prompt`
    pub prompt_file: Option<PathBuf>,
    pub negative_prompt: Option<String>,
    pub audio_path: Option<PathBuf>,
    pub image_path: Option<PathBuf>,
    pub mode: Option<GenerationMode>,
    pub frames: Option<u32>,
    pub height: Option<u32>,
    pub width: Option<u32>,
    pub fps: Option<u32>,
    pub steps: Option<u32>,
    pub seed: Option<i64>,
    pub scale_t: Option<f64>,
    pub scale_a: Option<f64>,
    pub variant: Option<ModelVariant>,
    pub sp_size: Option<u32>,
    pub output_dir: Option<PathBuf>,
    /// JSON object merged into the `extra` section
    pub metadata_file: Option<PathBuf>,
}

impl OverrideSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fields that carry a value
    pub fn len(&self) -> usize {
        [
            self.prompt.is_some(),
            self.prompt_file.is_some(),
            self.negative_prompt.is_some(),
            self.audio_path.is_some(),
            self.image_path.is_some(),
            self.mode.is_some(),
            self.frames.is_some(),
            self.height.is_some(),
            self.width.is_some(),
            self.fps.is_some(),
            self.steps.is_some(),
            self.seed.is_some(),
            self.scale_t.is_some(),
            self.scale_a.is_some(),
            self.variant.is_some(),
            self.sp_size.is_some(),
            self.output_dir.is_some(),
            self.metadata_file.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set() {
        let overrides = OverrideSet::new();
        assert!(overrides.is_empty());
        assert_eq!(overrides.len(), 0);
    }

    #[test]
    fn test_len_counts_present_fields() {
        let overrides = OverrideSet {
            prompt: Some("hello".into()),
            frames: Some(97),
            variant: Some(ModelVariant::Large),
            ..Default::default()
        };
        assert_eq!(overrides.len(), 3);
        assert!(!overrides.is_empty());
    }
}
