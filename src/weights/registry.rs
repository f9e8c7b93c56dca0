//! Model repositories HuMo needs

use crate::error::{Error, Result};

/// A Hugging Face repository to fetch into the weights directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    pub key: &'static str,
    pub repo_id: &'static str,
    pub description: &'static str,
    /// Directory under the weights root
    pub local_subdir: &'static str,
    /// Whether validation fails when this model is missing
    pub required: bool,
    /// Files to fetch; empty means every file in the repository
    pub files: &'static [&'static str],
    /// Files that must exist after download
    pub files_to_validate: &'static [&'static str],
}

pub const MODEL_REGISTRY: &[ModelSpec] = &[
    ModelSpec {
        key: "wan_t2v",
        repo_id: "Wan-AI/Wan2.1-T2V-1.3B",
        description: "Wan 1.3B text-to-video base model",
        local_subdir: "Wan2.1-T2V-1.3B",
        required: true,
        files: &[],
        files_to_validate: &["config.json"],
    },
    ModelSpec {
        key: "wan_t2v_14b",
        repo_id: "Wan-AI/Wan2.1-T2V-14B",
        description: "Wan 14B high-capacity model",
        local_subdir: "Wan2.1-T2V-14B",
        required: false,
        files: &[],
        files_to_validate: &["config.json"],
    },
    ModelSpec {
        key: "humo",
        repo_id: "bytedance-research/HuMo",
        description: "HuMo motion generation resources",
        local_subdir: "HuMo",
        required: true,
        files: &[],
        files_to_validate: &["config.json"],
    },
    ModelSpec {
        key: "whisper",
        repo_id: "openai/whisper-large-v3",
        description: "Whisper ASR model",
        local_subdir: "whisper-large-v3",
        required: true,
        files: &[],
        files_to_validate: &["config.json", "model.safetensors"],
    },
    ModelSpec {
        key: "audio_separator",
        repo_id: "seanghay/uvr_models",
        description: "Kim Vocal 2 source separation model",
        local_subdir: "audio_separator",
        required: true,
        files: &["Kim_Vocal_2.onnx"],
        files_to_validate: &["Kim_Vocal_2.onnx"],
    },
];

pub fn find_model(key: &str) -> Option<&'static ModelSpec> {
    MODEL_REGISTRY.iter().find(|spec| spec.key == key)
}

/// Models named by `only`, or the whole registry when it is empty
///
/// # Errors
///
/// `Error::Config` for a key that is not in the registry.
pub fn select_models(only: &[String]) -> Result<Vec<&'static ModelSpec>> {
    if only.is_empty() {
        return Ok(MODEL_REGISTRY.iter().collect());
    }

    only.iter()
        .map(|key| {
            find_model(key.trim()).ok_or_else(|| {
                let known: Vec<&str> = MODEL_REGISTRY.iter().map(|s| s.key).collect();
                Error::Config(format!(
                    "Unknown model key: {}. Known keys: {}",
                    key,
                    known.join(", ")
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_keys_unique() {
        let mut keys: Vec<&str> = MODEL_REGISTRY.iter().map(|s| s.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), MODEL_REGISTRY.len());
    }

    #[test]
    fn test_only_large_wan_is_optional() {
        let optional: Vec<&str> = MODEL_REGISTRY
            .iter()
            .filter(|s| !s.required)
            .map(|s| s.key)
            .collect();
        assert_eq!(optional, vec!["wan_t2v_14b"]);
    }

    #[test]
    fn test_select_models() {
        assert_eq!(select_models(&[]).unwrap().len(), MODEL_REGISTRY.len());

        let picked = select_models(&["whisper".into(), "humo".into()]).unwrap();
        assert_eq!(picked[0].repo_id, "openai/whisper-large-v3");
        assert_eq!(picked[1].local_subdir, "HuMo");

        let err = select_models(&["sora".into()]).unwrap_err();
        assert!(err.to_string().contains("wan_t2v"));
    }
}
