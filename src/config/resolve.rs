//! Merging overrides into a base configuration

use super::overrides::OverrideSet;
use super::schema::GenerateConfig;
use super::variant::{GenerationMode, ModelVariant};
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Output directory used when neither an override nor the base names one
pub const DEFAULT_OUTPUT_DIR: &str = "./output";

/// Merge `overrides` into a copy of `base`.
///
/// Every present override replaces its field; absent ones keep the base
/// value. The merge also normalizes the mode (upper-cased, `TA` when unset),
/// canonicalizes the variant, drops the image in TA mode, and merges the
/// metadata file into `extra`.
///
/// Reads only the prompt and metadata files named by `overrides`, so equal
/// inputs give equal outputs.
///
/// # Errors
///
/// `Error::Config` when no prompt source or audio path is available, a
/// referenced file is missing or unreadable, the variant is unknown, or the
/// mode is TIA without an image path.
pub fn resolve(base: &GenerateConfig, overrides: &OverrideSet) -> Result<GenerateConfig> {
    let mut config = base.clone();
    if overrides.is_empty() {
        tracing::debug!("no overrides, resolving base configuration as is");
    } else {
        tracing::debug!(count = overrides.len(), "applying configuration overrides");
    }

    config.inputs.prompt = Some(resolve_prompt(base, overrides)?);

    if let Some(negative) = &overrides.negative_prompt {
        config.inputs.negative_prompt = Some(negative.clone());
    }

    if let Some(audio) = &overrides.audio_path {
        config.inputs.audio_path = Some(audio.clone());
    }
    if config.inputs.audio_path.is_none() {
        return Err(Error::Config(
            "An audio file must be supplied via --audio or inputs.audio_path".into(),
        ));
    }

    if let Some(image) = &overrides.image_path {
        config.inputs.image_path = Some(image.clone());
    }

    let mode = match overrides.mode {
        Some(mode) => mode.as_str().to_string(),
        None => config
            .generation
            .mode
            .as_deref()
            .map(|m| m.trim().to_uppercase())
            .unwrap_or_else(|| GenerationMode::Ta.as_str().to_string()),
    };
    config.generation.mode = Some(mode.clone());

    // A TA run must not carry an image over from the base or a previous TIA run.
    if mode == GenerationMode::Ta.as_str() && config.inputs.image_path.is_some() {
        if overrides.image_path.is_some() {
            tracing::warn!("ignoring reference image: generation mode is TA");
        }
        config.inputs.image_path = None;
    }

    if mode == GenerationMode::Tia.as_str() && config.inputs.image_path.is_none() {
        return Err(Error::Config(
            "TIA mode selected but no image provided. Supply --image or switch to TA mode."
                .into(),
        ));
    }

    let generation = &mut config.generation;
    if let Some(frames) = overrides.frames {
        generation.frames = Some(frames);
    }
    if let Some(height) = overrides.height {
        generation.height = Some(height);
    }
    if let Some(width) = overrides.width {
        generation.width = Some(width);
    }
    if let Some(fps) = overrides.fps {
        generation.fps = Some(fps);
    }
    if let Some(seed) = overrides.seed {
        generation.seed = Some(seed);
    }
    if let Some(scale_t) = overrides.scale_t {
        generation.scale_t = Some(scale_t);
    }
    if let Some(scale_a) = overrides.scale_a {
        generation.scale_a = Some(scale_a);
    }

    if let Some(steps) = overrides.steps {
        config.diffusion.timesteps.sampling.steps = Some(steps);
    }

    if let Some(sp_size) = overrides.sp_size {
        config.dit.sp_size = Some(sp_size.into());
    }

    let variant = match overrides.variant {
        Some(variant) => variant,
        None => match config.model.variant.as_deref() {
            Some(raw) => ModelVariant::canonicalize(raw).ok_or_else(|| {
                Error::Config(format!(
                    "Unknown model variant '{raw}' in model.variant (expected 1.3B or 14B)"
                ))
            })?,
            None => ModelVariant::default(),
        },
    };
    config.model.variant = Some(variant.as_str().to_string());

    config.outputs.directory = Some(
        overrides
            .output_dir
            .clone()
            .or_else(|| config.outputs.directory.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
    );

    if let Some(metadata_path) = &overrides.metadata_file {
        merge_metadata(&mut config, metadata_path)?;
    }

    Ok(config)
}

/// Pick the prompt: prompt file, then prompt override, then base value.
fn resolve_prompt(base: &GenerateConfig, overrides: &OverrideSet) -> Result<String> {
    if let Some(path) = &overrides.prompt_file {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Prompt file not found: {}",
                path.display()
            )));
        }
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read prompt file {}: {}",
                path.display(),
                e
            ))
        })?;
        return Ok(text.trim().to_string());
    }

    if let Some(prompt) = &overrides.prompt {
        return Ok(prompt.clone());
    }

    match &base.inputs.prompt {
        Some(prompt) if !prompt.trim().is_empty() => Ok(prompt.clone()),
        _ => Err(Error::Config(
            "A prompt must be supplied via --prompt or --prompt-file".into(),
        )),
    }
}

fn merge_metadata(config: &mut GenerateConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "Metadata override file not found: {}",
            path.display()
        )));
    }

    let content = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read metadata file {}: {}",
            path.display(),
            e
        ))
    })?;

    let value: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse metadata file {}: {}",
            path.display(),
            e
        ))
    })?;

    let serde_json::Value::Object(entries) = value else {
        return Err(Error::Config(format!(
            "Metadata file {} must contain a JSON object",
            path.display()
        )));
    };

    for (key, value) in entries {
        let value = serde_yaml::to_value(value)?;
        config.extra.insert(key, value);
    }

    Ok(())
}
