//! Configuration validation

use super::schema::{GenerateConfig, ParallelDegree};
use super::variant::GenerationMode;

/// Validation error type
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid {field}: {value} (must be > 0)")]
    NonPositive { field: &'static str, value: u32 },

    #[error("Invalid {field}: {value} (must be finite and >= 0.0)")]
    InvalidScale { field: &'static str, value: f64 },

    #[error("Invalid dit.sp_size: {0} (must be >= 1)")]
    InvalidSpSize(i64),

    #[error("Invalid generation mode: {0} (must be one of: TA, TIA)")]
    InvalidMode(String),

    #[error("TIA mode requires inputs.image_path")]
    MissingImage,

    #[error("Audio file not found: {0}")]
    AudioNotFound(String),

    #[error("Image file not found: {0}")]
    ImageNotFound(String),
}

/// Validate the value ranges of a configuration
///
/// Checks:
/// - Frame, size, fps and step counts are positive
/// - Guidance scales are finite and non-negative
/// - A numeric `dit.sp_size` is at least 1
/// - A set mode is TA or TIA, and TIA carries an image
///
/// A non-numeric `dit.sp_size` is not an error here; reconciliation
/// replaces it with a logged default.
pub fn validate_config(config: &GenerateConfig) -> Result<(), ValidationError> {
    let generation = &config.generation;
    let counts = [
        ("generation.frames", generation.frames),
        ("generation.height", generation.height),
        ("generation.width", generation.width),
        ("generation.fps", generation.fps),
        (
            "diffusion.timesteps.sampling.steps",
            config.diffusion.timesteps.sampling.steps,
        ),
    ];
    for (field, value) in counts {
        if value == Some(0) {
            return Err(ValidationError::NonPositive { field, value: 0 });
        }
    }

    for (field, value) in [
        ("generation.scale_t", generation.scale_t),
        ("generation.scale_a", generation.scale_a),
    ] {
        if let Some(scale) = value {
            if !scale.is_finite() || scale < 0.0 {
                return Err(ValidationError::InvalidScale {
                    field,
                    value: scale,
                });
            }
        }
    }

    if let Some(ParallelDegree::Count(sp_size)) = config.dit.sp_size {
        if sp_size < 1 {
            return Err(ValidationError::InvalidSpSize(sp_size));
        }
    }

    if let Some(mode) = &generation.mode {
        let mode: GenerationMode = mode
            .parse()
            .map_err(|_| ValidationError::InvalidMode(mode.clone()))?;
        if mode == GenerationMode::Tia && config.inputs.image_path.is_none() {
            return Err(ValidationError::MissingImage);
        }
    }

    Ok(())
}

/// Check that the input media referenced by a resolved configuration exist
pub fn validate_inputs(config: &GenerateConfig) -> Result<(), ValidationError> {
    if let Some(audio) = &config.inputs.audio_path {
        if !audio.exists() {
            return Err(ValidationError::AudioNotFound(audio.display().to_string()));
        }
    }

    if let Some(image) = &config.inputs.image_path {
        if !image.exists() {
            return Err(ValidationError::ImageNotFound(image.display().to_string()));
        }
    }

    Ok(())
}
