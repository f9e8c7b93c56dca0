//! Declarative YAML configuration for HuMo generation
//!
//! A base `generate.yaml` is loaded, CLI or UI overrides are merged into a
//! copy, and the result is validated before dispatch.
//!
//! # Example
//!
//! ```yaml
//! inputs:
//!   prompt: a woman singing on a stage
//!   audio_path: ./inputs/song.wav
//!
//! generation:
//!   mode: TA
//!   frames: 97
//!   height: 480
//!   width: 832
//!
//! dit:
//!   sp_size: 1
//!
//! diffusion:
//!   timesteps:
//!     sampling:
//!       steps: 50
//!
//! model:
//!   variant: 1.3B
//! ```

mod cli;
mod load;
mod overrides;
mod resolve;
mod schema;
mod validate;
mod variant;

#[cfg(test)]
mod tests;


pub use cli::{
    absolute, parse_args, Cli, Command, DownloadArgs, FixConfigArgs, GenerateArgs, InfoArgs,
    OutputFormat, TorchrunArgs, ValidateArgs, DEFAULT_CONFIG_PATH,
};
pub use load::{load_config, parse_config, save_config};
pub use overrides::OverrideSet;
pub use resolve::{resolve, DEFAULT_OUTPUT_DIR};
pub use schema::{
    DiffusionSection, DitSection, GenerateConfig, GenerationSection, InputsSection,
    ModelSection, OtherKeys, OutputsSection, ParallelDegree, SamplingSection, TimestepsSection,
    DEFAULT_VIDEO_FILENAME,
};
pub use validate::{validate_config, validate_inputs, ValidationError};
pub use variant::{GenerationMode, ModelVariant};
