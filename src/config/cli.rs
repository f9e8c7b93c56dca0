//! CLI argument parsing
//!
//! # Usage
//!
//! ```bash
//! humo-runner generate --prompt "a person talking" --audio speech.wav
//! humo-runner generate --config configs/generate.yaml --mode TIA --image face.png --audio speech.wav
//! humo-runner validate configs/generate.yaml
//! humo-runner info configs/generate.yaml --format json
//! humo-runner fix-config configs/generate.yaml
//! humo-runner torchrun -- --nproc_per_node 8 generate.py
//! humo-runner download --weights-dir ./weights
//! ```

use super::overrides::OverrideSet;
use super::variant::{GenerationMode, ModelVariant};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Base configuration path used when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "configs/generate.yaml";

/// humo-runner: HuMo inference launcher
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "humo-runner")]
#[command(version)]
#[command(
    about = "Resolve HuMo generation configs, reconcile distributed launch settings, and dispatch inference"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Resolve the configuration and run HuMo inference
    Generate(GenerateArgs),

    /// Validate a configuration file without running anything
    Validate(ValidateArgs),

    /// Display information about a configuration
    Info(InfoArgs),

    /// Rewrite dit.sp_size in a configuration to match the detected GPUs
    FixConfig(FixConfigArgs),

    /// Run torchrun with process counts adjusted to the detected GPUs
    Torchrun(TorchrunArgs),

    /// Download the model weights HuMo needs
    Download(DownloadArgs),
}

/// Arguments for the generate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct GenerateArgs {
    /// Path to generate.yaml
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Text prompt for generation
    #[arg(long)]
    pub prompt: Option<String>,

    /// Path to a file containing the text prompt
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,

    /// Negative prompt to steer generation
    #[arg(long)]
    pub negative_prompt: Option<String>,

    /// Path to conditioning audio file
    #[arg(long)]
    pub audio: Option<PathBuf>,

    /// Reference image (TIA mode)
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Generation mode override (TA or TIA)
    #[arg(long)]
    pub mode: Option<GenerationMode>,

    /// Directory for outputs
    #[arg(long, env = "OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Number of frames to generate
    #[arg(long)]
    pub frames: Option<u32>,

    /// Video height
    #[arg(long)]
    pub height: Option<u32>,

    /// Video width
    #[arg(long)]
    pub width: Option<u32>,

    /// Sampling steps
    #[arg(long)]
    pub steps: Option<u32>,

    /// Frames per second
    #[arg(long)]
    pub fps: Option<u32>,

    /// Audio guidance scale
    #[arg(long)]
    pub scale_a: Option<f64>,

    /// Text guidance scale
    #[arg(long)]
    pub scale_t: Option<f64>,

    /// Random seed override
    #[arg(long, allow_hyphen_values = true)]
    pub seed: Option<i64>,

    /// Model variant (1.3B or 14B)
    #[arg(long)]
    pub variant: Option<ModelVariant>,

    /// Sequence parallel size (dit.sp_size)
    #[arg(long)]
    pub sp_size: Option<u32>,

    /// Optional metadata JSON merged into the request
    #[arg(long, alias = "metadata-file")]
    pub metadata: Option<PathBuf>,

    /// HuMo source checkout containing scripts/
    #[arg(long, env = "HUMO_SOURCE_DIR", default_value = "HuMo")]
    pub humo_dir: PathBuf,

    /// World size override (otherwise WORLD_SIZE or detected GPUs)
    #[arg(long)]
    pub world_size: Option<u32>,

    /// Kill the inference script after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Write outputs into a fresh timestamped subdirectory
    #[arg(long)]
    pub timestamp_dir: bool,

    /// Resolve and write manifests without running inference
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Show detailed validation report
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for the info command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InfoArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the fix-config command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct FixConfigArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// World size override (otherwise WORLD_SIZE or detected GPUs)
    #[arg(long)]
    pub world_size: Option<u32>,

    /// Report the change without writing the file
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the torchrun command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct TorchrunArgs {
    /// Python interpreter used for direct single-process execution
    #[arg(long, default_value = "python3")]
    pub python: String,

    /// Arguments forwarded to torchrun
    #[arg(
        value_name = "TORCHRUN_ARGS",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub args: Vec<String>,
}

/// Arguments for the download command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct DownloadArgs {
    /// Directory to store downloaded models
    #[arg(long, env = "MODEL_CACHE_DIR", default_value = "./weights")]
    pub weights_dir: PathBuf,

    /// Skip validation of downloaded models
    #[arg(long)]
    pub skip_validation: bool,

    /// Only download the models with these keys
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,
}

/// Output format for info command
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            _ => Err(format!(
                "Unknown output format: {}. Valid formats: text, json, yaml",
                s
            )),
        }
    }
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

impl GenerateArgs {
    /// Build the override set for these arguments.
    ///
    /// Paths are made absolute against the current directory and empty text
    /// fields count as absent.
    pub fn to_overrides(&self) -> OverrideSet {
        OverrideSet {
            prompt: non_empty(&self.prompt),
            prompt_file: self.prompt_file.as_deref().map(absolute),
            negative_prompt: non_empty(&self.negative_prompt),
            audio_path: self.audio.as_deref().map(absolute),
            image_path: self.image.as_deref().map(absolute),
            mode: self.mode,
            frames: self.frames,
            height: self.height,
            width: self.width,
            fps: self.fps,
            steps: self.steps,
            seed: self.seed,
            scale_t: self.scale_t,
            scale_a: self.scale_a,
            variant: self.variant,
            sp_size: self.sp_size,
            output_dir: self.output_dir.as_deref().map(absolute),
            metadata_file: self.metadata.as_deref().map(absolute),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.trim().is_empty()).cloned()
}

/// Absolute form of `path`, or the path itself if the cwd is unavailable
pub fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_args(extra: &[&str]) -> GenerateArgs {
        let mut argv = vec!["humo-runner", "generate"];
        argv.extend_from_slice(extra);
        match parse_args(argv).unwrap().command {
            Command::Generate(args) => args,
            _ => panic!("Expected Generate command"),
        }
    }

    #[test]
    fn test_parse_generate_defaults() {
        let args = generate_args(&["--prompt", "hello", "--audio", "a.wav"]);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(args.prompt.as_deref(), Some("hello"));
        assert!(args.mode.is_none());
        assert!(!args.dry_run);
        assert!(!args.timestamp_dir);
    }

    #[test]
    fn test_parse_generate_with_overrides() {
        let args = generate_args(&[
            "--prompt",
            "hello",
            "--audio",
            "a.wav",
            "--mode",
            "tia",
            "--image",
            "face.png",
            "--frames",
            "97",
            "--height",
            "720",
            "--width",
            "1280",
            "--steps",
            "30",
            "--fps",
            "25",
            "--scale-a",
            "2.5",
            "--scale-t",
            "7.5",
            "--seed",
            "-1",
            "--variant",
            "17B",
            "--sp-size",
            "4",
            "--timeout-secs",
            "600",
        ]);

        assert_eq!(args.mode, Some(GenerationMode::Tia));
        assert_eq!(args.frames, Some(97));
        assert_eq!(args.height, Some(720));
        assert_eq!(args.width, Some(1280));
        assert_eq!(args.steps, Some(30));
        assert_eq!(args.fps, Some(25));
        assert_eq!(args.scale_a, Some(2.5));
        assert_eq!(args.scale_t, Some(7.5));
        assert_eq!(args.seed, Some(-1));
        assert_eq!(args.variant, Some(ModelVariant::Large));
        assert_eq!(args.sp_size, Some(4));
        assert_eq!(args.timeout_secs, Some(600));
    }

    #[test]
    fn test_unknown_variant_rejected_at_parse() {
        let result = parse_args(["humo-runner", "generate", "--variant", "7B"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_mode_rejected_at_parse() {
        let result = parse_args(["humo-runner", "generate", "--mode", "T2V"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_metadata_alias() {
        let args = generate_args(&["--metadata-file", "meta.json"]);
        assert_eq!(args.metadata, Some(PathBuf::from("meta.json")));
    }

    #[test]
    fn test_to_overrides() {
        let args = generate_args(&[
            "--prompt",
            "hello",
            "--negative-prompt",
            "  ",
            "--audio",
            "a.wav",
            "--frames",
            "64",
        ]);
        let overrides = args.to_overrides();

        assert_eq!(overrides.prompt.as_deref(), Some("hello"));
        assert!(overrides.negative_prompt.is_none());
        let audio = overrides.audio_path.unwrap();
        assert!(audio.is_absolute());
        assert!(audio.ends_with("a.wav"));
        assert_eq!(overrides.frames, Some(64));
        assert!(overrides.image_path.is_none());
    }

    #[test]
    fn test_parse_validate_command() {
        let cli = parse_args(["humo-runner", "validate", "config.yaml", "--detailed"]).unwrap();
        match cli.command {
            Command::Validate(args) => {
                assert_eq!(args.config, PathBuf::from("config.yaml"));
                assert!(args.detailed);
            }
            _ => panic!("Expected Validate command"),
        }
    }

    #[test]
    fn test_parse_info_json_format() {
        let cli = parse_args(["humo-runner", "info", "config.yaml", "--format", "json"]).unwrap();
        match cli.command {
            Command::Info(args) => assert_eq!(args.format, OutputFormat::Json),
            _ => panic!("Expected Info command"),
        }
    }

    #[test]
    fn test_parse_fix_config_defaults() {
        let cli = parse_args(["humo-runner", "fix-config"]).unwrap();
        match cli.command {
            Command::FixConfig(args) => {
                assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
                assert!(args.world_size.is_none());
                assert!(!args.dry_run);
            }
            _ => panic!("Expected FixConfig command"),
        }
    }

    #[test]
    fn test_parse_torchrun_passthrough() {
        let cli = parse_args([
            "humo-runner",
            "torchrun",
            "--",
            "--nproc_per_node",
            "8",
            "generate.py",
            "--config",
            "x.yaml",
        ])
        .unwrap();
        match cli.command {
            Command::Torchrun(args) => {
                assert_eq!(args.python, "python3");
                assert_eq!(
                    args.args,
                    vec!["--nproc_per_node", "8", "generate.py", "--config", "x.yaml"]
                );
            }
            _ => panic!("Expected Torchrun command"),
        }
    }

    #[test]
    fn test_torchrun_requires_args() {
        assert!(parse_args(["humo-runner", "torchrun"]).is_err());
    }

    #[test]
    fn test_parse_download_only_list() {
        let cli = parse_args([
            "humo-runner",
            "download",
            "--weights-dir",
            "/models",
            "--only",
            "humo,whisper",
            "--skip-validation",
        ])
        .unwrap();
        match cli.command {
            Command::Download(args) => {
                assert_eq!(args.weights_dir, PathBuf::from("/models"));
                assert_eq!(args.only, vec!["humo", "whisper"]);
                assert!(args.skip_validation);
            }
            _ => panic!("Expected Download command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = parse_args(["humo-runner", "-v", "validate", "c.yaml"]).unwrap();
        assert!(cli.verbose);
        assert!(!cli.quiet);

        let cli = parse_args(["humo-runner", "-q", "validate", "c.yaml"]).unwrap();
        assert!(cli.quiet);
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("yaml".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert!("invalid".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert!(parse_args(["humo-runner", "unknown"]).is_err());
    }
}
