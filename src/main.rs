//! humo-runner CLI
//!
//! Entry point for launching HuMo inference.
//!
//! # Usage
//!
//! ```bash
//! # Generate a video from the default config
//! humo-runner generate --prompt "a person talking" --audio speech.wav
//!
//! # TIA mode with a reference image and the 14B variant
//! humo-runner generate --mode TIA --image face.png --audio speech.wav --variant 14B
//!
//! # Validate config
//! humo-runner validate configs/generate.yaml
//!
//! # Show config info
//! humo-runner info configs/generate.yaml --format json
//!
//! # Fit dit.sp_size to the detected GPUs
//! humo-runner fix-config configs/generate.yaml
//!
//! # Run torchrun with process counts capped at the visible GPUs
//! humo-runner torchrun -- --nproc_per_node 8 generate.py --cfg generate.yaml
//!
//! # Download model weights
//! humo-runner download --weights-dir ./weights
//! ```

use clap::Parser;
use humo_runner::config::{
    load_config, validate_config, Cli, Command, DownloadArgs, FixConfigArgs, GenerateArgs,
    InfoArgs, ModelVariant, OutputFormat, TorchrunArgs, ValidateArgs,
};
use humo_runner::dispatch::{CancellationToken, ScriptRunner};
use humo_runner::distributed::detect::visible_device_count;
use humo_runner::distributed::{
    fix_config_file, plan_torchrun, LaunchEnv, LaunchPlan, NvidiaSmi, Topology,
};
use humo_runner::pipeline::{prepare_run, GenerateRequest};
use humo_runner::weights::{
    select_models, HfHubSource, ModelDownloader, HUB_CACHE_SUBDIR, MODEL_REGISTRY,
};
use humo_runner::{Error, Result};
use std::process::ExitCode;
use std::time::Duration;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Configure output based on verbose/quiet flags
    let log_level = if cli.quiet {
        LogLevel::Quiet
    } else if cli.verbose {
        LogLevel::Verbose
    } else {
        LogLevel::Normal
    };
    init_tracing(log_level);

    let result = match cli.command {
        Command::Generate(args) => run_generate(args, log_level).map(|()| 0),
        Command::Validate(args) => run_validate(args, log_level).map(|()| 0),
        Command::Info(args) => run_info(args, log_level).map(|()| 0),
        Command::FixConfig(args) => run_fix_config(args, log_level).map(|()| 0),
        Command::Torchrun(args) => run_torchrun(args, log_level),
        Command::Download(args) => run_download(args, log_level).map(|()| 0),
    };

    match result {
        Ok(code) => exit_code(code),
        Err(e) => {
            eprintln!("Error: {e}");
            exit_code(e.exit_code())
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

#[derive(Clone, Copy, PartialEq)]
enum LogLevel {
    Quiet,
    Normal,
    Verbose,
}

fn log(level: LogLevel, required: LogLevel, msg: &str) {
    if level != LogLevel::Quiet && (level == required || required == LogLevel::Normal) {
        println!("{msg}");
    }
}

/// `RUST_LOG` wins; otherwise the verbosity flags pick the level
fn init_tracing(level: LogLevel) {
    let default = match level {
        LogLevel::Quiet => "error",
        LogLevel::Normal => "info",
        LogLevel::Verbose => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_generate(args: GenerateArgs, level: LogLevel) -> Result<()> {
    log(
        level,
        LogLevel::Normal,
        &format!("humo-runner: generating from {}", args.config.display()),
    );

    let request = GenerateRequest {
        config_path: args.config.clone(),
        overrides: args.to_overrides(),
        humo_dir: args.humo_dir.clone(),
        world_size: args.world_size,
        timeout: args.timeout_secs.map(Duration::from_secs),
        timestamp_dir: args.timestamp_dir,
    };

    let env = LaunchEnv::from_env();
    let prepared = prepare_run(&request, &env, &NvidiaSmi, chrono::Utc::now())?;

    let reconciliation = &prepared.reconciliation;
    log(
        level,
        LogLevel::Normal,
        &format!(
            "Script: {} (mode {}, variant {})",
            prepared.script_name,
            prepared.config.generation.mode.as_deref().unwrap_or("TA"),
            prepared.config.model.variant.as_deref().unwrap_or("1.3B"),
        ),
    );
    log(
        level,
        LogLevel::Verbose,
        &format!(
            "  World size: {} ({} device(s)), sp_size: {}",
            reconciliation.world_size(),
            reconciliation.topology.device_count,
            reconciliation.sp_size
        ),
    );
    for warning in &reconciliation.warnings {
        log(level, LogLevel::Verbose, &format!("  Adjusted: {warning}"));
    }
    log(
        level,
        LogLevel::Normal,
        &format!("Wrote request manifest to {}", prepared.manifest_path.display()),
    );

    if args.dry_run {
        log(
            level,
            LogLevel::Normal,
            "Dry run - configuration resolved, inference not started",
        );
        log(
            level,
            LogLevel::Verbose,
            &format!("  Resolved config: {}", prepared.resolved_config.display()),
        );
        return Ok(());
    }

    let (token, handle) = CancellationToken::new();
    if let Err(e) = ctrlc::set_handler(move || handle.cancel()) {
        tracing::warn!("could not install Ctrl-C handler: {e}");
    }

    let report = prepared.execute(&ScriptRunner::new(), &token)?;
    log(
        level,
        LogLevel::Normal,
        &format!("Inference logs written to {}", report.outcome.log_path.display()),
    );

    match report.video {
        Some(video) => log(
            level,
            LogLevel::Normal,
            &format!("Generated video available at {}", video.display()),
        ),
        None => log(
            level,
            LogLevel::Normal,
            "Warning: expected video file not found. Check the HuMo logs for details.",
        ),
    }

    Ok(())
}

fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<()> {
    log(
        level,
        LogLevel::Normal,
        &format!("Validating config: {}", args.config.display()),
    );

    let config = load_config(&args.config)?;
    validate_config(&config).map_err(|e| Error::Config(format!("Validation failed: {e}")))?;

    if let Some(raw) = &config.model.variant {
        raw.parse::<ModelVariant>()
            .map_err(|e| Error::Config(format!("Validation failed: {e}")))?;
    }

    log(level, LogLevel::Normal, "Configuration is valid");

    if args.detailed {
        let inputs = &config.inputs;
        let generation = &config.generation;
        println!();
        println!("Configuration Summary:");
        println!("  Prompt: {}", inputs.prompt.as_deref().unwrap_or("(from CLI)"));
        if let Some(audio) = &inputs.audio_path {
            println!("  Audio: {}", audio.display());
        }
        if let Some(image) = &inputs.image_path {
            println!("  Image: {}", image.display());
        }
        println!();
        println!("  Mode: {}", generation.mode.as_deref().unwrap_or("TA"));
        if let (Some(w), Some(h)) = (generation.width, generation.height) {
            println!("  Resolution: {w}x{h}");
        }
        if let Some(frames) = generation.frames {
            println!("  Frames: {frames}");
        }
        if let Some(steps) = config.diffusion.timesteps.sampling.steps {
            println!("  Sampling steps: {steps}");
        }
        println!("  Variant: {}", config.model.variant.as_deref().unwrap_or("1.3B"));
        if let Some(sp_size) = &config.dit.sp_size {
            println!("  dit.sp_size: {sp_size:?}");
        }
    }

    Ok(())
}

fn run_info(args: InfoArgs, level: LogLevel) -> Result<()> {
    let config = load_config(&args.config)?;

    match args.format {
        OutputFormat::Text => {
            log(level, LogLevel::Normal, "Configuration Info:");
            println!();
            println!(
                "Prompt: {}",
                config.inputs.prompt.as_deref().unwrap_or("(unset)")
            );
            println!(
                "Mode: {}",
                config.generation.mode.as_deref().unwrap_or("TA")
            );
            println!(
                "Variant: {}",
                config.model.variant.as_deref().unwrap_or("1.3B")
            );
            if let Some(dir) = &config.outputs.directory {
                println!("Output dir: {}", dir.display());
            }
            println!("Video file: {}", config.video_filename());
            if !config.other.is_empty() {
                let sections: Vec<&str> = config.other.keys().map(String::as_str).collect();
                println!("Other sections: {}", sections.join(", "));
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(&config)?);
        }
    }

    Ok(())
}

fn run_fix_config(args: FixConfigArgs, level: LogLevel) -> Result<()> {
    let env = LaunchEnv::from_env();
    let topology = Topology::detect(args.world_size, &env, &NvidiaSmi);
    log(
        level,
        LogLevel::Normal,
        &format!(
            "Detected {} GPU(s), world size {}",
            topology.device_count, topology.world_size
        ),
    );

    let outcome = fix_config_file(&args.config, &topology, !args.dry_run)?;
    let previous = outcome
        .previous
        .as_ref()
        .and_then(|v| serde_yaml::to_string(v).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unset".to_string());

    if !outcome.changed {
        log(level, LogLevel::Normal, "Configuration already optimal, no changes needed.");
    } else if outcome.written {
        log(
            level,
            LogLevel::Normal,
            &format!(
                "Updated dit.sp_size: {previous} -> {} in {} (sequence_parallel kept in sync)",
                outcome.sp_size,
                args.config.display()
            ),
        );
    } else {
        log(
            level,
            LogLevel::Normal,
            &format!("Dry run - would update dit.sp_size: {previous} -> {}", outcome.sp_size),
        );
    }

    Ok(())
}

fn run_torchrun(args: TorchrunArgs, level: LogLevel) -> Result<i32> {
    let env = LaunchEnv::from_env();
    let devices = visible_device_count(&env, &NvidiaSmi);
    log(
        level,
        LogLevel::Normal,
        &format!("torchrun: detected {devices} GPU(s)"),
    );

    let plan = plan_torchrun(&args.args, devices, &args.python);
    for (key, value) in &plan.env {
        log(level, LogLevel::Verbose, &format!("  Set {key}={value}"));
    }
    if let LaunchPlan::Direct { script, .. } = &plan.launch {
        log(
            level,
            LogLevel::Normal,
            &format!("Single GPU/CPU host, executing directly: {} {script}", plan.python),
        );
    }

    plan.execute()
}

fn run_download(args: DownloadArgs, level: LogLevel) -> Result<()> {
    log(level, LogLevel::Normal, "HuMo model downloader");

    let env = LaunchEnv::from_env();
    let token = env.hf_token().map(str::to_string);
    if token.is_none() {
        tracing::warn!("HUGGINGFACE_TOKEN not set; some models may not be accessible");
    }

    let specs = select_models(&args.only)?;
    let source = HfHubSource::new(&args.weights_dir.join(HUB_CACHE_SUBDIR), token)?;
    let downloader = ModelDownloader::new(source, &args.weights_dir)?;

    let results = downloader.download_all(&specs);

    let valid = if args.skip_validation {
        log(level, LogLevel::Normal, "Skipping validation step as requested.");
        true
    } else {
        downloader.validate_downloads(&specs).is_empty()
    };

    println!();
    println!("Download Summary:");
    for result in &results {
        let repo = MODEL_REGISTRY
            .iter()
            .find(|s| s.key == result.key)
            .map_or("", |s| s.repo_id);
        let status = if result.downloaded { "ok" } else { "FAILED" };
        println!("  [{status}] {}: {repo}", result.key);
        if let Some(error) = &result.error {
            log(level, LogLevel::Verbose, &format!("         {error}"));
        }
    }
    let succeeded = results.iter().filter(|r| r.downloaded).count();
    println!();
    println!("Success: {succeeded}/{} models downloaded", results.len());

    match downloader.write_manifest(&specs, &results) {
        Ok(path) => log(
            level,
            LogLevel::Verbose,
            &format!("Manifest written to {}", path.display()),
        ),
        Err(e) => tracing::warn!("unable to write download manifest: {e}"),
    }

    if !valid {
        return Err(Error::Download(
            "Some required models are missing or incomplete".into(),
        ));
    }

    log(level, LogLevel::Normal, "All required models downloaded successfully!");
    Ok(())
}
