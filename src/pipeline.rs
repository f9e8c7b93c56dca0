//! End-to-end preparation and execution of a generation request
//!
//! Preparation is everything up to launching the script: resolve the
//! configuration, select and locate the script, validate, reconcile the
//! parallel degree, and write the manifests. Execution runs the script
//! and finds the video.

use crate::config::{
    absolute, load_config, resolve, validate_config, validate_inputs, GenerateConfig,
    OverrideSet,
};
use crate::dispatch::{
    locate_script, locate_video, select_script, CancellationToken, RunOptions, RunOutcome,
    ScriptRunner,
};
use crate::distributed::{reconcile_config, DeviceProbe, LaunchEnv, Reconciliation, Topology};
use crate::error::{Error, Result};
use crate::manifest::{sync_config, timestamped_run_dir, write_resolved_config, RequestManifest};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

/// Everything a front end supplies for one generation
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub config_path: PathBuf,
    pub overrides: OverrideSet,
    pub humo_dir: PathBuf,
    pub world_size: Option<u32>,
    pub timeout: Option<Duration>,
    /// Put outputs in a fresh timestamped subdirectory of the output dir
    pub timestamp_dir: bool,
}

/// A request ready to launch, with its manifests on disk
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub config: GenerateConfig,
    pub script_name: &'static str,
    pub script_path: PathBuf,
    pub humo_dir: PathBuf,
    pub output_dir: PathBuf,
    pub resolved_config: PathBuf,
    pub synced_config: PathBuf,
    pub manifest_path: PathBuf,
    pub reconciliation: Reconciliation,
    pub timeout: Option<Duration>,
}

/// A finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// `None` when the script succeeded but left no video
    pub video: Option<PathBuf>,
}

/// Prepare `request` for launch.
///
/// `now` names the output subdirectory when `timestamp_dir` is set.
///
/// # Errors
///
/// - `Error::Config` for unresolvable or invalid configuration
/// - `Error::UnsupportedCombination` for a mode/variant with no script
/// - `Error::MissingDependency` when the HuMo checkout or script is missing
pub fn prepare_run(
    request: &GenerateRequest,
    env: &LaunchEnv,
    probe: &dyn DeviceProbe,
    now: DateTime<Utc>,
) -> Result<PreparedRun> {
    let base = load_config(&request.config_path)?;
    let mut config = resolve(&base, &request.overrides)?;

    let mode = config.generation.mode.clone().unwrap_or_default();
    let variant = config.model.variant.clone().unwrap_or_default();
    let script_name = select_script(&mode, &variant)?;
    tracing::info!(mode = %mode, variant = %variant, script = script_name, "selected HuMo script");

    validate_config(&config).map_err(|e| Error::Config(e.to_string()))?;
    validate_inputs(&config).map_err(|e| Error::Config(e.to_string()))?;

    let humo_dir = absolute(&request.humo_dir);
    let script_path = locate_script(&humo_dir, script_name)?;

    let mut output_dir = absolute(
        config
            .outputs
            .directory
            .as_deref()
            .unwrap_or_else(|| std::path::Path::new(crate::config::DEFAULT_OUTPUT_DIR)),
    );
    if request.timestamp_dir {
        output_dir = timestamped_run_dir(&output_dir, now);
    }
    config.outputs.directory = Some(output_dir.clone());

    let topology = Topology::detect(request.world_size, env, probe);
    let reconciliation = reconcile_config(&mut config, &topology);

    let resolved_config = write_resolved_config(&config, &output_dir)?;
    let synced_config = sync_config(&resolved_config, &humo_dir)?;
    let manifest = RequestManifest::new(config.clone(), script_name, reconciliation.clone());
    let manifest_path = manifest.write(&output_dir)?;

    Ok(PreparedRun {
        config,
        script_name,
        script_path,
        humo_dir,
        output_dir,
        resolved_config,
        synced_config,
        manifest_path,
        reconciliation,
        timeout: request.timeout,
    })
}

impl PreparedRun {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            humo_dir: self.humo_dir.clone(),
            output_dir: self.output_dir.clone(),
            resolved_config: self.resolved_config.clone(),
            env: self.reconciliation.child_env(),
            timeout: self.timeout,
        }
    }

    /// Run the script and locate the video it produced
    pub fn execute(&self, runner: &ScriptRunner, token: &CancellationToken) -> Result<RunReport> {
        let outcome = runner.run(&self.script_path, &self.run_options(), token)?;
        let video = locate_video(&self.output_dir, &self.humo_dir, self.config.video_filename())?;
        Ok(RunReport { outcome, video })
    }
}
