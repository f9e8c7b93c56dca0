//! GPU topology detection

use super::env::{
    LaunchEnv, CUDA_LAUNCH_BLOCKING, CUDA_VISIBLE_DEVICES, LOCAL_RANK, RANK, WORLD_SIZE,
};
use super::reconcile::ReconciliationWarning;
use serde::Serialize;
use std::process::Command;

/// Source of visible CUDA devices when `CUDA_VISIBLE_DEVICES` is unset
pub trait DeviceProbe {
    /// Number of devices, or `None` when the probe cannot tell
    fn device_count(&self) -> Option<usize>;
}

/// Probe that lists GPUs with `nvidia-smi -L`
#[derive(Debug, Clone, Copy, Default)]
pub struct NvidiaSmi;

impl DeviceProbe for NvidiaSmi {
    fn device_count(&self) -> Option<usize> {
        let output = Command::new("nvidia-smi").arg("-L").output().ok()?;
        if !output.status.success() {
            tracing::debug!(status = %output.status, "nvidia-smi -L failed");
            return None;
        }
        let text = String::from_utf8_lossy(&output.stdout);
        Some(count_gpu_lines(&text))
    }
}

/// Count `GPU <n>: ...` lines in `nvidia-smi -L` output
pub fn count_gpu_lines(listing: &str) -> usize {
    listing
        .lines()
        .filter(|line| line.trim_start().starts_with("GPU "))
        .count()
}

/// Count the entries of a `CUDA_VISIBLE_DEVICES` value.
///
/// CUDA ignores everything from the first invalid ordinal on, so counting
/// stops at `-1`. An empty value hides every device.
pub fn count_visible_devices(raw: &str) -> usize {
    raw.split(',')
        .map(str::trim)
        .take_while(|entry| *entry != "-1")
        .filter(|entry| !entry.is_empty())
        .count()
}

/// Where the effective world size came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldSizeSource {
    Cli,
    Env,
    Devices,
    Default,
}

/// Detected devices and the effective world size
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topology {
    pub device_count: usize,
    pub world_size: usize,
    pub source: WorldSizeSource,
    /// Fail-soft replacements made while detecting
    #[serde(skip)]
    pub warnings: Vec<ReconciliationWarning>,
}

impl Topology {
    /// Detect the world size.
    ///
    /// Priority: explicit `cli_world_size`, then `WORLD_SIZE`, then the
    /// visible device count. The result is never below 1; a zero or
    /// unparsable explicit value is replaced by 1 with a warning.
    pub fn detect(
        cli_world_size: Option<u32>,
        env: &LaunchEnv,
        probe: &dyn DeviceProbe,
    ) -> Topology {
        let device_count = visible_device_count(env, probe);
        let mut warnings = Vec::new();

        let (world_size, source) = if let Some(requested) = cli_world_size {
            (
                positive_or_default("--world-size", &requested.to_string(), &mut warnings),
                WorldSizeSource::Cli,
            )
        } else if let Some(raw) = env.world_size() {
            (
                positive_or_default(WORLD_SIZE, raw, &mut warnings),
                WorldSizeSource::Env,
            )
        } else if device_count > 0 {
            (device_count, WorldSizeSource::Devices)
        } else {
            (1, WorldSizeSource::Default)
        };

        tracing::debug!(device_count, world_size, ?source, "detected topology");

        Topology {
            device_count,
            world_size,
            source,
            warnings,
        }
    }

    /// Topology with an explicit device count and world size
    pub fn fixed(device_count: usize, world_size: usize) -> Topology {
        Topology {
            device_count,
            world_size: world_size.max(1),
            source: WorldSizeSource::Cli,
            warnings: Vec::new(),
        }
    }

    /// Whether this is a single-process launch on at most one device
    pub fn is_single_device(&self) -> bool {
        self.world_size == 1 && self.device_count <= 1
    }

    /// Environment for the child process.
    ///
    /// Only single-device and CPU launches pin the distributed variables;
    /// multi-device launches inherit whatever the launcher set.
    pub fn child_env(&self) -> Vec<(String, String)> {
        if !self.is_single_device() {
            return Vec::new();
        }
        single_device_env(self.device_count)
    }
}

/// Variables that force a single-process run on device 0, or on the CPU
/// when `device_count` is 0
pub fn single_device_env(device_count: usize) -> Vec<(String, String)> {
    let visible = if device_count == 1 { "0" } else { "" };
    let mut vars = vec![
        (CUDA_VISIBLE_DEVICES.to_string(), visible.to_string()),
        (WORLD_SIZE.to_string(), "1".to_string()),
        (RANK.to_string(), "0".to_string()),
        (LOCAL_RANK.to_string(), "0".to_string()),
    ];
    if device_count == 0 {
        vars.push((CUDA_LAUNCH_BLOCKING.to_string(), "1".to_string()));
    }
    vars
}

/// Visible devices: `CUDA_VISIBLE_DEVICES` when set, else the probe, else 0
pub fn visible_device_count(env: &LaunchEnv, probe: &dyn DeviceProbe) -> usize {
    match env.cuda_visible_devices() {
        Some(raw) => count_visible_devices(raw),
        None => probe.device_count().unwrap_or(0),
    }
}

fn positive_or_default(
    field: &'static str,
    raw: &str,
    warnings: &mut Vec<ReconciliationWarning>,
) -> usize {
    match raw.trim().parse::<usize>() {
        Ok(value) if value >= 1 => value,
        _ => {
            let warning = ReconciliationWarning::Defaulted {
                field: field.to_string(),
                raw: raw.to_string(),
                value: 1,
            };
            tracing::warn!("{warning}");
            warnings.push(warning);
            1
        }
    }
}
