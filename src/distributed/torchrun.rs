//! `torchrun` argument rewriting
//!
//! Launchers written for an eight-GPU node ask for more processes than a
//! smaller host has devices, which fails with an invalid device ordinal.
//! The process count is capped at the visible device count, and on hosts
//! with at most one device the script is run directly by the interpreter.

use super::detect::single_device_env;
use crate::error::Result;
use std::process::Command;

/// Flags that set the per-node process count
pub const NPROC_FLAGS: &[&str] = &["--nproc_per_node", "--nproc-per-node"];

/// Program used for distributed launches
pub const TORCHRUN_PROGRAM: &str = "torchrun";

/// How a torchrun invocation will be executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchPlan {
    /// Run `script` directly with the interpreter
    Direct { script: String, args: Vec<String> },
    /// Run torchrun with rewritten arguments
    Torchrun,
}

/// A planned torchrun invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorchrunPlan {
    pub launch: LaunchPlan,
    /// Rewritten torchrun arguments, also used when direct execution
    /// cannot be spawned
    pub torchrun_args: Vec<String>,
    /// Variables set on the child process
    pub env: Vec<(String, String)>,
    pub python: String,
    pub torchrun: String,
}

/// Cap every per-node process count in `args` at `max(1, device_count)`.
///
/// Handles both `--flag N` and `--flag=N`. Values that are not numbers are
/// kept as they are.
pub fn rewrite_torchrun_args(args: &[String], device_count: usize) -> Vec<String> {
    let cap = device_count.max(1);
    let mut fixed = Vec::with_capacity(args.len());
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if NPROC_FLAGS.contains(&arg.as_str()) {
            fixed.push(arg.clone());
            if let Some(value) = iter.next() {
                fixed.push(cap_process_count(arg, value, cap));
            }
            continue;
        }

        if let Some((flag, value)) = arg.split_once('=') {
            if NPROC_FLAGS.contains(&flag) {
                fixed.push(format!("{flag}={}", cap_process_count(flag, value, cap)));
                continue;
            }
        }

        fixed.push(arg.clone());
    }

    fixed
}

/// Whether any form of the per-node process flag is present
pub fn has_nproc_flag(args: &[String]) -> bool {
    args.iter().any(|arg| {
        NPROC_FLAGS
            .iter()
            .any(|flag| arg == flag || arg.starts_with(&format!("{flag}=")))
    })
}

/// The first `.py` argument and everything after it
pub fn direct_execution_target(args: &[String]) -> Option<(String, Vec<String>)> {
    let index = args.iter().position(|arg| arg.ends_with(".py"))?;
    Some((args[index].clone(), args[index + 1..].to_vec()))
}

/// Plan how to execute `torchrun <args>` on a host with `device_count`
/// visible devices
pub fn plan_torchrun(args: &[String], device_count: usize, python: &str) -> TorchrunPlan {
    let env = if device_count <= 1 {
        single_device_env(device_count)
    } else {
        Vec::new()
    };

    let launch = if device_count <= 1 && has_nproc_flag(args) {
        match direct_execution_target(args) {
            Some((script, args)) => LaunchPlan::Direct { script, args },
            None => LaunchPlan::Torchrun,
        }
    } else {
        LaunchPlan::Torchrun
    };

    TorchrunPlan {
        launch,
        torchrun_args: rewrite_torchrun_args(args, device_count),
        env,
        python: python.to_string(),
        torchrun: TORCHRUN_PROGRAM.to_string(),
    }
}

impl TorchrunPlan {
    /// Run the plan and return the child's exit code.
    ///
    /// A direct launch that cannot be spawned falls back to torchrun.
    /// A child killed by a signal reports 1.
    ///
    /// # Errors
    ///
    /// `Error::Io` when torchrun itself cannot be spawned.
    pub fn execute(&self) -> Result<i32> {
        if let LaunchPlan::Direct { script, args } = &self.launch {
            tracing::info!("single GPU/CPU host, running {} {} directly", self.python, script);
            let status = Command::new(&self.python)
                .arg(script)
                .args(args)
                .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .status();
            match status {
                Ok(status) => return Ok(status.code().unwrap_or(1)),
                Err(e) => {
                    tracing::warn!("direct execution failed: {e}; falling back to torchrun");
                }
            }
        }

        tracing::info!("executing: {} {}", self.torchrun, self.torchrun_args.join(" "));
        let status = Command::new(&self.torchrun)
            .args(&self.torchrun_args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .status()?;
        Ok(status.code().unwrap_or(1))
    }
}

fn cap_process_count(flag: &str, value: &str, cap: usize) -> String {
    match value.trim().parse::<usize>() {
        Ok(requested) => {
            let adjusted = requested.min(cap);
            if adjusted != requested {
                tracing::info!("adjusted {flag}: {requested} -> {adjusted}");
            }
            adjusted.to_string()
        }
        Err(_) => {
            tracing::warn!("leaving non-numeric {flag} value {value:?} unchanged");
            value.to_string()
        }
    }
}
