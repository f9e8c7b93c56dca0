//! Running HuMo inference scripts
//!
//! The script runs under `bash` from the HuMo checkout with an explicit
//! environment. Both pipes are drained on background threads so a chatty
//! script cannot block on a full pipe while the runner polls for exit,
//! timeout and cancellation.

use super::cancel::CancellationToken;
use crate::error::{Error, Result};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Log file written into the output directory for every run
pub const INFERENCE_LOG: &str = "inference.log";

/// Directory inside the HuMo checkout where scripts may leave the video
pub const HUMO_OUTPUTS_DIR: &str = "outputs";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long to wait for pipe output after the script is gone, unless a
/// timeout leaves a different budget. Processes the script started may
/// still hold the pipes open.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Where and how to run an inference script
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// HuMo checkout, used as the working directory
    pub humo_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Resolved configuration exported as `HUMO_GENERATE_CONFIG`
    pub resolved_config: PathBuf,
    /// Extra variables, usually the reconciliation's child environment
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

/// A completed successful run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub exit_code: i32,
    pub log_path: PathBuf,
    pub elapsed: Duration,
}

enum RunEnd {
    Exited(ExitStatus),
    TimedOut(Duration),
    Cancelled,
    /// Polling the child failed; it has been killed
    WaitFailed(io::Error),
}

/// Runs inference scripts through a shell
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    shell: String,
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self {
            shell: "bash".to_string(),
        }
    }
}

impl ScriptRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `shell` instead of `bash`
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// Run `script` and wait for it.
    ///
    /// `inference.log` in the output directory receives stdout, a newline,
    /// then stderr, whatever the outcome.
    ///
    /// # Errors
    ///
    /// - `Error::Execution` when the script exits non-zero
    /// - `Error::Timeout` when `options.timeout` elapses first
    /// - `Error::Cancelled` when `token` is cancelled first
    /// - `Error::Io` when the shell cannot be spawned or polled, or the log
    ///   cannot be written
    pub fn run(
        &self,
        script: &Path,
        options: &RunOptions,
        token: &CancellationToken,
    ) -> Result<RunOutcome> {
        fs::create_dir_all(&options.output_dir)?;

        tracing::info!(script = %script.display(), cwd = %options.humo_dir.display(), "starting HuMo script");
        tracing::debug!("{} {}", self.shell, script.display());

        let mut child = Command::new(&self.shell)
            .arg(script)
            .current_dir(&options.humo_dir)
            .env("OUTPUT_DIR", &options.output_dir)
            .env("HUMO_GENERATE_CONFIG", &options.resolved_config)
            .env("PYTHONUNBUFFERED", "1")
            .envs(options.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let capture = Capture {
            stdout: drain(child.stdout.take()),
            stderr: drain(child.stderr.take()),
        };

        let start = Instant::now();
        let end = wait_for_exit(&mut child, options.timeout, token, start);
        let elapsed = start.elapsed();

        finish(end, elapsed, capture, options, token)
    }
}

/// Write the log, then turn the way the script ended into a result
fn finish(
    end: RunEnd,
    elapsed: Duration,
    capture: Capture,
    options: &RunOptions,
    token: &CancellationToken,
) -> Result<RunOutcome> {
    // Once the script itself has exited, only the timeout budget and the
    // token bound how long its leftover children may keep the pipes open
    let (budget, watch) = match &end {
        RunEnd::Exited(_) => (
            options.timeout.map_or(KILL_GRACE, |limit| {
                limit.saturating_sub(elapsed).max(POLL_INTERVAL)
            }),
            Some(token),
        ),
        _ => (KILL_GRACE, None),
    };
    let now = Instant::now();
    let deadline = now.checked_add(budget).unwrap_or(now + KILL_GRACE);
    let log_path = capture.write_log(&options.output_dir, deadline, watch)?;

    match end {
        RunEnd::Exited(status) if status.success() => {
            tracing::info!(elapsed_secs = elapsed.as_secs_f64(), "HuMo inference completed");
            Ok(RunOutcome {
                exit_code: 0,
                log_path,
                elapsed,
            })
        }
        RunEnd::Exited(status) => {
            let code = status.code().unwrap_or(1);
            tracing::error!("HuMo script exited with code {code}");
            Err(Error::Execution { code })
        }
        RunEnd::TimedOut(limit) => {
            tracing::error!("HuMo script killed after {}s", limit.as_secs());
            Err(Error::Timeout {
                secs: limit.as_secs(),
            })
        }
        RunEnd::Cancelled => {
            tracing::warn!("HuMo script cancelled");
            Err(Error::Cancelled)
        }
        RunEnd::WaitFailed(e) => {
            tracing::error!("lost track of HuMo script: {e}");
            Err(Error::Io(e))
        }
    }
}

/// Kills the child on every path except a normal exit
fn wait_for_exit(
    child: &mut Child,
    timeout: Option<Duration>,
    token: &CancellationToken,
    start: Instant,
) -> RunEnd {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return RunEnd::Exited(status),
            Ok(None) => {}
            Err(e) => {
                stop(child);
                return RunEnd::WaitFailed(e);
            }
        }

        if token.is_cancelled() {
            stop(child);
            return RunEnd::Cancelled;
        }

        if let Some(limit) = timeout {
            if start.elapsed() >= limit {
                stop(child);
                return RunEnd::TimedOut(limit);
            }
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn stop(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::debug!("kill failed: {e}");
    }
    if let Err(e) = child.wait() {
        tracing::debug!("wait after kill failed: {e}");
    }
}

/// Output chunks from the two pipes
struct Capture {
    stdout: Option<Receiver<Vec<u8>>>,
    stderr: Option<Receiver<Vec<u8>>>,
}

impl Capture {
    /// Write stdout, a newline, then stderr to `inference.log` in `dir`.
    ///
    /// Stops waiting for more output at `deadline`, or when `token` is
    /// cancelled, keeping what has arrived so far.
    fn write_log(
        self,
        dir: &Path,
        deadline: Instant,
        token: Option<&CancellationToken>,
    ) -> Result<PathBuf> {
        let (stdout, stdout_closed) = collect_output(self.stdout, deadline, token);
        let (stderr, stderr_closed) = collect_output(self.stderr, deadline, token);
        if !(stdout_closed && stderr_closed) {
            tracing::warn!("script output still open after it finished; log may be incomplete");
        }

        let log_path = dir.join(INFERENCE_LOG);
        fs::write(&log_path, format!("{stdout}\n{stderr}"))?;
        tracing::info!("inference logs written to {}", log_path.display());
        Ok(log_path)
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<Vec<u8>>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = [0u8; 8192];
            loop {
                match pipe.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => {
                        tracing::debug!("pipe read failed: {e}");
                        break;
                    }
                }
            }
        });
        rx
    })
}

/// Everything received before the pipe closed or `deadline` passed, and
/// whether the pipe closed
fn collect_output(
    rx: Option<Receiver<Vec<u8>>>,
    deadline: Instant,
    token: Option<&CancellationToken>,
) -> (String, bool) {
    let Some(rx) = rx else {
        return (String::new(), true);
    };

    let mut bytes = Vec::new();
    let closed = loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() || token.is_some_and(CancellationToken::is_cancelled) {
            bytes.extend(rx.try_iter().flatten());
            break false;
        }
        match rx.recv_timeout(remaining.min(POLL_INTERVAL)) {
            Ok(chunk) => bytes.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break true,
        }
    };

    (String::from_utf8_lossy(&bytes).into_owned(), closed)
}

/// Find the generated video.
///
/// Looks in `output_dir` first, then copies it over from
/// `<humo_dir>/outputs/` when the script left it there. Returns `None`
/// when neither exists.
pub fn locate_video(output_dir: &Path, humo_dir: &Path, filename: &str) -> Result<Option<PathBuf>> {
    let video = output_dir.join(filename);
    if video.exists() {
        return Ok(Some(video));
    }

    let fallback = humo_dir.join(HUMO_OUTPUTS_DIR).join(filename);
    if fallback.exists() {
        fs::create_dir_all(output_dir)?;
        fs::copy(&fallback, &video)?;
        tracing::info!("copied {} to {}", fallback.display(), video.display());
        return Ok(Some(video));
    }

    tracing::warn!(
        "expected video {} not found; check {}",
        filename,
        output_dir.join(INFERENCE_LOG).display()
    );
    Ok(None)
}
