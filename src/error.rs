//! Error types for humo-runner

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported mode/variant combination: ({mode}, {variant})")]
    UnsupportedCombination { mode: String, variant: String },

    #[error("Missing dependency: {}", .0.display())]
    MissingDependency(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("External script exited with code {code}")]
    Execution { code: i32 },

    #[error("External script timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Download error: {0}")]
    Download(String),
}

impl Error {
    /// Process exit code reported by the CLI for this error.
    ///
    /// Execution failures mirror the external script's code; timeouts and
    /// cancellation follow the shell conventions of `timeout(1)` and SIGINT.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Execution { code } if *code != 0 => *code,
            Error::Timeout { .. } => 124,
            Error::Cancelled => 130,
            _ => 1,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
