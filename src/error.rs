//! Error types for hhrun.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type. Only these abort a run; per-job failures are
/// carried inside a [`Completion`](crate::worker::Completion) instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),
}

/// Configuration-related errors. Always reported before any job is submitted.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("No databases matching {pattern} found. At least one database needs to be available")]
    NoDatabases { pattern: String },

    #[error("Invalid glob pattern {pattern}: {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("Could not resolve path {path}: {reason}")]
    Path { path: PathBuf, reason: String },
}

/// Errors reading the FASTA input stream.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Failed to open input {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read archive {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("Malformed FASTA at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of a single external tool invocation.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Failed to spawn {program}: {reason}")]
    Spawn { program: PathBuf, reason: String },

    #[error("Tool exited with status {}: {stderr}", code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("Tool output {path} missing or unreadable: {reason}")]
    MissingOutput { path: PathBuf, reason: String },

    #[error("Tool timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Job-level errors. Isolated to the job they belong to.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Scratch file {path} could not be created: {source}")]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Job cancelled before it started")]
    Cancelled,

    #[error("Worker panicked: {0}")]
    Panicked(String),
}

/// Result type alias for hhrun.
pub type Result<T> = std::result::Result<T, Error>;
