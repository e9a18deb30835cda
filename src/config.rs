//! Run configuration, resolved from the command line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::aggregate::FailurePolicy;
use crate::cli::Cli;
use crate::error::ConfigError;
use crate::worker::invoker::{CommandInvoker, DEFAULT_EXECUTABLE};

/// Suffix every database file name must carry.
pub const DATABASE_SUFFIX: &str = "_hhm_db";

/// Everything a batch run needs, with paths expanded and validated.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory holding the executable.
    pub tool_dir: PathBuf,
    pub executable: String,
    pub database_dir: PathBuf,
    /// Database files found in `database_dir`, sorted. Never empty once resolved.
    pub databases: Vec<PathBuf>,
    /// Maximum number of concurrent tool processes.
    pub concurrency: usize,
    /// Hits kept per job.
    pub top_n: usize,
    pub progress: bool,
    pub timing: bool,
    /// Where per-job scratch files are created.
    pub scratch_dir: PathBuf,
    pub timeout: Option<Duration>,
    pub failure_policy: FailurePolicy,
}

impl RunConfig {
    /// Defaults around an already known tool directory and database list.
    pub fn for_databases(tool_dir: PathBuf, databases: Vec<PathBuf>) -> Self {
        let database_dir = databases
            .first()
            .and_then(|p| p.parent())
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            tool_dir,
            executable: DEFAULT_EXECUTABLE.to_string(),
            database_dir,
            databases,
            concurrency: 1,
            top_n: 10,
            progress: true,
            timing: false,
            scratch_dir: PathBuf::from("."),
            timeout: None,
            failure_policy: FailurePolicy::Empty,
        }
    }

    /// Validate the command line and locate the databases.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        if cli.processes < 1 {
            return Err(ConfigError::InvalidValue {
                key: "processes".to_string(),
                message: format!("has to be > 0, got {}", cli.processes),
            });
        }
        if cli.executable.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "executable".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        let timeout = match cli.timeout {
            Some(0) => {
                return Err(ConfigError::InvalidValue {
                    key: "timeout".to_string(),
                    message: "has to be > 0 seconds".to_string(),
                });
            }
            other => other.map(Duration::from_secs),
        };

        let tool_dir = absolute(&expand_home(&cli.hh))?;
        let database_dir = absolute(&expand_home(&cli.db))?;
        let databases = find_databases(&database_dir)?;

        let scratch_dir = match &cli.tmp_dir {
            Some(dir) => absolute(&expand_home(dir))?,
            None => current_dir()?,
        };
        if !scratch_dir.is_dir() {
            return Err(ConfigError::Path {
                path: scratch_dir,
                reason: "scratch directory does not exist".to_string(),
            });
        }

        let program = tool_dir.join(&cli.executable);
        if !program.is_file() {
            tracing::warn!(program = %program.display(), "Executable not found; every job will fail");
        }

        tracing::debug!(
            tool_dir = %tool_dir.display(),
            databases = databases.len(),
            scratch_dir = %scratch_dir.display(),
            "Configuration resolved"
        );

        Ok(Self {
            executable: cli.executable.trim().to_string(),
            database_dir,
            concurrency: cli.processes,
            top_n: cli.number,
            progress: !cli.noprogress,
            timing: cli.time,
            scratch_dir,
            timeout,
            failure_policy: cli.on_error,
            ..Self::for_databases(tool_dir, databases)
        })
    }

    /// Production invoker for this configuration.
    pub fn command_invoker(&self) -> CommandInvoker {
        CommandInvoker::new()
            .with_executable(self.executable.clone())
            .with_timeout(self.timeout)
    }
}

/// Replace a leading `~` with the home directory and trim surrounding
/// whitespace. Other paths are returned unchanged.
pub fn expand_home(path: &Path) -> PathBuf {
    let Some(text) = path.to_str() else {
        return path.to_path_buf();
    };
    let text = text.trim();
    let rest = match text.strip_prefix('~') {
        Some("") => "",
        Some(rest) => match rest.strip_prefix('/') {
            Some(rest) => rest,
            None => return PathBuf::from(text),
        },
        None => return PathBuf::from(text),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(text),
    }
}

fn current_dir() -> Result<PathBuf, ConfigError> {
    std::env::current_dir().map_err(|e| ConfigError::Path {
        path: PathBuf::from("."),
        reason: e.to_string(),
    })
}

fn absolute(path: &Path) -> Result<PathBuf, ConfigError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(current_dir()?.join(path))
    }
}

/// All `*_hhm_db` files directly inside `dir`, sorted.
///
/// The paths are later joined by spaces into one tool argument, so a path
/// containing whitespace is rejected.
pub fn find_databases(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let dir_text = dir.to_str().ok_or_else(|| ConfigError::Path {
        path: dir.to_path_buf(),
        reason: "not valid UTF-8".to_string(),
    })?;
    let pattern = format!("{}/*{DATABASE_SUFFIX}", glob::Pattern::escape(dir_text));

    let entries = glob::glob(&pattern).map_err(|e| ConfigError::Pattern {
        pattern: pattern.clone(),
        reason: e.to_string(),
    })?;

    let mut databases = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => databases.push(path),
            Err(e) => tracing::warn!(error = %e, "Skipping unreadable database entry"),
        }
    }
    databases.sort();

    if databases.is_empty() {
        return Err(ConfigError::NoDatabases { pattern });
    }
    if let Some(bad) = databases
        .iter()
        .find(|p| p.to_string_lossy().chars().any(char::is_whitespace))
    {
        return Err(ConfigError::InvalidValue {
            key: "db".to_string(),
            message: format!("database path '{}' contains whitespace", bad.display()),
        });
    }
    Ok(databases)
}
