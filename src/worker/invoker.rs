//! External tool invocation.
//!
//! Runs the tool as a child process with an explicit argument vector (no shell):
//! - stdin and stdout go to the null device (hhsearch chatters on stdout)
//! - stderr is captured and truncated for error reports
//! - the designated output file is the only data channel read back
//! - optional timeout, after which the child is killed

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::error::ToolError;
use crate::worker::job::Job;
use crate::worker::scratch::ScratchFiles;

/// Maximum stderr kept for an error message (4KB).
const MAX_STDERR_SIZE: usize = 4 * 1024;

/// Default executable name inside the tool directory.
pub const DEFAULT_EXECUTABLE: &str = "hhsearch";

/// Runs the external tool for one job and returns its raw output.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// One attempt, no retry. The tool reads `scratch.input_path()` and
    /// writes `scratch.output_path()`.
    async fn run(&self, job: &Job, scratch: &ScratchFiles) -> Result<String, ToolError>;
}

/// Invokes `<tool_path>/<executable> -i <input> -d <databases> -o <output>`.
#[derive(Debug, Clone)]
pub struct CommandInvoker {
    executable: String,
    timeout: Option<Duration>,
}

impl CommandInvoker {
    pub fn new() -> Self {
        Self {
            executable: DEFAULT_EXECUTABLE.to_string(),
            timeout: None,
        }
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full path of the program to run for a job.
    pub fn program(&self, job: &Job) -> PathBuf {
        job.tool_path.join(&self.executable)
    }

    /// Argument vector passed to the program.
    pub fn args(job: &Job, scratch: &ScratchFiles) -> Vec<OsString> {
        vec![
            "-i".into(),
            scratch.input_path().into(),
            "-d".into(),
            database_argument(&job.database_paths),
            "-o".into(),
            scratch.output_path().into(),
        ]
    }
}

impl Default for CommandInvoker {
    fn default() -> Self {
        Self::new()
    }
}

/// hhsearch takes several databases as one space-separated argument.
pub fn database_argument(paths: &[PathBuf]) -> OsString {
    let mut arg = OsString::new();
    for (i, path) in paths.iter().enumerate() {
        if i > 0 {
            arg.push(" ");
        }
        arg.push(path.as_os_str());
    }
    arg
}

#[async_trait]
impl ToolInvoker for CommandInvoker {
    async fn run(&self, job: &Job, scratch: &ScratchFiles) -> Result<String, ToolError> {
        let program = self.program(job);

        let mut command = Command::new(&program);
        command
            .args(Self::args(job, scratch))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| ToolError::Spawn {
            program: program.clone(),
            reason: e.to_string(),
        })?;
        let stderr_pipe = child.stderr.take();

        let wait = async {
            let mut stderr = Vec::new();
            if let Some(mut err) = stderr_pipe {
                err.read_to_end(&mut stderr).await?;
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, stderr))
        };

        let (status, stderr) = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(result) => result?,
                Err(_) => {
                    let _ = child.kill().await;
                    return Err(ToolError::Timeout(limit));
                }
            },
            None => wait.await?,
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(ToolError::NonZeroExit {
                code: status.code(),
                stderr: truncate_stderr(stderr.trim()),
            });
        }

        read_output(scratch.output_path()).await
    }
}

async fn read_output(path: &Path) -> Result<String, ToolError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ToolError::MissingOutput {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Keep the tail of stderr, where tools usually put the actual error (UTF-8 safe).
fn truncate_stderr(s: &str) -> String {
    if s.len() <= MAX_STDERR_SIZE {
        s.to_string()
    } else {
        let start = ceil_char_boundary(s, s.len() - MAX_STDERR_SIZE);
        format!("[truncated {} bytes] ...{}", start, &s[start..])
    }
}

/// Find the smallest byte index >= `i` that is a valid char boundary.
fn ceil_char_boundary(s: &str, i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    let mut pos = i;
    while pos < s.len() && !s.is_char_boundary(pos) {
        pos += 1;
    }
    pos
}
