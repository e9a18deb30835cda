//! Job, result and completion types.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::JobError;
use crate::worker::state::JobState;

/// Identifier shared by every job of one program run.
///
/// Keeps scratch file names of concurrent runs in the same directory apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// One unit of work: a single input record plus everything needed to run
/// the tool on it. Immutable once built.
#[derive(Debug, Clone)]
pub struct Job {
    /// Ordinal position in the input, starting at 1.
    pub sequence: u64,
    /// Text handed to the tool, also used as the output block header.
    pub payload: String,
    /// Resolved database files. Never empty.
    pub database_paths: Vec<PathBuf>,
    /// Directory holding the tool executable.
    pub tool_path: PathBuf,
    pub batch_id: BatchId,
}

/// One hit scraped from the tool output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub label: String,
    pub body: String,
}

impl ResultRecord {
    pub fn new(label: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            body: body.into(),
        }
    }
}

/// Terminal outcome of one job. Exactly one is produced per submitted job.
#[derive(Debug)]
pub struct Completion {
    pub job: Arc<Job>,
    pub results: Vec<ResultRecord>,
    pub error: Option<JobError>,
}

impl Completion {
    pub fn success(job: Arc<Job>, results: Vec<ResultRecord>) -> Self {
        Self {
            job,
            results,
            error: None,
        }
    }

    pub fn failure(job: Arc<Job>, error: JobError) -> Self {
        Self {
            job,
            results: Vec::new(),
            error: Some(error),
        }
    }

    pub fn sequence(&self) -> u64 {
        self.job.sequence
    }

    pub fn state(&self) -> JobState {
        match &self.error {
            None => JobState::Completed,
            Some(JobError::Cancelled) => JobState::Cancelled,
            Some(_) => JobState::Failed,
        }
    }
}
