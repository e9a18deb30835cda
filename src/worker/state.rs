//! Job outcome.

/// How a job ended. Every [`Completion`](crate::worker::Completion) is in
/// exactly one of these states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    /// Tool ran and its output was scraped.
    Completed,
    /// Scratch files, the tool or the worker itself failed.
    Failed,
    /// Job was never started because the batch was cancelled.
    Cancelled,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}
