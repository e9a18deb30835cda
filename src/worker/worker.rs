//! Per-job worker execution.

use std::sync::Arc;
use std::time::Instant;

use crate::error::JobError;
use crate::worker::extract::ResultExtractor;
use crate::worker::invoker::ToolInvoker;
use crate::worker::job::{Completion, Job, ResultRecord};
use crate::worker::scratch::TempFileBroker;

/// Shared dependencies for worker execution.
#[derive(Clone)]
pub struct WorkerDeps {
    pub broker: TempFileBroker,
    pub invoker: Arc<dyn ToolInvoker>,
    pub extractor: ResultExtractor,
}

/// Turns one [`Job`] into one [`Completion`].
///
/// Cheap to clone; every dispatcher task holds its own copy.
#[derive(Clone)]
pub struct Worker {
    deps: WorkerDeps,
}

impl Worker {
    pub fn new(deps: WorkerDeps) -> Self {
        Self { deps }
    }

    /// Acquire scratch files, run the tool, scrape its output and release the
    /// scratch files again. Never fails: errors end up in the completion.
    pub async fn process(&self, job: Arc<Job>) -> Completion {
        let start = Instant::now();
        tracing::trace!(job = job.sequence, "Job started");

        let completion = match self.run(&job).await {
            Ok(results) => {
                tracing::debug!(
                    job = job.sequence,
                    hits = results.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Job finished"
                );
                Completion::success(job, results)
            }
            Err(e) => {
                tracing::warn!(job = job.sequence, error = %e, "Job failed");
                Completion::failure(job, e)
            }
        };
        tracing::trace!(job = completion.sequence(), state = %completion.state(), "Job state");
        completion
    }

    async fn run(&self, job: &Job) -> Result<Vec<ResultRecord>, JobError> {
        let scratch = self.deps.broker.acquire(job).await?;
        let output = self.deps.invoker.run(job, &scratch).await;
        self.deps.broker.release(scratch);

        Ok(self.deps.extractor.extract(&output?))
    }
}
