//! Batch pipeline: dispatcher → progress → ordered aggregation.

use std::io::Write;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::aggregate::{Aggregator, FailurePolicy};
use crate::error::Result;
use crate::progress::ProgressReporter;
use crate::worker::{Dispatcher, Job};

/// Per-run knobs for [`run_batch`].
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub top_n: usize,
    pub progress: bool,
    pub failure_policy: FailurePolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            top_n: 10,
            progress: true,
            failure_policy: FailurePolicy::Empty,
        }
    }
}

/// What happened to a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchSummary {
    pub jobs: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Result records written, after top-N truncation.
    pub records: usize,
    pub elapsed: Duration,
}

impl BatchSummary {
    /// Wall time divided by job count; zero for an empty batch.
    pub fn average_per_job(&self) -> Duration {
        if self.jobs == 0 {
            Duration::ZERO
        } else {
            self.elapsed.div_f64(self.jobs as f64)
        }
    }
}

/// Run every job and write one block per job to `sink`, in input order.
///
/// Returns the sink so the caller can finish it. Only output errors abort;
/// job failures are written like any other block.
pub async fn run_batch<W: Write>(
    dispatcher: &Dispatcher,
    jobs: Vec<Job>,
    sink: W,
    options: &BatchOptions,
    cancel: CancellationToken,
) -> Result<(BatchSummary, W)> {
    let reporter = ProgressReporter::new(jobs.len(), options.progress);
    run_batch_with_progress(dispatcher, jobs, sink, options, &reporter, cancel).await
}

/// [`run_batch`] with a caller-supplied progress reporter.
pub async fn run_batch_with_progress<W: Write>(
    dispatcher: &Dispatcher,
    jobs: Vec<Job>,
    sink: W,
    options: &BatchOptions,
    reporter: &ProgressReporter,
    cancel: CancellationToken,
) -> Result<(BatchSummary, W)> {
    let start = Instant::now();
    let mut aggregator = Aggregator::new(sink, options.top_n, options.failure_policy);
    let mut handle = dispatcher.run(jobs, cancel.clone());
    let total = handle.total();

    while let Some(completion) = handle.recv().await {
        reporter.on_completion(&completion);
        if let Err(e) = aggregator.push(completion) {
            tracing::error!(error = %e, "Writing results failed, stopping batch");
            cancel.cancel();
            handle.join().await;
            return Err(e.into());
        }
    }
    handle.join().await;
    reporter.finish();

    let (written, sink) = aggregator.finish()?;
    let summary = BatchSummary {
        jobs: total,
        failed: written.failed,
        cancelled: written.cancelled,
        records: written.records,
        elapsed: start.elapsed(),
    };
    tracing::info!(
        jobs = summary.jobs,
        failed = summary.failed,
        cancelled = summary.cancelled,
        records = summary.records,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "Batch finished"
    );
    Ok((summary, sink))
}
