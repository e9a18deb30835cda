//! Bounded worker pool.
//!
//! A fixed number of long-lived tasks pull jobs from one shared FIFO queue and
//! report every finished job over a single completion channel. Admission order
//! is submission order; completion order is whatever the tool makes it.
//!
//! Cancellation stops admission. Jobs already running finish normally, and
//! every job still queued is reported as [`JobError::Cancelled`], so the
//! stream always carries exactly one completion per submitted job.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::error::{ConfigError, JobError};
use crate::worker::job::{Completion, Job};
use crate::worker::worker::Worker;

type JobQueue = Arc<Mutex<VecDeque<Arc<Job>>>>;

/// Runs a batch of jobs on at most `concurrency` workers at a time.
pub struct Dispatcher {
    worker: Worker,
    concurrency: usize,
}

impl Dispatcher {
    /// Rejects `concurrency < 1` before anything is submitted.
    pub fn new(worker: Worker, concurrency: usize) -> Result<Self, ConfigError> {
        if concurrency < 1 {
            return Err(ConfigError::InvalidValue {
                key: "processes".to_string(),
                message: format!("has to be > 0, got {concurrency}"),
            });
        }
        Ok(Self {
            worker,
            concurrency,
        })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Submit all jobs and start the pool. Must be called inside a tokio runtime.
    pub fn run(&self, jobs: Vec<Job>, cancel: CancellationToken) -> DispatchHandle {
        let total = jobs.len();
        let queue: JobQueue = Arc::new(Mutex::new(jobs.into_iter().map(Arc::new).collect()));
        let pool_size = self.concurrency.min(total);
        let (tx, rx) = mpsc::channel(pool_size.max(1).saturating_mul(2));
        tracing::debug!(jobs = total, workers = pool_size, "Starting dispatch");

        let mut pool = JoinSet::new();
        for slot in 0..pool_size {
            pool.spawn(worker_loop(
                slot,
                self.worker.clone(),
                Arc::clone(&queue),
                tx.clone(),
                cancel.clone(),
            ));
        }

        let supervisor = tokio::spawn(async move {
            while let Some(res) = pool.join_next().await {
                if let Err(e) = res {
                    tracing::error!(error = %e, "Dispatcher worker task ended abnormally");
                }
            }

            let leftover: Vec<Arc<Job>> = queue.lock().await.drain(..).collect();
            if !leftover.is_empty() {
                tracing::info!(count = leftover.len(), "Reporting jobs not started as cancelled");
            }
            for job in leftover {
                if tx.send(Completion::failure(job, JobError::Cancelled)).await.is_err() {
                    break;
                }
            }
        });

        DispatchHandle {
            total,
            rx,
            supervisor,
        }
    }
}

/// Receiving end of a running dispatch.
pub struct DispatchHandle {
    total: usize,
    rx: mpsc::Receiver<Completion>,
    supervisor: JoinHandle<()>,
}

impl DispatchHandle {
    /// Number of jobs submitted, and therefore of completions to expect.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Next completion, in the order jobs finish. `None` once every job has
    /// been reported.
    pub async fn recv(&mut self) -> Option<Completion> {
        self.rx.recv().await
    }

    /// Wait for the pool to shut down.
    pub async fn join(self) {
        drop(self.rx);
        if let Err(e) = self.supervisor.await {
            tracing::error!(error = %e, "Dispatcher supervisor ended abnormally");
        }
    }
}

async fn worker_loop(
    slot: usize,
    worker: Worker,
    queue: JobQueue,
    tx: mpsc::Sender<Completion>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            tracing::debug!(slot, "Worker stopping: batch cancelled");
            break;
        }

        let next = queue.lock().await.pop_front();
        let Some(job) = next else {
            break;
        };

        tracing::debug!(slot, job = job.sequence, "Job started");
        let completion = process_isolated(&worker, job).await;
        if tx.send(completion).await.is_err() {
            tracing::debug!(slot, "Completion receiver dropped, stopping worker");
            break;
        }
    }
}

/// Runs one job on its own task so a panic costs that job only.
async fn process_isolated(worker: &Worker, job: Arc<Job>) -> Completion {
    let task_worker = worker.clone();
    let task_job = Arc::clone(&job);

    match tokio::spawn(async move { task_worker.process(task_job).await }).await {
        Ok(completion) => completion,
        Err(e) => {
            let reason = if e.is_panic() {
                panic_message(e.into_panic())
            } else {
                e.to_string()
            };
            tracing::error!(job = job.sequence, %reason, "Worker panicked");
            Completion::failure(job, JobError::Panicked(reason))
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
