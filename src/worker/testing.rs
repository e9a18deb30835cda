//! Test doubles shared by the worker, dispatcher and pipeline tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ToolError;
use crate::worker::extract::ResultExtractor;
use crate::worker::invoker::ToolInvoker;
use crate::worker::job::{BatchId, Job};
use crate::worker::scratch::{ScratchFiles, TempFileBroker};
use crate::worker::worker::{Worker, WorkerDeps};

/// Tool stand-in with per-job delay, failure and panic behaviour.
#[derive(Default)]
pub(crate) struct ScriptedInvoker {
    pub hits_per_job: usize,
    pub delays: HashMap<u64, Duration>,
    pub failures: HashSet<u64>,
    pub panics: HashSet<u64>,
    /// Cancelled as soon as the given job starts.
    pub cancel_on: Option<(u64, CancellationToken)>,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub calls: Mutex<Vec<u64>>,
    pub inputs_present: Mutex<Vec<bool>>,
}

impl ScriptedInvoker {
    pub fn with_hits(hits_per_job: usize) -> Self {
        Self {
            hits_per_job,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<u64> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolInvoker for ScriptedInvoker {
    async fn run(&self, job: &Job, scratch: &ScratchFiles) -> Result<String, ToolError> {
        let seq = job.sequence;
        self.calls.lock().unwrap().push(seq);
        self.inputs_present
            .lock()
            .unwrap()
            .push(scratch.input_path().exists());
        if let Some((trigger, token)) = &self.cancel_on
            && *trigger == seq
        {
            token.cancel();
        }

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(&seq) {
            tokio::time::sleep(*delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.panics.contains(&seq) {
            panic!("scripted panic for job {seq}");
        }
        if self.failures.contains(&seq) {
            return Err(ToolError::NonZeroExit {
                code: Some(1),
                stderr: format!("scripted failure for job {seq}"),
            });
        }

        let mut raw = String::new();
        for i in 1..=self.hits_per_job {
            raw.push_str(&format!(
                "No {i}\n>hit {seq}.{i}\nProbab=99.0  E-value=1e-{i}  Sum_probs={i}.0\n\n"
            ));
        }
        std::fs::write(scratch.output_path(), &raw)?;
        Ok(raw)
    }
}

pub(crate) fn worker(scratch_dir: &Path, invoker: Arc<ScriptedInvoker>) -> Worker {
    Worker::new(WorkerDeps {
        broker: TempFileBroker::new(scratch_dir),
        invoker,
        extractor: ResultExtractor::new(),
    })
}

pub(crate) fn jobs(count: u64) -> Vec<Job> {
    let batch_id = BatchId::new();
    (1..=count)
        .map(|sequence| Job {
            sequence,
            payload: format!(">query{sequence}\nMKVLA"),
            database_paths: vec![PathBuf::from("/db/scop_hhm_db")],
            tool_path: PathBuf::from("/opt/hhsuite/bin"),
            batch_id,
        })
        .collect()
}
