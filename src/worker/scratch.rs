//! Per-job scratch files used to hand input to the tool and read its output back.
//!
//! File names are derived from `(batch_id, sequence)`, so no two workers of a
//! run, and no two concurrent runs sharing a directory, ever touch the same file.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::JobError;
use crate::worker::job::Job;

/// Creates and destroys [`ScratchFiles`] inside one directory.
#[derive(Debug, Clone)]
pub struct TempFileBroker {
    dir: PathBuf,
}

impl TempFileBroker {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Input and output paths for a job.
    pub fn paths_for(&self, job: &Job) -> (PathBuf, PathBuf) {
        let stem = format!("job_{}_{}", job.batch_id, job.sequence);
        (
            self.dir.join(format!("{stem}.in")),
            self.dir.join(format!("{stem}.out")),
        )
    }

    /// Write the job payload into a fresh input file and reserve the output path.
    ///
    /// The output file is not created here; the tool writes it.
    pub async fn acquire(&self, job: &Job) -> Result<ScratchFiles, JobError> {
        let (input_path, output_path) = self.paths_for(job);
        let scratch = ScratchFiles {
            input_path,
            output_path,
            released: false,
        };

        if let Err(source) = tokio::fs::write(&scratch.input_path, job.payload.as_bytes()).await {
            // Dropping `scratch` removes anything half-written.
            return Err(JobError::Scratch {
                path: scratch.input_path.clone(),
                source,
            });
        }

        tracing::trace!(job = job.sequence, path = %scratch.input_path.display(), "Scratch input written");
        Ok(scratch)
    }

    /// Delete both files of a job. Never fails; problems are logged.
    pub fn release(&self, scratch: ScratchFiles) {
        scratch.release();
    }
}

/// Input/output file pair owned by exactly one worker for one job.
///
/// Files are removed on [`release`](Self::release) or, failing that, on drop,
/// so an unwinding worker does not leak them either.
#[derive(Debug)]
pub struct ScratchFiles {
    input_path: PathBuf,
    output_path: PathBuf,
    released: bool,
}

impl ScratchFiles {
    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn release(mut self) {
        self.remove_files();
    }

    fn remove_files(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        for path in [&self.input_path, &self.output_path] {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove scratch file");
                }
            }
        }
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        self.remove_files();
    }
}
