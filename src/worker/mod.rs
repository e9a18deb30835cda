//! Job execution engine.
//!
//! Core components:
//! - `job`: Job, ResultRecord and Completion values
//! - `state`: How a job ended (completed, failed or cancelled)
//! - `scratch`: Per-job scratch files with guaranteed cleanup
//! - `invoker`: External tool invocation
//! - `extract`: Hit scraping from raw tool output
//! - `worker`: One job in, one completion out
//! - `dispatcher`: Bounded pool running all workers of a batch

pub mod dispatcher;
pub mod extract;
pub mod invoker;
pub mod job;
pub mod scratch;
pub mod state;
#[cfg(test)]
pub(crate) mod testing;
pub mod worker;

pub use dispatcher::{DispatchHandle, Dispatcher};
pub use extract::ResultExtractor;
pub use invoker::{CommandInvoker, ToolInvoker};
pub use job::{BatchId, Completion, Job, ResultRecord};
pub use scratch::{ScratchFiles, TempFileBroker};
pub use state::JobState;
pub use worker::{Worker, WorkerDeps};
