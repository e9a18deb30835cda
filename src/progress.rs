//! Batch progress: completion counters and the status-line progress bar.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::worker::Completion;

/// Width of the rendered bar in cells.
const BAR_WIDTH: usize = 50;

/// Completion counters for one batch.
///
/// Written only by the loop draining the dispatcher; anyone may read.
#[derive(Debug)]
pub struct ProgressState {
    total: usize,
    completed: AtomicUsize,
}

impl ProgressState {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
        }
    }

    /// Count one completion. Returns the new completed count.
    pub fn record_completion(&self) -> usize {
        self.completed.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Completed share of the batch; an empty batch counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed() as f64 / self.total as f64
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed() >= self.total
    }
}

/// Renders `[=====     ]  50%` on stderr, redrawn in place.
///
/// When disabled no bar exists and a completion only bumps the counter.
pub struct ProgressReporter {
    state: Arc<ProgressState>,
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    pub fn new(total: usize, enabled: bool) -> Self {
        if enabled {
            Self::with_target(total, ProgressDrawTarget::stderr())
        } else {
            Self {
                state: Arc::new(ProgressState::new(total)),
                bar: None,
            }
        }
    }

    /// Render to a specific draw target.
    pub fn with_target(total: usize, target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total as u64), target);
        match ProgressStyle::with_template(&format!("[{{bar:{BAR_WIDTH}}}] {{percent:>2}}%")) {
            Ok(style) => bar.set_style(style.progress_chars("= ")),
            Err(e) => tracing::debug!(error = %e, "Falling back to default progress style"),
        }
        Self {
            state: Arc::new(ProgressState::new(total)),
            bar: Some(bar),
        }
    }

    pub fn state(&self) -> Arc<ProgressState> {
        Arc::clone(&self.state)
    }

    pub fn is_enabled(&self) -> bool {
        self.bar.is_some()
    }

    pub fn on_completion(&self, completion: &Completion) {
        let done = self.state.record_completion();
        tracing::trace!(
            job = completion.sequence(),
            state = %completion.state(),
            done,
            total = self.state.total(),
            "Progress"
        );
        if let Some(bar) = &self.bar {
            bar.set_position(done as u64);
        }
    }

    /// Draw the final 100% state. indicatif throttles intermediate draws,
    /// this one is always rendered.
    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.set_position(self.state.total() as u64);
            bar.finish();
        }
    }

    /// Current bar position, if a bar is shown.
    pub fn position(&self) -> Option<u64> {
        self.bar.as_ref().map(|b| b.position())
    }
}
