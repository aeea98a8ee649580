//! External run controls: cancellation and progress reporting.

use crate::pipeline::report::RunSummary;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared with the caller.
///
/// Checked before every row dispatch and at the join point. Work already
/// dispatched finishes; nothing new starts.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Advisory progress callbacks. Never affects processing.
#[cfg_attr(test, mockall::automock)]
pub trait ProgressListener: Send + Sync {
    /// Called from the coordinating thread every `progress_interval` rows.
    fn on_progress(&self, rows_dispatched: u64);

    /// Called once after the run, successful or not.
    fn on_finished(&self, _summary: &RunSummary) {}
}

/// Listener that ignores every callback.
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressListener for NoProgress {
    fn on_progress(&self, _rows_dispatched: u64) {}
}

/// Listener that logs progress through `tracing`.
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressListener for LogProgress {
    fn on_progress(&self, rows_dispatched: u64) {
        tracing::info!("Processed {} rows", rows_dispatched);
    }

    fn on_finished(&self, summary: &RunSummary) {
        tracing::info!(
            "Run finished: {} rows in {}ms, {} errors{}",
            summary.rows_read,
            summary.elapsed().num_milliseconds(),
            summary.total_errors(),
            if summary.cancelled { " (cancelled)" } else { "" }
        );
    }
}
