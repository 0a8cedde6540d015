use tracing::info;

use crate::pipeline::RunStats;

/// Receives periodic progress while a pipeline runs.
pub trait ProgressObserver {
    fn on_progress(&mut self, stats: &RunStats);
}

impl<F> ProgressObserver for F
where
    F: FnMut(&RunStats),
{
    fn on_progress(&mut self, stats: &RunStats) {
        self(stats)
    }
}

/// Reports progress through `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&mut self, stats: &RunStats) {
        info!(
            emitted = stats.records_emitted,
            scanned = stats.records_scanned,
            bytes_read = stats.bytes_read,
            "extracted {} records",
            stats.records_emitted
        );
    }
}
