//! Gathers the filesystem observations the diagnostics rules run over.

use std::time::SystemTime;

use tracing::debug;

use crate::core::diagnostics::{
    COVERAGE_WINDOW, LIFECYCLE_WINDOW, LogAge, Snapshot, Thresholds, evaluate,
};
use crate::core::types::{LogChannel, Queue, Warning};
use crate::io::job_store::JobStore;
use crate::io::log_reader::{entries, modified_at};
use crate::io::paths::PipelinePaths;

pub fn collect_snapshot<S: JobStore + ?Sized>(
    store: &S,
    paths: &PipelinePaths,
    now: SystemTime,
) -> Snapshot {
    let worker_log = paths.log_path(LogChannel::Worker);
    Snapshot {
        now,
        queue_files: Queue::ALL
            .into_iter()
            .filter(|queue| store.queue_is_file(*queue))
            .map(|queue| (queue, paths.queue_dir(queue)))
            .collect(),
        lifecycle_entries: entries(&worker_log, LIFECYCLE_WINDOW),
        coverage_entries: entries(&worker_log, COVERAGE_WINDOW),
        pending: store.list(Queue::Pending),
        in_progress: store.list(Queue::InProgress),
        log_ages: LogChannel::PIPELINE
            .into_iter()
            .map(|channel| {
                let path = paths.log_path(channel);
                LogAge {
                    channel,
                    modified: modified_at(&path),
                    path,
                }
            })
            .collect(),
    }
}

/// Evaluate every diagnostics rule against the current filesystem state.
pub fn current_warnings<S: JobStore + ?Sized>(
    store: &S,
    paths: &PipelinePaths,
    thresholds: &Thresholds,
) -> Vec<Warning> {
    let snapshot = collect_snapshot(store, paths, SystemTime::now());
    let warnings = evaluate(&snapshot, thresholds);
    debug!(count = warnings.len(), "diagnostics evaluated");
    warnings
}
