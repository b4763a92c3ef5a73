//! JSON status reports for scripts and external dashboards.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::collection::{CollectionItem, CollectionRow, correlate};
use crate::core::types::{LogChannel, Queue, QueueCounts};
use crate::io::job_store::{JobStore, locate_all};
use crate::io::log_reader::tail;
use crate::io::paths::PipelinePaths;

pub const DEFAULT_LOG_LINES: usize = 20;

pub fn queue_counts<S: JobStore + ?Sized>(store: &S) -> QueueCounts {
    let mut counts = QueueCounts::default();
    for queue in Queue::ALL {
        counts.set(queue, store.list(queue).len());
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentJob {
    pub job_id: String,
    pub file_name: String,
    pub url: String,
    pub content: String,
    /// Seconds since the Unix epoch.
    pub mtime: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub counts: QueueCounts,
    /// First job in `in_progress`, if any.
    pub current_job: Option<CurrentJob>,
}

pub fn queue_status<S: JobStore + ?Sized>(store: &S) -> QueueStatus {
    let current_job = store.list(Queue::InProgress).into_iter().next().map(|job| CurrentJob {
        file_name: job.file_name(),
        content: store.read_contents(&job).trim().to_string(),
        mtime: job
            .mtime
            .duration_since(UNIX_EPOCH)
            .map_or(0, |age| age.as_secs()),
        url: job.url,
        job_id: job.job_id,
    });
    QueueStatus {
        counts: queue_counts(store),
        current_job,
    }
}

/// Last `lines` raw lines of every log that exists, keyed by file name.
pub fn logs_status(paths: &PipelinePaths, lines: usize) -> BTreeMap<String, Vec<String>> {
    LogChannel::ALL
        .into_iter()
        .filter_map(|channel| {
            let path = paths.log_path(channel);
            path.exists()
                .then(|| (channel.file_name(), tail(&path, lines)))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionState {
    Ok,
    MissingFile,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionStatus {
    pub status: CollectionState,
    pub items: Vec<CollectionRow>,
}

/// Correlate the purchase list at `path` with the queues.
///
/// A missing or unparseable list is reported in `status`, not as an error.
pub fn collection_status<S: JobStore + ?Sized>(store: &S, path: &Path) -> CollectionStatus {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            debug!(path = %path.display(), err = %err, "collection file unreadable");
            let status = if path.exists() {
                CollectionState::Error
            } else {
                CollectionState::MissingFile
            };
            return CollectionStatus {
                status,
                items: Vec::new(),
            };
        }
    };
    let items: Vec<CollectionItem> = match serde_json::from_str(&contents) {
        Ok(items) => items,
        Err(err) => {
            warn!(path = %path.display(), err = %err, "collection file is not a JSON list");
            return CollectionStatus {
                status: CollectionState::Error,
                items: Vec::new(),
            };
        }
    };
    let locations: HashMap<String, Queue> = locate_all(store).into_iter().collect();
    CollectionStatus {
        status: CollectionState::Ok,
        items: correlate(&items, &locations),
    }
}
