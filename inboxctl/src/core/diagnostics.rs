//! Pipeline-health rules evaluated over a point-in-time snapshot.
//!
//! [`evaluate`] is pure: the I/O layer assembles a [`Snapshot`] (see
//! `io::snapshot`) and this module turns it into warnings. Rules run in a fixed
//! order and their outputs are concatenated without deduplication.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use crate::core::log_line::NO_JOB;
use crate::core::types::{Job, LogChannel, LogEntry, Queue, Warning, WarningCode};

/// Raw worker-log lines inspected for the start/end pairing rule.
pub const LIFECYCLE_WINDOW: usize = 200;
/// Raw worker-log lines inspected for per-job coverage.
pub const COVERAGE_WINDOW: usize = 500;

pub const WORKER_START: &str = "worker_start";
pub const WORKER_END: &str = "worker_end";

/// Age limits for the time-based rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub log_stale: Duration,
    pub job_stuck: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            log_stale: Duration::from_secs(3600),
            job_stuck: Duration::from_secs(30 * 60),
        }
    }
}

/// Last-modified time of one pipeline log; `None` when the file is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogAge {
    pub channel: LogChannel,
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
}

/// Everything the rules need, captured once per evaluation.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub now: SystemTime,
    /// Queue paths that exist but are not directories.
    pub queue_files: Vec<(Queue, PathBuf)>,
    /// Worker entries parsed from the last [`LIFECYCLE_WINDOW`] raw lines.
    pub lifecycle_entries: Vec<LogEntry>,
    /// Worker entries parsed from the last [`COVERAGE_WINDOW`] raw lines.
    pub coverage_entries: Vec<LogEntry>,
    pub pending: Vec<Job>,
    pub in_progress: Vec<Job>,
    pub log_ages: Vec<LogAge>,
}

/// Run every rule in order and concatenate the findings.
pub fn evaluate(snapshot: &Snapshot, thresholds: &Thresholds) -> Vec<Warning> {
    let mut warnings = Vec::new();
    warnings.extend(queue_dir_warnings(snapshot));
    warnings.extend(worker_lifecycle_warnings(&snapshot.lifecycle_entries));
    warnings.extend(job_log_coverage_warnings(snapshot));
    warnings.extend(stale_log_warnings(snapshot, thresholds.log_stale));
    warnings.extend(stuck_job_warnings(snapshot, thresholds.job_stuck));
    warnings
}

fn queue_dir_warnings(snapshot: &Snapshot) -> Vec<Warning> {
    snapshot
        .queue_files
        .iter()
        .map(|(queue, path)| Warning {
            code: WarningCode::QueueDirIsFile,
            message: format!("{queue} queue is a file: {}", path.display()),
        })
        .collect()
}

/// Fires when the last `worker_start` has no `worker_end` at or after it.
pub fn worker_lifecycle_warnings(entries: &[LogEntry]) -> Vec<Warning> {
    let last_start = entries.iter().rev().find(|e| e.action == WORKER_START);
    let last_end = entries.iter().rev().find(|e| e.action == WORKER_END);

    let Some(start) = last_start else {
        return Vec::new();
    };
    let matched = last_end.is_some_and(|end| end.timestamp >= start.timestamp);
    if matched {
        return Vec::new();
    }
    vec![Warning {
        code: WarningCode::WorkerIncomplete,
        message: format!(
            "last worker_start at {} has no matching worker_end",
            start.timestamp
        ),
    }]
}

fn job_log_coverage_warnings(snapshot: &Snapshot) -> Vec<Warning> {
    let seen: HashSet<&str> = snapshot
        .coverage_entries
        .iter()
        .map(|e| e.job_id.as_str())
        .filter(|id| !id.is_empty() && *id != NO_JOB)
        .collect();

    snapshot
        .pending
        .iter()
        .chain(&snapshot.in_progress)
        .filter(|job| !seen.contains(job.job_id.as_str()))
        .map(|job| Warning {
            code: WarningCode::JobMissingLog,
            message: format!(
                "job {} in {} has no worker log entries",
                job.job_id, job.queue
            ),
        })
        .collect()
}

fn stale_log_warnings(snapshot: &Snapshot, max_age: Duration) -> Vec<Warning> {
    snapshot
        .log_ages
        .iter()
        .filter(|log| {
            log.modified
                .is_some_and(|modified| older_than(snapshot.now, modified, max_age))
        })
        .map(|log| Warning {
            code: WarningCode::LogStale,
            message: format!(
                "{} log is stale (>{}s): {}",
                log.channel,
                max_age.as_secs(),
                log.path.display()
            ),
        })
        .collect()
}

fn stuck_job_warnings(snapshot: &Snapshot, max_age: Duration) -> Vec<Warning> {
    snapshot
        .in_progress
        .iter()
        .filter(|job| older_than(snapshot.now, job.mtime, max_age))
        .map(|job| Warning {
            code: WarningCode::JobStuck,
            message: format!(
                "job {} in in_progress for >{}s",
                job.job_id,
                max_age.as_secs()
            ),
        })
        .collect()
}

/// Strictly older; an mtime in the future is never old.
fn older_than(now: SystemTime, then: SystemTime, max_age: Duration) -> bool {
    now.duration_since(then)
        .is_ok_and(|age| age > max_age)
}
