//! Shared types for the queue, log, and diagnostics layers.
//!
//! These types carry no I/O handles: a [`Job`] is a description of a file as it
//! was observed during one listing, not a live reference to it.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Lifecycle stage of a job, one directory per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Queue {
    Pending,
    InProgress,
    Failed,
    Done,
}

impl Queue {
    /// All queues in display order.
    pub const ALL: [Queue; 4] = [
        Queue::Pending,
        Queue::InProgress,
        Queue::Failed,
        Queue::Done,
    ];

    /// Directory name under `inbox/`.
    pub fn as_str(self) -> &'static str {
        match self {
            Queue::Pending => "pending",
            Queue::InProgress => "in_progress",
            Queue::Failed => "failed",
            Queue::Done => "done",
        }
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Queue {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Queue::ALL
            .into_iter()
            .find(|queue| queue.as_str() == value)
            .ok_or_else(|| format!("unknown queue '{value}' (expected pending, in_progress, failed, done)"))
    }
}

/// One of the append-only logs under `logs/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogChannel {
    Worker,
    Reconcile,
    Enqueue,
    Ctl,
}

impl LogChannel {
    pub const ALL: [LogChannel; 4] = [
        LogChannel::Worker,
        LogChannel::Reconcile,
        LogChannel::Enqueue,
        LogChannel::Ctl,
    ];

    /// Channels written by the automated pipeline (everything but the control log).
    pub const PIPELINE: [LogChannel; 3] = [
        LogChannel::Worker,
        LogChannel::Reconcile,
        LogChannel::Enqueue,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LogChannel::Worker => "worker",
            LogChannel::Reconcile => "reconcile",
            LogChannel::Enqueue => "enqueue",
            LogChannel::Ctl => "ctl",
        }
    }

    /// File name inside the logs directory.
    pub fn file_name(self) -> String {
        format!("{}.log", self.as_str())
    }
}

impl fmt::Display for LogChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogChannel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        LogChannel::ALL
            .into_iter()
            .find(|channel| channel.as_str() == value)
            .ok_or_else(|| format!("unknown log '{value}' (expected worker, reconcile, enqueue, ctl)"))
    }
}

/// A job file as observed in one queue listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// File stem; the hash of the job's canonical source URL.
    pub job_id: String,
    pub queue: Queue,
    pub url: String,
    pub content_path: PathBuf,
    pub mtime: SystemTime,
}

impl Job {
    /// File name preserved across moves (`<job_id>.job`).
    pub fn file_name(&self) -> String {
        format!("{}.job", self.job_id)
    }
}

/// A well-formed structured log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub action: String,
    pub job_id: String,
    pub detail: String,
    pub raw: String,
}

/// Stable identifiers for diagnostics rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    QueueDirIsFile,
    WorkerIncomplete,
    JobMissingLog,
    LogStale,
    JobStuck,
}

impl WarningCode {
    pub fn as_str(self) -> &'static str {
        match self {
            WarningCode::QueueDirIsFile => "queue_dir_is_file",
            WarningCode::WorkerIncomplete => "worker_incomplete",
            WarningCode::JobMissingLog => "job_missing_log",
            WarningCode::LogStale => "log_stale",
            WarningCode::JobStuck => "job_stuck",
        }
    }
}

impl fmt::Display for WarningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory pipeline-health finding. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub code: WarningCode,
    pub message: String,
}

/// Number of jobs per queue at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub failed: usize,
    pub done: usize,
}

impl QueueCounts {
    pub fn get(&self, queue: Queue) -> usize {
        match queue {
            Queue::Pending => self.pending,
            Queue::InProgress => self.in_progress,
            Queue::Failed => self.failed,
            Queue::Done => self.done,
        }
    }

    pub fn set(&mut self, queue: Queue, count: usize) {
        match queue {
            Queue::Pending => self.pending = count,
            Queue::InProgress => self.in_progress = count,
            Queue::Failed => self.failed = count,
            Queue::Done => self.done = count,
        }
    }

    /// `pending=N in_progress=N failed=N done=N`
    pub fn summary(&self) -> String {
        format!(
            "pending={} in_progress={} failed={} done={}",
            self.pending, self.in_progress, self.failed, self.done
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_names_round_trip_through_from_str() {
        for queue in Queue::ALL {
            assert_eq!(queue.as_str().parse::<Queue>(), Ok(queue));
        }
        assert!("archive".parse::<Queue>().is_err());
    }

    #[test]
    fn log_channel_file_names() {
        assert_eq!(LogChannel::Worker.file_name(), "worker.log");
        assert_eq!(LogChannel::Ctl.file_name(), "ctl.log");
        assert_eq!("enqueue".parse::<LogChannel>(), Ok(LogChannel::Enqueue));
    }

    #[test]
    fn counts_summary_lists_queues_in_order() {
        let mut counts = QueueCounts::default();
        counts.set(Queue::Failed, 2);
        counts.set(Queue::Pending, 5);
        assert_eq!(counts.get(Queue::Failed), 2);
        assert_eq!(
            counts.summary(),
            "pending=5 in_progress=0 failed=2 done=0"
        );
    }
}
