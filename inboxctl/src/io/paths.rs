//! Canonical on-disk layout of a pipeline base directory.

use std::path::{Path, PathBuf};

use crate::core::types::{LogChannel, Queue};

/// All canonical paths under `<base>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePaths {
    pub base: PathBuf,
    pub inbox_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub config_path: PathBuf,
    /// Developer tracing output while the interactive UI owns the terminal.
    pub trace_log_path: PathBuf,
}

impl PipelinePaths {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        let logs_dir = base.join("logs");
        Self {
            inbox_dir: base.join("inbox"),
            bin_dir: base.join("bin"),
            config_path: base.join("inboxctl.toml"),
            trace_log_path: logs_dir.join("inboxctl.trace.log"),
            logs_dir,
            base,
        }
    }

    pub fn queue_dir(&self, queue: Queue) -> PathBuf {
        self.inbox_dir.join(queue.as_str())
    }

    pub fn log_path(&self, channel: LogChannel) -> PathBuf {
        self.logs_dir.join(channel.file_name())
    }

    /// Default purchase list location, a sibling of the base directory.
    pub fn default_collection_path(&self) -> PathBuf {
        self.base
            .parent()
            .unwrap_or(Path::new("/"))
            .join("collection.json")
    }
}

/// `$HOME/BandcampSync/Sync`, or a relative `BandcampSync/Sync` without `HOME`.
pub fn default_base() -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
    home.join("BandcampSync").join("Sync")
}
