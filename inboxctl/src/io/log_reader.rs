//! Reading the pipeline's append-only logs.
//!
//! Every reader tolerates absent files and invalid UTF-8. Parsed views drop
//! lines that do not match the record grammar; raw tails keep them.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::log_line::parse_line;
use crate::core::types::LogEntry;

/// Leading bytes remembered to notice a log rewritten in place.
const HEAD_BYTES: u64 = 64;

/// Last `n` raw lines of `path`, oldest first.
pub fn tail(path: &Path, n: usize) -> Vec<String> {
    if n == 0 {
        return Vec::new();
    }
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(path = %path.display(), err = %err, "log unreadable");
            return Vec::new();
        }
    };
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].iter().map(|line| (*line).to_string()).collect()
}

/// Well-formed records among the last `limit` raw lines, in file order.
pub fn entries(path: &Path, limit: usize) -> Vec<LogEntry> {
    tail(path, limit)
        .iter()
        .filter_map(|line| parse_line(line))
        .collect()
}

/// The record with the greatest timestamp across `paths`.
///
/// Only the last `limit` lines of each log are considered. On equal timestamps
/// the earlier log in `paths`, then the earlier line, wins.
pub fn most_recent(paths: &[PathBuf], limit: usize) -> Option<LogEntry> {
    let mut best: Option<LogEntry> = None;
    for path in paths {
        for entry in entries(path, limit) {
            let newer = best
                .as_ref()
                .is_none_or(|current| entry.timestamp > current.timestamp);
            if newer {
                best = Some(entry);
            }
        }
    }
    best
}

pub fn modified_at(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

/// Append one line, creating the file and its parent directory if needed.
pub fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log dir {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    file.write_all(buf.as_bytes())
        .with_context(|| format!("append {}", path.display()))
}

/// Start following `path` from its current end.
///
/// The file and its parent directories are created when absent.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn follow(path: &Path, interval: Duration) -> Result<Follow> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log dir {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("create {}", path.display()))?;
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let meta = file
        .metadata()
        .with_context(|| format!("stat {}", path.display()))?;
    let offset = meta.len();
    let head = read_head(&mut file, offset.min(HEAD_BYTES))
        .with_context(|| format!("read {}", path.display()))?;
    debug!(offset, "follow started");
    Ok(Follow {
        path: path.to_path_buf(),
        offset,
        identity: file_identity(&meta),
        head,
        partial: Vec::new(),
        ready: VecDeque::new(),
        interval,
    })
}

#[cfg(unix)]
fn file_identity(meta: &fs::Metadata) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn file_identity(_meta: &fs::Metadata) -> Option<(u64, u64)> {
    None
}

fn read_head(file: &mut File, len: u64) -> std::io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(0))?;
    let mut head = Vec::new();
    std::io::Read::by_ref(file).take(len).read_to_end(&mut head)?;
    Ok(head)
}

/// Endless iterator over lines appended to a log.
///
/// `next` blocks, sleeping `interval` between checks, until a complete line is
/// available. It never returns `None`; stop by dropping the iterator.
///
/// Reading restarts from the top when the file shrinks, is replaced by a new
/// file, or no longer starts with the bytes already consumed.
#[derive(Debug)]
pub struct Follow {
    path: PathBuf,
    offset: u64,
    identity: Option<(u64, u64)>,
    head: Vec<u8>,
    partial: Vec<u8>,
    ready: VecDeque<String>,
    interval: Duration,
}

impl Follow {
    /// Check the file once and return any newly completed lines.
    pub fn poll(&mut self) -> Vec<String> {
        if let Err(err) = self.read_new() {
            debug!(path = %self.path.display(), err = %err, "follow read failed");
        }
        self.ready.drain(..).collect()
    }

    fn rotated(&self, file: &mut File, len: u64, identity: Option<(u64, u64)>) -> Result<bool> {
        if len < self.offset || identity != self.identity {
            return Ok(true);
        }
        Ok(read_head(file, self.head.len() as u64)? != self.head)
    }

    fn read_new(&mut self) -> Result<()> {
        let mut file = File::open(&self.path)?;
        let meta = file.metadata()?;
        let len = meta.len();
        let identity = file_identity(&meta);
        if self.rotated(&mut file, len, identity)? {
            debug!(path = %self.path.display(), "log replaced, restarting from the top");
            self.offset = 0;
            self.identity = identity;
            self.head.clear();
            self.partial.clear();
        }
        if len == self.offset {
            return Ok(());
        }
        file.seek(SeekFrom::Start(self.offset))?;
        let mut chunk = Vec::new();
        let read = file.read_to_end(&mut chunk)?;
        self.offset += read as u64;
        self.partial.extend_from_slice(&chunk);
        if (self.head.len() as u64) < HEAD_BYTES {
            self.head = read_head(&mut file, self.offset.min(HEAD_BYTES))?;
        }

        while let Some(pos) = self.partial.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            self.ready
                .push_back(text.trim_end_matches('\r').to_string());
        }
        Ok(())
    }
}

impl Iterator for Follow {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Some(line);
            }
            if let Err(err) = self.read_new() {
                debug!(path = %self.path.display(), err = %err, "follow read failed");
            }
            if self.ready.is_empty() {
                thread::sleep(self.interval);
            }
        }
    }
}
