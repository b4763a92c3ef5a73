//! Directory-backed job queues.
//!
//! Each queue is a directory of `<job_id>.job` files under `<base>/inbox/`. The
//! automated pipeline moves files between queues concurrently with us, so
//! listing treats missing directories and vanished files as empty results.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::core::types::{Job, Queue};
use crate::io::paths::PipelinePaths;

pub const JOB_EXTENSION: &str = "job";

/// Result of a move that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The job now lives at this path.
    Moved(PathBuf),
    /// The source was gone before we could rename it.
    AlreadyMoved,
}

pub trait JobStore {
    /// Jobs in `queue`, ascending by file name.
    fn list(&self, queue: Queue) -> Vec<Job>;
    /// Source URL of the job, or an empty string.
    fn read_url(&self, job: &Job) -> String;
    /// Whole job file, or an empty string.
    fn read_contents(&self, job: &Job) -> String;
    fn move_job(&self, job: &Job, dest: Queue) -> Result<MoveOutcome>;
    /// The queue path exists but is not a directory.
    fn queue_is_file(&self, queue: Queue) -> bool;
}

/// Ids of every job currently in any queue.
pub fn locate_all<S: JobStore + ?Sized>(store: &S) -> Vec<(String, Queue)> {
    Queue::ALL
        .into_iter()
        .flat_map(|queue| {
            store
                .list(queue)
                .into_iter()
                .map(move |job| (job.job_id, queue))
        })
        .collect()
}

/// Extract the URL from job file text: first non-empty line, `URL=` stripped.
pub fn url_from_contents(contents: &str) -> String {
    let Some(line) = contents.lines().map(str::trim).find(|line| !line.is_empty()) else {
        return String::new();
    };
    match line.strip_prefix("URL=") {
        Some(value) => value.trim().to_string(),
        None => line.to_string(),
    }
}

pub struct FsJobStore {
    paths: PipelinePaths,
}

impl FsJobStore {
    pub fn new(paths: PipelinePaths) -> Self {
        Self { paths }
    }

    fn job_from_path(&self, queue: Queue, path: PathBuf) -> Option<Job> {
        let job_id = path.file_stem()?.to_str()?.to_string();
        let mtime = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut job = Job {
            job_id,
            queue,
            url: String::new(),
            content_path: path,
            mtime,
        };
        job.url = self.read_url(&job);
        Some(job)
    }
}

fn is_job_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == JOB_EXTENSION)
}

impl JobStore for FsJobStore {
    fn list(&self, queue: Queue) -> Vec<Job> {
        let dir = self.paths.queue_dir(queue);
        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| is_job_file(path))
            .collect();
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        paths
            .into_iter()
            .filter_map(|path| self.job_from_path(queue, path))
            .collect()
    }

    fn read_url(&self, job: &Job) -> String {
        url_from_contents(&self.read_contents(job))
    }

    fn read_contents(&self, job: &Job) -> String {
        match fs::read(&job.content_path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                debug!(path = %job.content_path.display(), err = %err, "job file unreadable");
                String::new()
            }
        }
    }

    #[instrument(skip_all, fields(job_id = %job.job_id, from = %job.queue, to = %dest))]
    fn move_job(&self, job: &Job, dest: Queue) -> Result<MoveOutcome> {
        let dest_dir = self.paths.queue_dir(dest);
        fs::create_dir_all(&dest_dir)
            .with_context(|| format!("create queue dir {}", dest_dir.display()))?;
        let file_name = job
            .content_path
            .file_name()
            .map_or_else(|| job.file_name().into(), |name| name.to_os_string());
        let target = dest_dir.join(file_name);
        match fs::rename(&job.content_path, &target) {
            Ok(()) => {
                info!(target = %target.display(), "job moved");
                Ok(MoveOutcome::Moved(target))
            }
            Err(err) if err.kind() == ErrorKind::NotFound && !job.content_path.exists() => {
                info!("job already moved");
                Ok(MoveOutcome::AlreadyMoved)
            }
            Err(err) => Err(err).with_context(|| {
                format!(
                    "move {} to {}",
                    job.content_path.display(),
                    target.display()
                )
            }),
        }
    }

    fn queue_is_file(&self, queue: Queue) -> bool {
        let dir = self.paths.queue_dir(queue);
        dir.exists() && !dir.is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(root: &Path) -> FsJobStore {
        FsJobStore::new(PipelinePaths::new(root))
    }

    fn write_job(root: &Path, queue: Queue, name: &str, body: &str) -> PathBuf {
        let dir = PipelinePaths::new(root).queue_dir(queue);
        fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join(name);
        fs::write(&path, body).expect("write job");
        path
    }

    #[test]
    fn list_is_sorted_and_skips_other_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_job(temp.path(), Queue::Pending, "b2.job", "URL=https://b\n");
        write_job(temp.path(), Queue::Pending, "a1.job", "URL=https://a\n");
        write_job(temp.path(), Queue::Pending, "notes.txt", "ignored");

        let jobs = store_in(temp.path()).list(Queue::Pending);
        let ids: Vec<&str> = jobs.iter().map(|job| job.job_id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "b2"]);
        assert_eq!(jobs[0].url, "https://a");
        assert_eq!(jobs[0].queue, Queue::Pending);
    }

    #[test]
    fn list_absent_or_file_queue_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(temp.path());
        assert!(store.list(Queue::Failed).is_empty());

        let inbox = temp.path().join("inbox");
        fs::create_dir_all(&inbox).expect("mkdir");
        fs::write(inbox.join("failed"), "not a dir").expect("write");
        assert!(store.list(Queue::Failed).is_empty());
        assert!(store.queue_is_file(Queue::Failed));
        assert!(!store.queue_is_file(Queue::Done));
    }

    #[test]
    fn url_parsing_variants() {
        assert_eq!(url_from_contents("\n\n  URL= https://x/y  \nother"), "https://x/y");
        assert_eq!(url_from_contents("https://raw/line\n"), "https://raw/line");
        assert_eq!(url_from_contents(""), "");
        assert_eq!(url_from_contents("   \n\t\n"), "");
    }

    #[test]
    fn move_creates_destination_and_keeps_name() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_job(temp.path(), Queue::Failed, "abc.job", "URL=https://a\n");
        let store = store_in(temp.path());
        let job = store.list(Queue::Failed).remove(0);

        let outcome = store.move_job(&job, Queue::Pending).expect("move");
        let expected = temp.path().join("inbox/pending/abc.job");
        assert_eq!(outcome, MoveOutcome::Moved(expected));
        assert!(store.list(Queue::Failed).is_empty());
        assert_eq!(store.list(Queue::Pending)[0].job_id, "abc");
    }

    #[test]
    fn move_of_vanished_job_reports_already_moved() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = write_job(temp.path(), Queue::InProgress, "gone.job", "x");
        let store = store_in(temp.path());
        let job = store.list(Queue::InProgress).remove(0);
        fs::remove_file(path).expect("remove");

        assert_eq!(
            store.move_job(&job, Queue::Pending).expect("move"),
            MoveOutcome::AlreadyMoved
        );
    }

    #[test]
    fn read_contents_is_lossy() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = write_job(temp.path(), Queue::Done, "bin.job", "");
        fs::write(&path, b"URL=https://a\n\xff\xfe").expect("write");
        let store = store_in(temp.path());
        let job = store.list(Queue::Done).remove(0);
        assert!(store.read_contents(&job).starts_with("URL=https://a\n"));
        assert_eq!(job.url, "https://a");
    }
}
