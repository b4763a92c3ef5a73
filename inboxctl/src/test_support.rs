//! Fakes and fixtures for exercising the monitor without a real pipeline.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Result;
use tempfile::TempDir;

use crate::core::render::{Frame, FrameSize};
use crate::core::types::{Job, LogChannel, Queue};
use crate::core::view::Key;
use crate::io::config::Config;
use crate::io::job_store::{JobStore, MoveOutcome, url_from_contents};
use crate::io::paths::PipelinePaths;
use crate::io::process::{CommandRunner, ExecResult};
use crate::io::terminal::Terminal;

/// In-memory queues keyed by job id.
#[derive(Default)]
pub struct MemJobStore {
    queues: RefCell<BTreeMap<Queue, BTreeMap<String, Job>>>,
    contents: RefCell<BTreeMap<String, String>>,
    file_queues: BTreeSet<Queue>,
}

impl MemJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job whose file holds `URL=<url>`.
    pub fn add(&self, queue: Queue, job_id: &str, url: &str) -> Job {
        self.add_with_contents(queue, job_id, &format!("URL={url}\n"))
    }

    pub fn add_with_contents(&self, queue: Queue, job_id: &str, contents: &str) -> Job {
        let job = Job {
            job_id: job_id.to_string(),
            queue,
            url: url_from_contents(contents),
            content_path: mem_path(queue, job_id),
            mtime: SystemTime::now(),
        };
        self.contents
            .borrow_mut()
            .insert(job_id.to_string(), contents.to_string());
        self.queues
            .borrow_mut()
            .entry(queue)
            .or_default()
            .insert(job_id.to_string(), job.clone());
        job
    }

    /// Make `queue` look like a plain file instead of a directory.
    pub fn mark_queue_as_file(&mut self, queue: Queue) {
        self.file_queues.insert(queue);
    }

    pub fn ids(&self, queue: Queue) -> Vec<String> {
        self.list(queue).into_iter().map(|job| job.job_id).collect()
    }
}

fn mem_path(queue: Queue, job_id: &str) -> PathBuf {
    PathBuf::from("inbox").join(queue.as_str()).join(format!("{job_id}.job"))
}

impl JobStore for MemJobStore {
    fn list(&self, queue: Queue) -> Vec<Job> {
        if self.file_queues.contains(&queue) {
            return Vec::new();
        }
        self.queues
            .borrow()
            .get(&queue)
            .map(|jobs| jobs.values().cloned().collect())
            .unwrap_or_default()
    }

    fn read_url(&self, job: &Job) -> String {
        url_from_contents(&self.read_contents(job))
    }

    fn read_contents(&self, job: &Job) -> String {
        self.contents
            .borrow()
            .get(&job.job_id)
            .cloned()
            .unwrap_or_default()
    }

    fn move_job(&self, job: &Job, dest: Queue) -> Result<MoveOutcome> {
        let mut queues = self.queues.borrow_mut();
        let Some(mut moved) = queues
            .get_mut(&job.queue)
            .and_then(|jobs| jobs.remove(&job.job_id))
        else {
            return Ok(MoveOutcome::AlreadyMoved);
        };
        moved.queue = dest;
        moved.content_path = mem_path(dest, &job.job_id);
        let target = moved.content_path.clone();
        queues
            .entry(dest)
            .or_default()
            .insert(job.job_id.clone(), moved);
        Ok(MoveOutcome::Moved(target))
    }

    fn queue_is_file(&self, queue: Queue) -> bool {
        self.file_queues.contains(&queue)
    }
}

/// Records every invocation and answers from a script.
///
/// Results are matched by program file name; unscripted programs succeed with
/// empty output.
#[derive(Default)]
pub struct ScriptedCommandRunner {
    responses: RefCell<BTreeMap<String, VecDeque<ExecResult>>>,
    calls: RefCell<Vec<(PathBuf, Vec<String>)>>,
}

impl ScriptedCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, program: &str, result: ExecResult) {
        self.responses
            .borrow_mut()
            .entry(program.to_string())
            .or_default()
            .push_back(result);
    }

    pub fn calls(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.calls.borrow().clone()
    }

    /// Invocations whose program file name is `name`.
    pub fn calls_to(&self, name: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|(program, _)| program_name(program) == name)
            .count()
    }
}

fn program_name(program: &Path) -> String {
    program
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn ok_result(stdout: &str) -> ExecResult {
    ExecResult {
        ok: true,
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: Some(0),
    }
}

impl CommandRunner for ScriptedCommandRunner {
    fn run(&self, program: &Path, args: &[&str], _timeout: Duration) -> ExecResult {
        self.calls.borrow_mut().push((
            program.to_path_buf(),
            args.iter().map(|arg| (*arg).to_string()).collect(),
        ));
        self.responses
            .borrow_mut()
            .get_mut(&program_name(program))
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| ok_result(""))
    }
}

/// Feeds a fixed key sequence and keeps every drawn frame.
///
/// Once the script runs out it answers `q`, so a controller loop always ends.
pub struct ScriptedTerminal {
    pub size: FrameSize,
    keys: VecDeque<Option<Key>>,
    pub frames: Vec<Frame>,
}

impl ScriptedTerminal {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            size: FrameSize { width, height },
            keys: VecDeque::new(),
            frames: Vec::new(),
        }
    }

    pub fn keys(mut self, keys: impl IntoIterator<Item = Key>) -> Self {
        self.keys.extend(keys.into_iter().map(Some));
        self
    }

    /// A poll that times out without input.
    pub fn idle(mut self) -> Self {
        self.keys.push_back(None);
        self
    }

    pub fn chars(self, text: &str) -> Self {
        self.keys(text.chars().map(Key::Char))
    }

    pub fn last_frame(&self) -> &Frame {
        self.frames.last().expect("no frame drawn")
    }
}

impl Terminal for ScriptedTerminal {
    fn size(&mut self) -> Result<FrameSize> {
        Ok(self.size)
    }

    fn draw(&mut self, frame: &Frame) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn poll_key(&mut self, _timeout: Duration) -> Result<Option<Key>> {
        Ok(self.keys.pop_front().unwrap_or(Some(Key::Char('q'))))
    }
}

/// A pipeline base directory in a temp dir.
pub struct TestLayout {
    _temp: TempDir,
    pub paths: PipelinePaths,
}

impl TestLayout {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = PipelinePaths::new(temp.path().join("Sync"));
        for queue in Queue::ALL {
            fs::create_dir_all(paths.queue_dir(queue)).expect("create queue dir");
        }
        fs::create_dir_all(&paths.logs_dir).expect("create logs dir");
        Self { _temp: temp, paths }
    }

    pub fn base(&self) -> &Path {
        &self.paths.base
    }

    pub fn config(&self) -> Config {
        Config::with_defaults(&self.paths.base).expect("default config")
    }

    pub fn add_job(&self, queue: Queue, job_id: &str, url: &str) -> PathBuf {
        let path = self.paths.queue_dir(queue).join(format!("{job_id}.job"));
        fs::write(&path, format!("URL={url}\n")).expect("write job");
        path
    }

    /// Append raw lines to a log.
    pub fn log(&self, channel: LogChannel, lines: &[&str]) {
        let path = self.paths.log_path(channel);
        let mut text = fs::read_to_string(&path).unwrap_or_default();
        for line in lines {
            text.push_str(line);
            text.push('\n');
        }
        fs::write(&path, text).expect("write log");
    }

    pub fn read_log(&self, channel: LogChannel) -> String {
        fs::read_to_string(self.paths.log_path(channel)).unwrap_or_default()
    }
}

impl Default for TestLayout {
    fn default() -> Self {
        Self::new()
    }
}

/// Backdate a file's modification time by `age`.
pub fn set_age(path: &Path, age: Duration) {
    let file = fs::File::options().write(true).open(path).expect("open for mtime");
    file.set_modified(SystemTime::now() - age).expect("set mtime");
}
