//! Child process execution with timeouts and bounded output.

use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

/// Outcome of an external command as shown to the operator. Never an error:
/// spawn failures and timeouts are folded into `ok = false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecResult {
    pub ok: bool,
    pub stdout: String,
    pub stderr: String,
    /// `None` when the child was killed by a signal or never started.
    pub exit_code: Option<i32>,
}

impl ExecResult {
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            ok: false,
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: None,
        }
    }

    fn from_output(output: &CommandOutput, timeout: Duration) -> Self {
        let mut stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if output.stdout_truncated > 0 {
            stdout.push_str(&format!(
                "\n[stdout truncated {} bytes]\n",
                output.stdout_truncated
            ));
        }
        if output.stderr_truncated > 0 {
            stderr.push_str(&format!(
                "\n[stderr truncated {} bytes]\n",
                output.stderr_truncated
            ));
        }
        if output.timed_out {
            stderr.push_str(&format!("timed out after {}s\n", timeout.as_secs()));
        }
        Self {
            ok: output.status.success() && !output.timed_out,
            stdout,
            stderr,
            exit_code: output.status.code(),
        }
    }

    /// One-line summary for the status bar.
    pub fn summary(&self) -> String {
        let code = self
            .exit_code
            .map_or_else(|| "none".to_string(), |code| code.to_string());
        let detail = if self.ok { &self.stdout } else { &self.stderr };
        let last = detail
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("");
        let verdict = if self.ok { "ok" } else { "failed" };
        if last.is_empty() {
            format!("{verdict} (exit {code})")
        } else {
            format!("{verdict} (exit {code}): {last}")
        }
    }
}

/// Seam between actions and real process spawning.
pub trait CommandRunner {
    fn run(&self, program: &Path, args: &[&str], timeout: Duration) -> ExecResult;
}

/// Spawns real processes with stdin closed.
#[derive(Debug, Clone)]
pub struct SystemCommandRunner {
    pub output_limit_bytes: usize,
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &Path, args: &[&str], timeout: Duration) -> ExecResult {
        let mut cmd = Command::new(program);
        cmd.args(args);
        match run_command_with_timeout(cmd, timeout, self.output_limit_bytes) {
            Ok(output) => ExecResult::from_output(&output, timeout),
            Err(err) if is_not_found(&err) => {
                ExecResult::failed(format!("{} not found", program.display()))
            }
            Err(err) => ExecResult::failed(format!("{}: {err:#}", program.display())),
        }
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr kept in memory; the rest is drained and counted.
#[instrument(skip_all, fields(program = ?cmd.get_program(), timeout_secs = timeout.as_secs()))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}
