//! Operator-initiated mutations: running pipeline steps and moving jobs.
//!
//! Every method records an audit line in the control log before or after it
//! acts. Nothing here is invoked without an explicit confirmation upstream.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{Local, SecondsFormat};
use tracing::{info, instrument, warn};

use crate::core::log_line::{ControlRecord, NO_JOB};
use crate::core::types::{Job, Queue};
use crate::io::config::CommandsConfig;
use crate::io::job_store::{JobStore, MoveOutcome};
use crate::io::log_reader::append_line;
use crate::io::process::{CommandRunner, ExecResult};

pub const CTL_RECONCILE: &str = "ctl_reconcile";
pub const CTL_WORKER: &str = "ctl_worker";
pub const RECONCILE_DETAIL: &str = "manual reconcile triggered";
pub const WORKER_DETAIL: &str = "manual worker triggered";
pub const CTL_RETRY: &str = "ctl_retry";
pub const CTL_REQUEUE: &str = "ctl_requeue";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// An external step ran (successfully or not).
    Executed { label: &'static str, result: ExecResult },
    Moved { job_id: String, from: Queue, to: Queue },
    /// The job left its queue before we moved it.
    AlreadyMoved { job_id: String },
    /// The request was not eligible; nothing changed.
    Refused(String),
}

impl ActionOutcome {
    /// Status-bar text.
    pub fn message(&self) -> String {
        match self {
            ActionOutcome::Executed { label, result } => format!("{label}: {}", result.summary()),
            ActionOutcome::Moved { job_id, from, to } => {
                let verb = if *from == Queue::Failed && *to == Queue::Pending {
                    "retried"
                } else {
                    "requeued"
                };
                format!("{verb} {job_id} ({from}->{to})")
            }
            ActionOutcome::AlreadyMoved { job_id } => format!("job {job_id} already moved"),
            ActionOutcome::Refused(reason) => reason.clone(),
        }
    }
}

/// Local time with offset, second precision.
pub fn now_timestamp() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

pub struct ActionExecutor<'a, S: JobStore + ?Sized, R: CommandRunner + ?Sized> {
    store: &'a S,
    runner: &'a R,
    commands: &'a CommandsConfig,
    ctl_log: PathBuf,
}

impl<'a, S: JobStore + ?Sized, R: CommandRunner + ?Sized> ActionExecutor<'a, S, R> {
    pub fn new(store: &'a S, runner: &'a R, commands: &'a CommandsConfig, ctl_log: &Path) -> Self {
        Self {
            store,
            runner,
            commands,
            ctl_log: ctl_log.to_path_buf(),
        }
    }

    #[instrument(skip_all)]
    pub fn run_reconcile(&self) -> ActionOutcome {
        self.append_control_record(CTL_RECONCILE, NO_JOB, RECONCILE_DETAIL);
        let result = self
            .runner
            .run(&self.commands.reconcile, &[], self.commands.timeout);
        info!(ok = result.ok, exit_code = ?result.exit_code, "reconcile finished");
        ActionOutcome::Executed {
            label: "reconcile",
            result,
        }
    }

    #[instrument(skip_all)]
    pub fn run_worker_once(&self) -> ActionOutcome {
        self.append_control_record(CTL_WORKER, NO_JOB, WORKER_DETAIL);
        let result = self
            .runner
            .run(&self.commands.worker_once, &[], self.commands.timeout);
        info!(ok = result.ok, exit_code = ?result.exit_code, "worker run finished");
        ActionOutcome::Executed {
            label: "worker",
            result,
        }
    }

    /// Move a failed job back to pending.
    pub fn retry_failed(&self, job: &Job) -> Result<ActionOutcome> {
        if job.queue != Queue::Failed {
            return Ok(ActionOutcome::Refused("select a failed job first".to_string()));
        }
        self.move_to_pending(job, CTL_RETRY)
    }

    /// Move a failed or in-progress job back to pending.
    pub fn requeue(&self, job: &Job) -> Result<ActionOutcome> {
        if !matches!(job.queue, Queue::Failed | Queue::InProgress) {
            return Ok(ActionOutcome::Refused(
                "select a failed or in_progress job first".to_string(),
            ));
        }
        self.move_to_pending(job, CTL_REQUEUE)
    }

    fn move_to_pending(&self, job: &Job, action: &str) -> Result<ActionOutcome> {
        match self.store.move_job(job, Queue::Pending)? {
            MoveOutcome::Moved(_) => {
                let detail = format!("{}->{}", job.queue, Queue::Pending);
                self.append_control_record(action, &job.job_id, &detail);
                Ok(ActionOutcome::Moved {
                    job_id: job.job_id.clone(),
                    from: job.queue,
                    to: Queue::Pending,
                })
            }
            MoveOutcome::AlreadyMoved => Ok(ActionOutcome::AlreadyMoved {
                job_id: job.job_id.clone(),
            }),
        }
    }

    /// Best effort: a failed append is logged, never surfaced.
    pub fn append_control_record(&self, action: &str, job_id: &str, detail: &str) {
        let record = ControlRecord::new(now_timestamp(), action, job_id, detail);
        if let Err(err) = append_line(&self.ctl_log, &record.to_line()) {
            warn!(err = %format!("{err:#}"), action, "control log append failed");
        }
    }
}
