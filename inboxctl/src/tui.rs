//! Interactive controller: polls the pipeline, renders, and dispatches keys.
//!
//! One tick re-reads everything the current view needs, renders a frame sized
//! to the terminal, then waits up to `Config::tick` for a key. Confirmed
//! actions run synchronously; the loop resumes on the same view afterwards.

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::core::diagnostics::LIFECYCLE_WINDOW;
use crate::core::render::{
    ActionsPane, Body, DashboardPane, FrameSize, JobDetail, JobRow, LogsPane, QueuePane,
    ScreenModel, body_rows, render,
};
use crate::core::types::{Job, LogChannel};
use crate::core::view::{PendingAction, Transition, UiState, View};
use crate::io::actions::ActionExecutor;
use crate::io::config::Config;
use crate::io::job_store::JobStore;
use crate::io::log_reader::{entries, most_recent, tail};
use crate::io::process::CommandRunner;
use crate::io::services::{ServiceProbe, display_lines};
use crate::io::snapshot::current_warnings;
use crate::io::status::queue_counts;
use crate::io::terminal::Terminal;

const HISTORY_LINES: usize = 5;
const RECENT_LINES: usize = 5;
const SERVICE_LINES: usize = 3;
const JOB_TRANSITION: &str = "job_transition";

pub struct Controller<'a, S: JobStore + ?Sized, R: CommandRunner + ?Sized> {
    config: &'a Config,
    store: &'a S,
    runner: &'a R,
    state: UiState,
}

impl<'a, S: JobStore + ?Sized, R: CommandRunner + ?Sized> Controller<'a, S, R> {
    pub fn new(config: &'a Config, store: &'a S, runner: &'a R, dashboard_only: bool) -> Self {
        Self {
            config,
            store,
            runner,
            state: UiState::new(dashboard_only),
        }
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    /// Run until the quit key or a terminal error.
    #[instrument(skip_all, fields(dashboard_only = self.state.dashboard_only))]
    pub fn run<T: Terminal + ?Sized>(&mut self, terminal: &mut T) -> Result<()> {
        info!("interactive session started");
        loop {
            let size = terminal.size()?;
            let (model, selected) = self.tick(size);
            terminal.draw(&render(&model, size))?;

            let Some(key) = terminal.poll_key(self.config.tick)? else {
                continue;
            };
            match self.state.handle_key(key, selected.as_ref()) {
                Transition::Continue => {}
                Transition::Quit => {
                    info!("quit requested");
                    return Ok(());
                }
                Transition::Execute(action) => {
                    self.state.set_message(format!("running {}...", action.label()));
                    let (model, _) = self.tick(size);
                    terminal.draw(&render(&model, size))?;
                    self.execute(action);
                }
            }
        }
    }

    /// Refresh state from disk and build the model for the current view.
    ///
    /// Also returns the job under the Queue view cursor.
    pub fn tick(&mut self, size: FrameSize) -> (ScreenModel, Option<Job>) {
        let counts = queue_counts(self.store);
        let jobs = self.store.list(self.state.selection.queue);
        self.state.clamp_selection(jobs.len());
        let selected = jobs.get(self.state.selection.index).cloned();

        let body = match self.state.view {
            View::Queue => Body::Queue(self.queue_pane(&jobs, selected.as_ref())),
            View::Logs => {
                let channel = self.state.log_channel;
                Body::Logs(LogsPane {
                    channel,
                    lines: tail(&self.config.paths.log_path(channel), body_rows(size)),
                })
            }
            View::Actions => Body::Actions(ActionsPane {
                message: self.state.message.clone(),
                selection: selected
                    .as_ref()
                    .map(|job| format!("{} {} {}", job.queue, job.job_id, job.url)),
            }),
            View::Dashboard => Body::Dashboard(self.dashboard_pane()),
        };

        let model = ScreenModel {
            view: self.state.view,
            counts,
            body,
            prompt: self.state.pending().map(PendingAction::prompt),
            dashboard_only: self.state.dashboard_only,
        };
        (model, selected)
    }

    fn queue_pane(&self, jobs: &[Job], selected: Option<&Job>) -> QueuePane {
        let detail = selected.map(|job| {
            let worker_log = self.config.paths.log_path(LogChannel::Worker);
            let mut history: Vec<String> = entries(&worker_log, LIFECYCLE_WINDOW)
                .into_iter()
                .filter(|entry| entry.job_id == job.job_id)
                .map(|entry| entry.raw)
                .collect();
            let skip = history.len().saturating_sub(HISTORY_LINES);
            history.drain(..skip);
            JobDetail {
                job_id: job.job_id.clone(),
                queue: job.queue,
                url: job.url.clone(),
                contents: self
                    .store
                    .read_contents(job)
                    .lines()
                    .map(str::to_string)
                    .collect(),
                history,
            }
        });
        QueuePane {
            queue: self.state.selection.queue,
            jobs: jobs
                .iter()
                .map(|job| JobRow {
                    job_id: job.job_id.clone(),
                    url: job.url.clone(),
                })
                .collect(),
            selected: self.state.selection.index,
            detail,
        }
    }

    fn dashboard_pane(&self) -> DashboardPane {
        let paths = &self.config.paths;
        let worker_log = paths.log_path(LogChannel::Worker);
        let probe = ServiceProbe::new(self.runner, self.config.services.query_timeout);
        let all_logs: Vec<_> = LogChannel::ALL
            .into_iter()
            .map(|channel| paths.log_path(channel))
            .collect();

        let last_download = entries(&worker_log, LIFECYCLE_WINDOW)
            .into_iter()
            .rev()
            .find(|entry| entry.action == JOB_TRANSITION && entry.detail.contains("done"))
            .map(|entry| entry.raw);

        DashboardPane {
            timer: display_lines(
                &probe.list_timers(&self.config.services.reconcile_timer),
                SERVICE_LINES,
            ),
            path_unit: display_lines(
                &probe.unit_status(&self.config.services.worker_path_unit),
                SERVICE_LINES,
            ),
            last_activity: most_recent(&all_logs, LIFECYCLE_WINDOW).map(|entry| entry.raw),
            last_download,
            warnings: current_warnings(self.store, paths, &self.config.thresholds),
            recent: tail(&worker_log, RECENT_LINES),
        }
    }

    /// Run a confirmed action and record its outcome as the status message.
    pub fn execute(&mut self, action: PendingAction) {
        let ctl_log = self.config.paths.log_path(LogChannel::Ctl);
        let executor =
            ActionExecutor::new(self.store, self.runner, &self.config.commands, &ctl_log);
        let message = match &action {
            PendingAction::Reconcile => executor.run_reconcile().message(),
            PendingAction::WorkerOnce => executor.run_worker_once().message(),
            PendingAction::RetryFailed(job) => match executor.retry_failed(job) {
                Ok(outcome) => outcome.message(),
                Err(err) => format!("retry {} failed: {err:#}", job.job_id),
            },
            PendingAction::Requeue(job) => match executor.requeue(job) {
                Ok(outcome) => outcome.message(),
                Err(err) => format!("requeue {} failed: {err:#}", job.job_id),
            },
        };
        debug!(?action, %message, "action finished");
        self.state.set_message(message);
    }
}
