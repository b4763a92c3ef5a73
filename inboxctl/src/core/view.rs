//! Interactive view state machine.
//!
//! [`UiState::handle_key`] is the only place input changes state. It never
//! performs an action itself: confirmed actions come back as
//! [`Transition::Execute`] for the controller to run.

use crate::core::types::{Job, LogChannel, Queue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Queue,
    Logs,
    Actions,
    Dashboard,
}

impl View {
    pub fn title(self) -> &'static str {
        match self {
            View::Queue => "Queue",
            View::Logs => "Logs",
            View::Actions => "Actions",
            View::Dashboard => "Dashboard",
        }
    }
}

/// Terminal-independent key events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Up,
    Down,
    Other,
}

/// A mutation waiting for a yes/no answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    Reconcile,
    WorkerOnce,
    RetryFailed(Job),
    Requeue(Job),
}

impl PendingAction {
    pub fn prompt(&self) -> String {
        match self {
            PendingAction::Reconcile => "Run reconcile now?".to_string(),
            PendingAction::WorkerOnce => "Process ONE job now?".to_string(),
            PendingAction::RetryFailed(job) => format!("Retry failed job {}?", job.job_id),
            PendingAction::Requeue(job) => format!("Requeue job {} to pending?", job.job_id),
        }
    }

    /// Short name for progress messages.
    pub fn label(&self) -> String {
        match self {
            PendingAction::Reconcile => "reconcile".to_string(),
            PendingAction::WorkerOnce => "worker".to_string(),
            PendingAction::RetryFailed(job) => format!("retry {}", job.job_id),
            PendingAction::Requeue(job) => format!("requeue {}", job.job_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Browsing,
    Confirming(PendingAction),
}

/// Queue view selection, shared with the Actions view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSelection {
    pub queue: Queue,
    pub index: usize,
}

/// What the controller should do after a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Continue,
    Quit,
    Execute(PendingAction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiState {
    pub view: View,
    pub selection: QueueSelection,
    pub log_channel: LogChannel,
    pub message: Option<String>,
    pub mode: Mode,
    pub dashboard_only: bool,
}

impl UiState {
    pub fn new(dashboard_only: bool) -> Self {
        Self {
            view: if dashboard_only {
                View::Dashboard
            } else {
                View::Queue
            },
            selection: QueueSelection {
                queue: Queue::Pending,
                index: 0,
            },
            log_channel: LogChannel::Worker,
            message: None,
            mode: Mode::Browsing,
            dashboard_only,
        }
    }

    /// Keep the selection inside `[0, len - 1]`; the list may have shrunk.
    pub fn clamp_selection(&mut self, len: usize) {
        self.selection.index = self.selection.index.min(len.saturating_sub(1));
    }

    /// The pending action, if a confirmation prompt is showing.
    pub fn pending(&self) -> Option<&PendingAction> {
        match &self.mode {
            Mode::Confirming(action) => Some(action),
            Mode::Browsing => None,
        }
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    /// Apply one key. `selected` is the job under the Queue view cursor.
    pub fn handle_key(&mut self, key: Key, selected: Option<&Job>) -> Transition {
        if matches!(key, Key::Char('q' | 'Q')) {
            return Transition::Quit;
        }

        if let Mode::Confirming(action) = &self.mode {
            return match key {
                Key::Char('y' | 'Y') => {
                    let action = action.clone();
                    self.mode = Mode::Browsing;
                    Transition::Execute(action)
                }
                Key::Char('n' | 'N') => {
                    self.mode = Mode::Browsing;
                    self.set_message("cancelled");
                    Transition::Continue
                }
                _ => Transition::Continue,
            };
        }

        match key {
            Key::Char('1') => self.view = View::Queue,
            Key::Char('2') => self.view = View::Logs,
            Key::Char('3') if !self.dashboard_only => self.view = View::Actions,
            Key::Char('4') => self.view = View::Dashboard,
            _ => match self.view {
                View::Queue => self.queue_key(key),
                View::Logs => self.logs_key(key),
                View::Actions => self.actions_key(key, selected),
                View::Dashboard => {
                    if matches!(key, Key::Char('a' | 'A')) && !self.dashboard_only {
                        self.view = View::Actions;
                    }
                }
            },
        }
        Transition::Continue
    }

    fn queue_key(&mut self, key: Key) {
        let queue = match key {
            Key::Char('p' | 'P') => Some(Queue::Pending),
            Key::Char('i' | 'I') => Some(Queue::InProgress),
            Key::Char('f' | 'F') => Some(Queue::Failed),
            Key::Char('d' | 'D') => Some(Queue::Done),
            Key::Up | Key::Char('k') => {
                self.selection.index = self.selection.index.saturating_sub(1);
                None
            }
            Key::Down | Key::Char('j') => {
                // Clamped against the list length on the next render.
                self.selection.index = self.selection.index.saturating_add(1);
                None
            }
            _ => None,
        };
        if let Some(queue) = queue {
            self.selection = QueueSelection { queue, index: 0 };
        }
    }

    fn logs_key(&mut self, key: Key) {
        self.log_channel = match key {
            Key::Char('w' | 'W') => LogChannel::Worker,
            Key::Char('r' | 'R') => LogChannel::Reconcile,
            Key::Char('e' | 'E') => LogChannel::Enqueue,
            Key::Char('c' | 'C') => LogChannel::Ctl,
            _ => return,
        };
    }

    fn actions_key(&mut self, key: Key, selected: Option<&Job>) {
        if self.dashboard_only {
            return;
        }
        let action = match key {
            Key::Char('r' | 'R') => PendingAction::Reconcile,
            Key::Char('w' | 'W') => PendingAction::WorkerOnce,
            Key::Char('t' | 'T') => match selected {
                Some(job) if job.queue == Queue::Failed => PendingAction::RetryFailed(job.clone()),
                _ => {
                    self.set_message("select a failed job first");
                    return;
                }
            },
            Key::Char('e' | 'E') => match selected {
                Some(job) if matches!(job.queue, Queue::Failed | Queue::InProgress) => {
                    PendingAction::Requeue(job.clone())
                }
                _ => {
                    self.set_message("select a failed or in_progress job first");
                    return;
                }
            },
            _ => return,
        };
        self.mode = Mode::Confirming(action);
    }
}
