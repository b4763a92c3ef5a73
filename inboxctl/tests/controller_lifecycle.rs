//! Interactive controller driven by scripted keys.
//!
//! Queues live in memory, commands are scripted, and every frame the
//! controller draws is kept for assertions. Logs go to a temp base directory.

use inboxctl::core::types::{LogChannel, Queue};
use inboxctl::core::view::{Key, Mode, View};
use inboxctl::io::job_store::JobStore;
use inboxctl::io::process::ExecResult;
use inboxctl::test_support::{
    MemJobStore, ScriptedCommandRunner, ScriptedTerminal, TestLayout, ok_result,
};
use inboxctl::tui::Controller;

const WIDTH: usize = 100;
const HEIGHT: usize = 24;

#[test]
fn confirmed_worker_run_returns_to_actions_view() {
    let layout = TestLayout::new();
    let config = layout.config();
    let store = MemJobStore::new();
    let runner = ScriptedCommandRunner::new();
    runner.respond("worker.sh", ok_result("processed abc\n"));
    let mut terminal = ScriptedTerminal::new(WIDTH, HEIGHT).chars("3wy");

    let mut controller = Controller::new(&config, &store, &runner, false);
    controller.run(&mut terminal).expect("run");

    let state = controller.state();
    assert_eq!(state.view, View::Actions);
    assert_eq!(state.mode, Mode::Browsing);
    assert_eq!(
        state.message.as_deref(),
        Some("worker: ok (exit 0): processed abc")
    );
    assert_eq!(runner.calls_to("worker.sh"), 1);
    assert!(
        layout
            .read_log(LogChannel::Ctl)
            .contains(r#"action=ctl_worker job_id=- detail="manual worker triggered""#)
    );

    let last = terminal.last_frame();
    assert!(last.row(0).starts_with("inboxctl | Actions"));
    assert!(last.snapshot().contains("Last action: worker: ok (exit 0): processed abc"));
}

#[test]
fn prompt_ignores_unrelated_keys() {
    let layout = TestLayout::new();
    let config = layout.config();
    let store = MemJobStore::new();
    let runner = ScriptedCommandRunner::new();
    let mut terminal = ScriptedTerminal::new(WIDTH, HEIGHT)
        .chars("3r")
        .keys([Key::Char('1'), Key::Down, Key::Char('x'), Key::Other])
        .idle();

    let mut controller = Controller::new(&config, &store, &runner, false);
    controller.run(&mut terminal).expect("run");

    assert_eq!(controller.state().view, View::Actions);
    assert!(matches!(controller.state().mode, Mode::Confirming(_)));
    assert_eq!(runner.calls_to("reconcile.sh"), 0);
    let prompt_row = terminal.last_frame().row(HEIGHT - 2).to_string();
    assert_eq!(prompt_row, "Run reconcile now? (y/n)");
}

#[test]
fn declined_reconcile_runs_nothing() {
    let layout = TestLayout::new();
    let config = layout.config();
    let store = MemJobStore::new();
    let runner = ScriptedCommandRunner::new();
    let mut terminal = ScriptedTerminal::new(WIDTH, HEIGHT).chars("3rn");

    let mut controller = Controller::new(&config, &store, &runner, false);
    controller.run(&mut terminal).expect("run");

    assert_eq!(controller.state().message.as_deref(), Some("cancelled"));
    assert_eq!(runner.calls_to("reconcile.sh"), 0);
    assert_eq!(layout.read_log(LogChannel::Ctl), "");
}

#[test]
fn retry_moves_selected_failed_job() {
    let layout = TestLayout::new();
    let config = layout.config();
    let store = MemJobStore::new();
    store.add(Queue::Failed, "aaa", "https://a");
    store.add(Queue::Failed, "bbb", "https://b");
    let runner = ScriptedCommandRunner::new();
    let mut terminal = ScriptedTerminal::new(WIDTH, HEIGHT)
        .chars("f")
        .keys([Key::Down])
        .chars("3ty");

    let mut controller = Controller::new(&config, &store, &runner, false);
    controller.run(&mut terminal).expect("run");

    assert_eq!(store.ids(Queue::Failed), vec!["aaa"]);
    assert_eq!(store.ids(Queue::Pending), vec!["bbb"]);
    assert_eq!(
        controller.state().message.as_deref(),
        Some("retried bbb (failed->pending)")
    );
    let ctl = layout.read_log(LogChannel::Ctl);
    assert!(ctl.contains(r#"action=ctl_retry job_id=bbb detail="failed->pending""#));
}

#[test]
fn retry_of_in_progress_job_is_refused_without_prompt() {
    let layout = TestLayout::new();
    let config = layout.config();
    let store = MemJobStore::new();
    store.add(Queue::InProgress, "run", "https://r");
    let runner = ScriptedCommandRunner::new();
    let mut terminal = ScriptedTerminal::new(WIDTH, HEIGHT).chars("i3t");

    let mut controller = Controller::new(&config, &store, &runner, false);
    controller.run(&mut terminal).expect("run");

    assert_eq!(controller.state().mode, Mode::Browsing);
    assert_eq!(
        controller.state().message.as_deref(),
        Some("select a failed job first")
    );
    assert_eq!(store.ids(Queue::InProgress), vec!["run"]);
    assert_eq!(layout.read_log(LogChannel::Ctl), "");
}

#[test]
fn selection_is_clamped_when_queue_shrinks() {
    let layout = TestLayout::new();
    let config = layout.config();
    let store = MemJobStore::new();
    for id in ["a", "b", "c"] {
        store.add(Queue::Pending, id, "https://x");
    }
    let runner = ScriptedCommandRunner::new();
    let mut controller = Controller::new(&config, &store, &runner, false);
    let mut terminal = ScriptedTerminal::new(WIDTH, HEIGHT).keys([Key::Down, Key::Down, Key::Down]);
    controller.run(&mut terminal).expect("run");
    assert_eq!(controller.state().selection.index, 2);

    let job = store.list(Queue::Pending).remove(2);
    store.move_job(&job, Queue::Done).expect("move");
    let mut terminal = ScriptedTerminal::new(WIDTH, HEIGHT);
    controller.run(&mut terminal).expect("run");
    assert_eq!(controller.state().selection.index, 1);
    assert!(terminal.last_frame().snapshot().contains("> b https://x"));
}

#[test]
fn dashboard_only_mode_cannot_reach_actions() {
    let layout = TestLayout::new();
    let config = layout.config();
    let store = MemJobStore::new();
    let runner = ScriptedCommandRunner::new();
    runner.respond("systemctl", ExecResult::failed("systemctl not found"));
    let mut terminal = ScriptedTerminal::new(WIDTH, HEIGHT).chars("3a");

    let mut controller = Controller::new(&config, &store, &runner, true);
    controller.run(&mut terminal).expect("run");

    assert_eq!(controller.state().view, View::Dashboard);
    let first = &terminal.frames[0];
    assert_eq!(first.row(0), "inboxctl | Dashboard (read-only)");
    assert!(first.snapshot().contains("systemctl not found"));
    assert_eq!(runner.calls_to("reconcile.sh"), 0);
}

#[test]
fn logs_view_shows_raw_tail_of_chosen_channel() {
    let layout = TestLayout::new();
    layout.log(LogChannel::Reconcile, &["first", "not a record", "last"]);
    let config = layout.config();
    let store = MemJobStore::new();
    let runner = ScriptedCommandRunner::new();
    let mut terminal = ScriptedTerminal::new(WIDTH, HEIGHT).chars("2r");

    let mut controller = Controller::new(&config, &store, &runner, false);
    controller.run(&mut terminal).expect("run");

    let frame = terminal.last_frame();
    assert_eq!(frame.row(0), "inboxctl | Logs (reconcile)");
    assert_eq!(frame.row(2), "first");
    assert_eq!(frame.row(3), "not a record");
    assert_eq!(frame.row(4), "last");
}
