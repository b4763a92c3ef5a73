//! Read-only probe of the user-level systemd units driving the pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Serialize, Serializer};
use tracing::debug;

use crate::io::process::{CommandRunner, ExecResult};

const SYSTEMCTL: &str = "systemctl";

/// Synthesized unit state from `systemctl show`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceState {
    Active,
    Failed,
    NotFound,
    /// Any other `ActiveState` value, e.g. `inactive` or `activating`.
    Other(String),
    Unknown,
    /// systemctl could not be run at all.
    Error(String),
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Active => f.write_str("active"),
            ServiceState::Failed => f.write_str("failed"),
            ServiceState::NotFound => f.write_str("not-found"),
            ServiceState::Other(state) => f.write_str(state),
            ServiceState::Unknown => f.write_str("unknown"),
            ServiceState::Error(err) => write!(f, "error: {err}"),
        }
    }
}

impl Serialize for ServiceState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parse `Key=Value` lines from `systemctl show`.
pub fn parse_show(stdout: &str) -> ServiceState {
    let mut active = None;
    let mut load = None;
    for line in stdout.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            "ActiveState" => active = Some(value.trim()),
            "LoadState" => load = Some(value.trim()),
            _ => {}
        }
    }
    if load == Some("not-found") {
        return ServiceState::NotFound;
    }
    match active {
        Some("active") => ServiceState::Active,
        Some("failed") => ServiceState::Failed,
        Some(other) => ServiceState::Other(other.to_string()),
        None => ServiceState::Unknown,
    }
}

/// Issues systemctl queries through a [`CommandRunner`].
pub struct ServiceProbe<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    timeout: Duration,
}

impl<'a, R: CommandRunner + ?Sized> ServiceProbe<'a, R> {
    pub fn new(runner: &'a R, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    fn systemctl(&self, args: &[&str]) -> ExecResult {
        debug!(?args, "querying systemctl");
        self.runner.run(Path::new(SYSTEMCTL), args, self.timeout)
    }

    pub fn list_timers(&self, timer: &str) -> ExecResult {
        self.systemctl(&["--user", "list-timers", timer, "--no-pager"])
    }

    pub fn unit_status(&self, unit: &str) -> ExecResult {
        self.systemctl(&["--user", "status", unit, "--no-pager"])
    }

    pub fn unit_state(&self, unit: &str) -> ServiceState {
        let result = self.systemctl(&[
            "--user",
            "show",
            unit,
            "--property=ActiveState,SubState,LoadState",
        ]);
        if result.exit_code.is_none() && result.stdout.trim().is_empty() {
            return ServiceState::Error(result.stderr.trim().to_string());
        }
        parse_show(&result.stdout)
    }

    pub fn unit_states(&self, units: &[String]) -> BTreeMap<String, ServiceState> {
        units
            .iter()
            .map(|unit| (unit.clone(), self.unit_state(unit)))
            .collect()
    }
}

/// First `n` stdout lines on success, otherwise the error text as one line.
pub fn display_lines(result: &ExecResult, n: usize) -> Vec<String> {
    if result.ok {
        result
            .stdout
            .lines()
            .take(n)
            .map(|line| line.trim_end().to_string())
            .collect()
    } else {
        vec![result.stderr.trim().to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakeRunner {
        result: ExecResult,
        calls: RefCell<Vec<Vec<String>>>,
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, program: &Path, args: &[&str], _timeout: Duration) -> ExecResult {
            let mut call = vec![program.display().to_string()];
            call.extend(args.iter().map(|arg| (*arg).to_string()));
            self.calls.borrow_mut().push(call);
            self.result.clone()
        }
    }

    fn ok(stdout: &str) -> ExecResult {
        ExecResult {
            ok: true,
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    #[test]
    fn parse_show_synthesizes_state() {
        assert_eq!(
            parse_show("ActiveState=active\nSubState=running\nLoadState=loaded\n"),
            ServiceState::Active
        );
        assert_eq!(
            parse_show("ActiveState=inactive\nLoadState=not-found\n"),
            ServiceState::NotFound
        );
        assert_eq!(parse_show("ActiveState=failed\n"), ServiceState::Failed);
        assert_eq!(
            parse_show("ActiveState=activating\n"),
            ServiceState::Other("activating".to_string())
        );
        assert_eq!(parse_show(""), ServiceState::Unknown);
    }

    #[test]
    fn missing_systemctl_becomes_error_state() {
        let runner = FakeRunner {
            result: ExecResult::failed("systemctl not found"),
            calls: RefCell::new(Vec::new()),
        };
        let probe = ServiceProbe::new(&runner, Duration::from_secs(1));
        let state = probe.unit_state("x.service");
        assert_eq!(state, ServiceState::Error("systemctl not found".to_string()));
        assert_eq!(state.to_string(), "error: systemctl not found");
        assert_eq!(
            display_lines(&probe.list_timers("t.timer"), 3),
            vec!["systemctl not found".to_string()]
        );
    }

    #[test]
    fn issues_user_scoped_queries() {
        let runner = FakeRunner {
            result: ok("l1\nl2\nl3\nl4\n"),
            calls: RefCell::new(Vec::new()),
        };
        let probe = ServiceProbe::new(&runner, Duration::from_secs(1));
        assert_eq!(display_lines(&probe.unit_status("w.path"), 3).len(), 3);
        probe.list_timers("r.timer");
        let calls = runner.calls.borrow();
        assert_eq!(
            calls[0],
            vec!["systemctl", "--user", "status", "w.path", "--no-pager"]
        );
        assert_eq!(
            calls[1],
            vec!["systemctl", "--user", "list-timers", "r.timer", "--no-pager"]
        );
    }

    #[test]
    fn states_serialize_as_strings() {
        let runner = FakeRunner {
            result: ok("ActiveState=active\n"),
            calls: RefCell::new(Vec::new()),
        };
        let probe = ServiceProbe::new(&runner, Duration::from_secs(1));
        let states = probe.unit_states(&["a.service".to_string()]);
        let json = serde_json::to_string(&states).expect("json");
        assert_eq!(json, r#"{"a.service":"active"}"#);
    }
}
