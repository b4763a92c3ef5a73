//! Structured log line grammar.
//!
//! ```text
//! <timestamp> action=<token> job_id=<token-or-dash> detail="<free text>"
//! ```
//!
//! Every pipeline log and the control log share this grammar. Lines that do not
//! match are not errors; they are simply not structured records.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::LogEntry;

/// Placeholder used in the `job_id` field when a record is not about one job.
pub const NO_JOB: &str = "-";

static LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?P<ts>\S+)\s+action=(?P<action>\S+)\s+job_id=(?P<job_id>\S+)\s+detail="(?P<detail>.*)"$"#)
        .unwrap()
});

/// Parse one raw line; `None` when it does not follow the grammar.
///
/// Surrounding whitespace (including a trailing `\r`) is ignored for matching,
/// but `raw` keeps the line as read, minus its line terminator.
pub fn parse_line(line: &str) -> Option<LogEntry> {
    let caps = LINE_RE.captures(line.trim())?;
    Some(LogEntry {
        timestamp: caps["ts"].to_string(),
        action: caps["action"].to_string(),
        job_id: caps["job_id"].to_string(),
        detail: caps["detail"].to_string(),
        raw: line.trim_end_matches(['\n', '\r']).to_string(),
    })
}

/// One audit record for a human-triggered action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRecord {
    pub timestamp: String,
    pub action: String,
    pub job_id: String,
    pub detail: String,
}

impl ControlRecord {
    pub fn new(timestamp: impl Into<String>, action: &str, job_id: &str, detail: &str) -> Self {
        Self {
            timestamp: timestamp.into(),
            action: action.to_string(),
            job_id: job_id.to_string(),
            detail: detail.to_string(),
        }
    }

    /// Render as a single grammar-conforming line (no terminator).
    ///
    /// Tokens cannot contain whitespace, so empty or spaced tokens collapse to
    /// `-` / underscores; line breaks in the detail become spaces.
    pub fn to_line(&self) -> String {
        format!(
            "{} action={} job_id={} detail=\"{}\"",
            token(&self.timestamp),
            token(&self.action),
            token(&self.job_id),
            self.detail.replace(['\r', '\n'], " ")
        )
    }
}

fn token(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return NO_JOB.to_string();
    }
    trimmed
        .chars()
        .map(|ch| if ch.is_whitespace() { '_' } else { ch })
        .collect()
}
