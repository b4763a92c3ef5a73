//! Pure frame composition for the interactive views.
//!
//! The controller gathers a [`ScreenModel`] each tick; [`render`] lays it out
//! into a [`Frame`] of plain text rows sized to the terminal. Nothing here
//! touches the terminal, so layouts are asserted directly in tests.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::core::types::{LogChannel, Queue, QueueCounts, Warning};
use crate::core::view::View;

const ELLIPSIS: &str = "...";
const MIN_LEFT_WIDTH: usize = 30;
const DETAIL_CONTENT_LINES: usize = 4;
const DASHBOARD_WARNINGS: usize = 4;

/// Frame dimensions in terminal cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: usize,
    pub height: usize,
}

/// Rendered rows; never more than `size.height` rows or `size.width` cells per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub size: FrameSize,
    pub rows: Vec<String>,
}

impl Frame {
    fn blank(size: FrameSize) -> Self {
        Self {
            size,
            rows: vec![String::new(); size.height],
        }
    }

    fn put(&mut self, y: usize, text: &str) {
        if let Some(row) = self.rows.get_mut(y) {
            *row = clip(text, self.size.width);
        }
    }

    pub fn row(&self, y: usize) -> &str {
        self.rows.get(y).map_or("", String::as_str)
    }

    /// Rows joined by newlines with trailing blanks removed, for assertions.
    pub fn snapshot(&self) -> String {
        let mut out: Vec<&str> = self.rows.iter().map(|row| row.trim_end()).collect();
        while out.last().is_some_and(|row| row.is_empty()) {
            out.pop();
        }
        out.join("\n")
    }
}

/// Terminal cells occupied by `text`; wide CJK and emoji graphemes count as two.
pub fn display_width(text: &str) -> usize {
    UnicodeWidthStr::width(text)
}

/// Truncate to `width` terminal cells, marking the cut with an ellipsis.
///
/// Control characters (tabs from log output, stray escapes) become spaces so a
/// row never moves the cursor. Graphemes are never split.
pub fn clip(text: &str, width: usize) -> String {
    let clean: String = text
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect();
    if display_width(&clean) <= width {
        return clean;
    }
    let budget = if width <= ELLIPSIS.len() {
        width
    } else {
        width - ELLIPSIS.len()
    };
    let mut cut = String::new();
    let mut used = 0;
    for grapheme in clean.graphemes(true) {
        let cells = display_width(grapheme);
        if used + cells > budget {
            break;
        }
        cut.push_str(grapheme);
        used += cells;
    }
    if width > ELLIPSIS.len() {
        cut.push_str(ELLIPSIS);
    }
    cut
}

/// `text` followed by spaces up to `width` cells.
fn pad_to(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(display_width(text));
    format!("{text}{}", " ".repeat(fill))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRow {
    pub job_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDetail {
    pub job_id: String,
    pub queue: Queue,
    pub url: String,
    pub contents: Vec<String>,
    /// Raw worker-log lines mentioning the job, oldest first.
    pub history: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePane {
    pub queue: Queue,
    pub jobs: Vec<JobRow>,
    pub selected: usize,
    pub detail: Option<JobDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogsPane {
    pub channel: LogChannel,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionsPane {
    pub message: Option<String>,
    /// `<queue> <job_id> <url>` of the Queue view selection.
    pub selection: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardPane {
    pub timer: Vec<String>,
    pub path_unit: Vec<String>,
    pub last_activity: Option<String>,
    pub last_download: Option<String>,
    pub warnings: Vec<Warning>,
    pub recent: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Queue(QueuePane),
    Logs(LogsPane),
    Actions(ActionsPane),
    Dashboard(DashboardPane),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenModel {
    pub view: View,
    pub counts: QueueCounts,
    pub body: Body,
    pub prompt: Option<String>,
    pub dashboard_only: bool,
}

/// Rows available to a view body: everything between the header gap and footer.
pub fn body_rows(size: FrameSize) -> usize {
    size.height.saturating_sub(3)
}

pub fn render(model: &ScreenModel, size: FrameSize) -> Frame {
    let mut frame = Frame::blank(size);
    if size.height == 0 || size.width == 0 {
        return frame;
    }

    frame.put(0, &header(model));

    let lines = match &model.body {
        Body::Queue(pane) => queue_lines(pane, size),
        Body::Logs(pane) => tail_to_fit(&pane.lines, body_rows(size)),
        Body::Actions(pane) => actions_lines(pane),
        Body::Dashboard(pane) => dashboard_lines(model.counts, pane),
    };
    for (offset, line) in lines.iter().take(body_rows(size)).enumerate() {
        frame.put(2 + offset, line);
    }

    if size.height >= 2 {
        if let Some(prompt) = &model.prompt {
            frame.put(size.height - 2, &format!("{prompt} (y/n)"));
        }
        frame.put(size.height - 1, &footer(model));
    }
    frame
}

fn header(model: &ScreenModel) -> String {
    match &model.body {
        Body::Queue(_) => format!("inboxctl | Queue | {}", model.counts.summary()),
        Body::Logs(pane) => format!("inboxctl | Logs ({})", pane.channel),
        Body::Actions(_) => "inboxctl | Actions (explicit, confirmed)".to_string(),
        Body::Dashboard(_) if model.dashboard_only => {
            "inboxctl | Dashboard (read-only)".to_string()
        }
        Body::Dashboard(_) => "inboxctl | Dashboard".to_string(),
    }
}

fn footer(model: &ScreenModel) -> String {
    let views = if model.dashboard_only {
        "1=Queue 2=Logs 4=Dashboard"
    } else {
        "1=Queue 2=Logs 3=Actions 4=Dashboard"
    };
    let local = match model.view {
        View::Queue => "p/i/f/d switch queue | Up/Down select",
        View::Logs => "w/r/e/c choose log",
        View::Actions => "r/w/t/e act | confirm with y/n",
        View::Dashboard if model.dashboard_only => "observe only",
        View::Dashboard => "a=actions",
    };
    format!("Keys: {views} | {local} | q=quit")
}

fn queue_lines(pane: &QueuePane, size: FrameSize) -> Vec<String> {
    let rows = body_rows(size);
    let mut left = vec![format!("Queue: {}", pane.queue)];
    if pane.jobs.is_empty() {
        left.push("  (empty)".to_string());
    }
    // Scroll so the cursor stays visible when the list is taller than the pane.
    let visible = rows.saturating_sub(1).max(1);
    let first = pane.selected.saturating_sub(visible - 1);
    for (i, job) in pane.jobs.iter().enumerate().skip(first).take(visible) {
        let marker = if i == pane.selected { "> " } else { "  " };
        left.push(format!("{marker}{} {}", job.job_id, job.url));
    }

    let mut right = Vec::new();
    if let Some(detail) = &pane.detail {
        right.push(format!("Job: {}", detail.job_id));
        right.push(format!("Queue: {}", detail.queue));
        right.push(format!("URL: {}", detail.url));
        right.push(String::new());
        right.push("Contents:".to_string());
        right.extend(
            detail
                .contents
                .iter()
                .take(DETAIL_CONTENT_LINES)
                .map(|line| format!("  {line}")),
        );
        right.push(String::new());
        right.push("History:".to_string());
        if detail.history.is_empty() {
            right.push("  (no worker log entries)".to_string());
        }
        right.extend(detail.history.iter().map(|line| format!("  {line}")));
    }

    let left_width = MIN_LEFT_WIDTH.max(size.width / 2);
    if left_width + 2 >= size.width {
        return left;
    }
    columns(&left, &right, left_width, size.width)
}

/// Place two line lists side by side; the left one is clipped to `left_width - 1`.
fn columns(left: &[String], right: &[String], left_width: usize, width: usize) -> Vec<String> {
    let right_width = width - left_width - 1;
    (0..left.len().max(right.len()))
        .map(|i| {
            let l = left.get(i).map_or(String::new(), |line| clip(line, left_width - 1));
            let r = right.get(i).map_or(String::new(), |line| clip(line, right_width));
            if r.is_empty() {
                l
            } else {
                format!("{}{r}", pad_to(&l, left_width + 1))
            }
        })
        .collect()
}

fn tail_to_fit(lines: &[String], rows: usize) -> Vec<String> {
    lines[lines.len().saturating_sub(rows)..].to_vec()
}

fn actions_lines(pane: &ActionsPane) -> Vec<String> {
    let mut lines = vec![
        "Actions:".to_string(),
        "  r  Run reconcile once".to_string(),
        "  w  Process ONE job (worker)".to_string(),
        "  t  Retry failed job (selected job in failed queue)".to_string(),
        "  e  Requeue job (selected job in in_progress/failed)".to_string(),
        String::new(),
    ];
    if let Some(message) = &pane.message {
        lines.push(format!("Last action: {message}"));
    }
    lines.push(String::new());
    lines.push("Selection:".to_string());
    lines.push(match &pane.selection {
        Some(selection) => format!("  {selection}"),
        None => "  (no job selected)".to_string(),
    });
    lines
}

fn dashboard_lines(counts: QueueCounts, pane: &DashboardPane) -> Vec<String> {
    let mut lines = vec![format!("Queues: {}", counts.summary()), String::new()];

    lines.push("Reconcile timer:".to_string());
    lines.extend(pane.timer.iter().take(3).map(|line| format!("  {line}")));
    lines.push("Worker path unit:".to_string());
    lines.extend(pane.path_unit.iter().take(3).map(|line| format!("  {line}")));
    lines.push(String::new());

    lines.push(format!(
        "Last activity: {}",
        pane.last_activity.as_deref().unwrap_or("(no structured log entries)")
    ));
    lines.push(format!(
        "Last successful download: {}",
        pane.last_download
            .as_deref()
            .unwrap_or("(no successful downloads yet)")
    ));
    lines.push(String::new());

    lines.push(format!("Warnings ({}):", pane.warnings.len()));
    if pane.warnings.is_empty() {
        lines.push("  (none)".to_string());
    }
    lines.extend(
        pane.warnings
            .iter()
            .take(DASHBOARD_WARNINGS)
            .map(|w| format!("  {}: {}", w.code, w.message)),
    );
    lines.push(String::new());

    lines.push("Recent activity:".to_string());
    lines.extend(pane.recent.iter().map(|line| format!("  {line}")));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::WarningCode;

    const SIZE: FrameSize = FrameSize {
        width: 80,
        height: 24,
    };

    fn model(view: View, body: Body) -> ScreenModel {
        ScreenModel {
            view,
            counts: QueueCounts {
                pending: 2,
                in_progress: 1,
                failed: 0,
                done: 7,
            },
            body,
            prompt: None,
            dashboard_only: false,
        }
    }

    fn queue_pane(jobs: usize, selected: usize) -> QueuePane {
        QueuePane {
            queue: Queue::Pending,
            jobs: (0..jobs)
                .map(|i| JobRow {
                    job_id: format!("job{i:02}"),
                    url: format!("https://a.test/{i}"),
                })
                .collect(),
            selected,
            detail: None,
        }
    }

    #[test]
    fn clip_marks_truncation() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("exactly-10", 10), "exactly-10");
        assert_eq!(clip("this line is too long", 10), "this li...");
        assert_eq!(clip("abcdef", 3), "abc");
        assert_eq!(clip("a\tb", 10), "a b");
    }

    #[test]
    fn clip_counts_wide_characters_as_two_cells() {
        let title = format!("  {} https://band.camp/album/x", "坂本龍一の音楽アルバム".repeat(3));
        let clipped = clip(&title, 60);
        assert!(display_width(&clipped) <= 60);
        assert!(clipped.ends_with("..."));
        // A 9-cell budget fits 4 wide glyphs; the fifth is not split.
        assert_eq!(clip("坂本龍一の音楽", 12), "坂本龍一...");
        assert_eq!(clip("坂本龍一の音楽", 13), "坂本龍一の...");
        assert_eq!(clip("坂本龍一の音楽", 14), "坂本龍一の音楽");
        assert_eq!(clip("😀😀", 3), "😀");
        assert_eq!(display_width("坂本"), 4);
    }

    #[test]
    fn queue_columns_align_by_cells_with_wide_urls() {
        let mut pane = queue_pane(0, 0);
        pane.jobs = vec![
            JobRow {
                job_id: "aaa".to_string(),
                url: "https://band.camp/坂本龍一".to_string(),
            },
            JobRow {
                job_id: "bbb".to_string(),
                url: "https://band.camp/x".to_string(),
            },
        ];
        pane.detail = Some(JobDetail {
            job_id: "aaa".to_string(),
            queue: Queue::Pending,
            url: "https://band.camp/坂本龍一".to_string(),
            contents: Vec::new(),
            history: Vec::new(),
        });
        let frame = render(&model(View::Queue, Body::Queue(pane)), SIZE);
        // Left column is 40 cells wide plus one gap cell.
        let row = frame.row(3);
        assert!(row.starts_with("> aaa https://band.camp/坂本龍一"));
        let at = row.find("Queue: pending").expect("detail column");
        assert_eq!(display_width(&row[..at]), 41);
        assert!(frame.rows.iter().all(|row| display_width(row) <= SIZE.width));
    }

    #[test]
    fn every_row_fits_the_frame() {
        let long = "x".repeat(500);
        let pane = LogsPane {
            channel: LogChannel::Worker,
            lines: vec![long; 50],
        };
        let size = FrameSize {
            width: 40,
            height: 10,
        };
        let frame = render(&model(View::Logs, Body::Logs(pane)), size);
        assert_eq!(frame.rows.len(), 10);
        assert!(frame.rows.iter().all(|row| display_width(row) <= 40));
        assert!(frame.row(2).ends_with("..."));
    }

    #[test]
    fn queue_view_layout() {
        let mut pane = queue_pane(2, 1);
        pane.detail = Some(JobDetail {
            job_id: "job01".to_string(),
            queue: Queue::Pending,
            url: "https://a.test/1".to_string(),
            contents: vec!["URL=https://a.test/1".to_string()],
            history: Vec::new(),
        });
        let frame = render(&model(View::Queue, Body::Queue(pane)), SIZE);
        assert_eq!(
            frame.row(0),
            "inboxctl | Queue | pending=2 in_progress=1 failed=0 done=7"
        );
        assert!(frame.row(2).starts_with("Queue: pending"));
        assert!(frame.row(2).contains("Job: job01"));
        assert!(frame.row(3).starts_with("  job00 https://a.test/0"));
        assert!(frame.row(4).starts_with("> job01 https://a.test/1"));
        assert!(frame.snapshot().contains("(no worker log entries)"));
        assert!(frame.row(23).starts_with("Keys: 1=Queue 2=Logs 3=Actions"));
    }

    #[test]
    fn queue_view_scrolls_to_keep_cursor_visible() {
        let size = FrameSize {
            width: 40,
            height: 8,
        };
        let frame = render(&model(View::Queue, Body::Queue(queue_pane(20, 15))), size);
        // 5 body rows: the title plus 4 jobs ending at the cursor.
        assert!(frame.row(6).starts_with("> job15"));
        assert!(frame.row(3).starts_with("  job12"));
    }

    #[test]
    fn empty_queue_says_so() {
        let frame = render(&model(View::Queue, Body::Queue(queue_pane(0, 0))), SIZE);
        assert_eq!(frame.row(3).trim(), "(empty)");
    }

    #[test]
    fn logs_view_shows_the_newest_lines_that_fit() {
        let pane = LogsPane {
            channel: LogChannel::Ctl,
            lines: (0..30).map(|i| format!("line {i}")).collect(),
        };
        let frame = render(&model(View::Logs, Body::Logs(pane)), SIZE);
        assert_eq!(frame.row(0), "inboxctl | Logs (ctl)");
        assert_eq!(frame.row(2), "line 9");
        assert_eq!(frame.row(22), "line 29");
    }

    #[test]
    fn prompt_sits_above_footer() {
        let mut m = model(
            View::Actions,
            Body::Actions(ActionsPane {
                message: Some("worker rc=0".to_string()),
                selection: None,
            }),
        );
        m.prompt = Some("Run reconcile now?".to_string());
        let frame = render(&m, SIZE);
        assert_eq!(frame.row(22), "Run reconcile now? (y/n)");
        assert!(frame.snapshot().contains("Last action: worker rc=0"));
        assert!(frame.snapshot().contains("(no job selected)"));
    }

    #[test]
    fn dashboard_lists_warnings_and_fallbacks() {
        let pane = DashboardPane {
            timer: vec!["NEXT LEFT".to_string()],
            path_unit: vec!["error: systemctl not found".to_string()],
            last_activity: None,
            last_download: None,
            warnings: vec![Warning {
                code: WarningCode::WorkerIncomplete,
                message: "last worker_start at t has no matching worker_end".to_string(),
            }],
            recent: vec!["raw line".to_string()],
        };
        let mut m = model(View::Dashboard, Body::Dashboard(pane));
        m.dashboard_only = true;
        let snapshot = render(&m, SIZE).snapshot();
        assert!(snapshot.starts_with("inboxctl | Dashboard (read-only)"));
        assert!(snapshot.contains("  error: systemctl not found"));
        assert!(snapshot.contains("Last successful download: (no successful downloads yet)"));
        assert!(snapshot.contains("  worker_incomplete: last worker_start"));
        assert!(snapshot.contains("Keys: 1=Queue 2=Logs 4=Dashboard | observe only | q=quit"));
    }

    #[test]
    fn tiny_frames_do_not_panic() {
        for (width, height) in [(0, 0), (1, 1), (5, 2), (80, 3)] {
            let size = FrameSize { width, height };
            let frame = render(&model(View::Queue, Body::Queue(queue_pane(3, 2))), size);
            assert_eq!(frame.rows.len(), height);
        }
    }
}
