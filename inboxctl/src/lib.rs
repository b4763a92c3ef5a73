//! Monitoring and control for a directory-based download pipeline.
//!
//! Jobs live as files in four queue directories and progress is recorded in
//! append-only logs. This crate observes both, derives health warnings, and
//! lets an operator trigger a small set of confirmed actions. The architecture
//! enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (log grammar, diagnostics rules,
//!   view state machine, frame layout). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (queue directories, logs, child
//!   processes, systemd, terminal). Behind traits where tests need fakes.
//!
//! [`tui`] coordinates core logic with I/O to drive the interactive views; the
//! binary adds one-shot status commands on top of the same pieces.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tui;
