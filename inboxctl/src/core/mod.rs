//! Deterministic, pure logic shared by the monitor.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! snapshots and return deterministic outputs suitable for tests.

pub mod collection;
pub mod diagnostics;
pub mod job_id;
pub mod log_line;
pub mod render;
pub mod types;
pub mod view;
