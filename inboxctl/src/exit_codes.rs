//! Stable exit codes for inboxctl commands.

/// Command succeeded; for `warnings`, no rule fired.
pub const OK: i32 = 0;
/// Command failed due to invalid arguments, config, or I/O errors.
pub const INVALID: i32 = 1;
/// `inboxctl warnings` found at least one warning.
pub const WARNINGS: i32 = 2;
