//! Side-effecting adapters: filesystem, child processes, systemd, terminal.

pub mod actions;
pub mod config;
pub mod job_store;
pub mod log_reader;
pub mod paths;
pub mod process;
pub mod services;
pub mod snapshot;
pub mod status;
pub mod terminal;
