//! Monitor and control a directory-based download pipeline.
//!
//! Without a subcommand the interactive interface starts. The other commands
//! print one-shot reports for scripts and cron jobs.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;

use inboxctl::core::job_id::job_id_for_url;
use inboxctl::core::types::LogChannel;
use inboxctl::exit_codes;
use inboxctl::io::config::{Config, load_config};
use inboxctl::io::job_store::FsJobStore;
use inboxctl::io::log_reader::{follow, tail};
use inboxctl::io::paths::default_base;
use inboxctl::io::process::SystemCommandRunner;
use inboxctl::io::services::ServiceProbe;
use inboxctl::io::snapshot::current_warnings;
use inboxctl::io::status::{
    DEFAULT_LOG_LINES, collection_status, logs_status, queue_status,
};
use inboxctl::io::terminal::CrosstermTerminal;
use inboxctl::logging;
use inboxctl::tui::Controller;

#[derive(Parser)]
#[command(
    name = "inboxctl",
    version,
    about = "Monitor and control the download job pipeline"
)]
struct Cli {
    /// Pipeline base directory (defaults to $HOME/BandcampSync/Sync).
    #[arg(long, env = "INBOXCTL_BASE", global = true)]
    base: Option<PathBuf>,
    /// Config file (defaults to <base>/inboxctl.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive queue, log, action, and dashboard views.
    Tui {
        /// Observe only: Actions view disabled, start on the Dashboard.
        #[arg(long)]
        dashboard_only: bool,
    },
    /// Shorthand for `tui --dashboard-only`.
    Dashboard,
    /// Evaluate diagnostics once; exit code 2 when any warning fires.
    Warnings {
        #[arg(long)]
        json: bool,
    },
    /// Print a JSON status report.
    Status {
        #[command(subcommand)]
        report: StatusReport,
    },
    /// Print the last lines of a log.
    Tail {
        channel: LogChannel,
        #[arg(short = 'n', long = "lines", default_value_t = DEFAULT_LOG_LINES)]
        lines: usize,
    },
    /// Stream lines appended to a log until interrupted.
    Follow { channel: LogChannel },
    /// Print the job id derived from a URL.
    JobId { url: String },
}

#[derive(Subcommand)]
enum StatusReport {
    /// Queue counts and the job currently in progress.
    Queue,
    /// Last lines of every log.
    Logs {
        #[arg(short = 'n', long = "lines", default_value_t = DEFAULT_LOG_LINES)]
        lines: usize,
    },
    /// Purchase list annotated with queue state.
    Collection,
    /// Synthesized state of the pipeline's systemd units.
    Services,
}

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let base = cli.base.unwrap_or_else(default_base);
    let command = cli.command.unwrap_or(Command::Tui {
        dashboard_only: false,
    });

    if let Command::JobId { url } = &command {
        logging::init();
        return cmd_job_id(url);
    }

    let interactive = matches!(command, Command::Tui { .. } | Command::Dashboard);
    if !interactive {
        logging::init();
    }
    let config = load_config(&base, cli.config.as_deref())?;
    debug!(base = %base.display(), "config resolved");

    match command {
        Command::Tui { dashboard_only } => cmd_tui(&config, dashboard_only),
        Command::Dashboard => cmd_tui(&config, true),
        Command::Warnings { json } => cmd_warnings(&config, json),
        Command::Status { report } => cmd_status(&config, report),
        Command::Tail { channel, lines } => cmd_tail(&config, channel, lines),
        Command::Follow { channel } => cmd_follow(&config, channel),
        Command::JobId { url } => cmd_job_id(&url),
    }
}

fn runner(config: &Config) -> SystemCommandRunner {
    SystemCommandRunner {
        output_limit_bytes: config.commands.output_limit_bytes,
    }
}

fn cmd_tui(config: &Config, dashboard_only: bool) -> Result<i32> {
    logging::init_file(&config.paths.trace_log_path)?;
    let store = FsJobStore::new(config.paths.clone());
    let runner = runner(config);
    let mut terminal = CrosstermTerminal::enter()?;
    Controller::new(config, &store, &runner, dashboard_only).run(&mut terminal)?;
    Ok(exit_codes::OK)
}

fn cmd_warnings(config: &Config, json: bool) -> Result<i32> {
    let store = FsJobStore::new(config.paths.clone());
    let warnings = current_warnings(&store, &config.paths, &config.thresholds);
    if json {
        print_json(&warnings)?;
    } else if warnings.is_empty() {
        println!("no warnings");
    } else {
        for warning in &warnings {
            println!("{}: {}", warning.code, warning.message);
        }
    }
    Ok(if warnings.is_empty() {
        exit_codes::OK
    } else {
        exit_codes::WARNINGS
    })
}

fn cmd_status(config: &Config, report: StatusReport) -> Result<i32> {
    let store = FsJobStore::new(config.paths.clone());
    match report {
        StatusReport::Queue => print_json(&queue_status(&store))?,
        StatusReport::Logs { lines } => print_json(&logs_status(&config.paths, lines))?,
        StatusReport::Collection => {
            print_json(&collection_status(&store, &config.collection_path))?;
        }
        StatusReport::Services => {
            let runner = runner(config);
            let probe = ServiceProbe::new(&runner, config.services.query_timeout);
            print_json(&probe.unit_states(&config.services.status_units))?;
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_tail(config: &Config, channel: LogChannel, lines: usize) -> Result<i32> {
    let mut out = io::stdout().lock();
    for line in tail(&config.paths.log_path(channel), lines) {
        writeln!(out, "{line}").context("write stdout")?;
    }
    Ok(exit_codes::OK)
}

fn cmd_follow(config: &Config, channel: LogChannel) -> Result<i32> {
    let follower = follow(&config.paths.log_path(channel), config.follow_interval)?;
    let mut out = io::stdout().lock();
    for line in follower {
        writeln!(out, "{line}").context("write stdout")?;
        out.flush().context("flush stdout")?;
    }
    Ok(exit_codes::OK)
}

fn cmd_job_id(url: &str) -> Result<i32> {
    let Some(id) = job_id_for_url(url) else {
        bail!("URL is empty after canonicalization: {url:?}");
    };
    println!("{id}");
    Ok(exit_codes::OK)
}

/// Pretty-printed JSON with trailing newline on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_tui() {
        let cli = Cli::parse_from(["inboxctl"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn parse_dashboard_only_flag() {
        let cli = Cli::parse_from(["inboxctl", "tui", "--dashboard-only"]);
        assert!(matches!(
            cli.command,
            Some(Command::Tui {
                dashboard_only: true
            })
        ));
    }

    #[test]
    fn parse_tail_channel_and_count() {
        let cli = Cli::parse_from(["inboxctl", "--base", "/srv/sync", "tail", "ctl", "-n", "5"]);
        assert_eq!(cli.base, Some(PathBuf::from("/srv/sync")));
        assert!(matches!(
            cli.command,
            Some(Command::Tail {
                channel: LogChannel::Ctl,
                lines: 5
            })
        ));
    }

    #[test]
    fn parse_status_logs_default_lines() {
        let cli = Cli::parse_from(["inboxctl", "status", "logs"]);
        assert!(matches!(
            cli.command,
            Some(Command::Status {
                report: StatusReport::Logs { lines: 20 }
            })
        ));
    }

    #[test]
    fn rejects_unknown_channel() {
        assert!(Cli::try_parse_from(["inboxctl", "follow", "nope"]).is_err());
    }
}
