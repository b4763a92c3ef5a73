//! Monitor configuration stored in `<base>/inboxctl.toml`.
//!
//! The file is optional and every field has a default. [`load_config`] resolves
//! it against a base directory into an immutable [`Config`] that is passed to
//! every component; nothing reads paths from globals.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::diagnostics::Thresholds;
use crate::io::paths::PipelinePaths;

/// On-disk TOML shape. Missing fields default to the values below.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConfigFile {
    /// Purchase list used by `status collection`.
    pub collection_file: Option<PathBuf>,
    pub diagnostics: DiagnosticsSection,
    pub commands: CommandsSection,
    pub services: ServicesSection,
    pub ui: UiSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiagnosticsSection {
    /// A pipeline log untouched for longer than this is reported stale.
    pub log_stale_secs: u64,
    /// A job sitting in `in_progress` longer than this is reported stuck.
    pub job_stuck_secs: u64,
}

impl Default for DiagnosticsSection {
    fn default() -> Self {
        Self {
            log_stale_secs: 3600,
            job_stuck_secs: 30 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandsSection {
    /// Defaults to `<base>/bin/reconcile.sh`.
    pub reconcile: Option<PathBuf>,
    /// Defaults to `<base>/bin/worker.sh`.
    pub worker_once: Option<PathBuf>,
    pub timeout_secs: u64,
    /// Captured stdout/stderr beyond this many bytes is discarded.
    pub output_limit_bytes: usize,
}

impl Default for CommandsSection {
    fn default() -> Self {
        Self {
            reconcile: None,
            worker_once: None,
            timeout_secs: 30 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServicesSection {
    pub reconcile_timer: String,
    pub worker_path_unit: String,
    /// Units reported by `status services`.
    pub status_units: Vec<String>,
    pub query_timeout_secs: u64,
}

impl Default for ServicesSection {
    fn default() -> Self {
        Self {
            reconcile_timer: "bandcamp-sync-reconcile.timer".to_string(),
            worker_path_unit: "bandcamp-sync-worker.path".to_string(),
            status_units: vec![
                "bandcamp-sync-reconcile.service".to_string(),
                "bandcamp-sync-worker.service".to_string(),
                "bandcamp-sync.path".to_string(),
                "bandcamp-sync-worker.path".to_string(),
            ],
            query_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UiSection {
    /// Input wait per tick; also the refresh period when idle.
    pub tick_ms: u64,
    /// Poll interval of `follow` when no new line is available.
    pub follow_interval_ms: u64,
}

impl Default for UiSection {
    fn default() -> Self {
        Self {
            tick_ms: 200,
            follow_interval_ms: 500,
        }
    }
}

impl ConfigFile {
    pub fn validate(&self) -> Result<()> {
        if self.diagnostics.log_stale_secs == 0 {
            return Err(anyhow!("diagnostics.log_stale_secs must be > 0"));
        }
        if self.diagnostics.job_stuck_secs == 0 {
            return Err(anyhow!("diagnostics.job_stuck_secs must be > 0"));
        }
        if self.commands.timeout_secs == 0 {
            return Err(anyhow!("commands.timeout_secs must be > 0"));
        }
        if self.commands.output_limit_bytes == 0 {
            return Err(anyhow!("commands.output_limit_bytes must be > 0"));
        }
        if self.services.query_timeout_secs == 0 {
            return Err(anyhow!("services.query_timeout_secs must be > 0"));
        }
        if self.services.reconcile_timer.trim().is_empty()
            || self.services.worker_path_unit.trim().is_empty()
        {
            return Err(anyhow!("services unit names must be non-empty"));
        }
        if self.ui.tick_ms == 0 || self.ui.follow_interval_ms == 0 {
            return Err(anyhow!("ui intervals must be > 0"));
        }
        Ok(())
    }
}

/// External executables triggered from the Actions view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandsConfig {
    pub reconcile: PathBuf,
    pub worker_once: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicesConfig {
    pub reconcile_timer: String,
    pub worker_path_unit: String,
    pub status_units: Vec<String>,
    pub query_timeout: Duration,
}

/// Resolved, immutable configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub paths: PipelinePaths,
    pub thresholds: Thresholds,
    pub commands: CommandsConfig,
    pub services: ServicesConfig,
    pub collection_path: PathBuf,
    pub tick: Duration,
    pub follow_interval: Duration,
}

impl Config {
    /// Resolve a parsed file against `base`. Relative paths in the file are
    /// taken relative to `base`.
    pub fn resolve(base: &Path, file: ConfigFile) -> Result<Self> {
        file.validate()?;
        let paths = PipelinePaths::new(base);
        let relative = |path: PathBuf| {
            if path.is_absolute() {
                path
            } else {
                base.join(path)
            }
        };
        Ok(Self {
            commands: CommandsConfig {
                reconcile: file
                    .commands
                    .reconcile
                    .map_or_else(|| paths.bin_dir.join("reconcile.sh"), &relative),
                worker_once: file
                    .commands
                    .worker_once
                    .map_or_else(|| paths.bin_dir.join("worker.sh"), &relative),
                timeout: Duration::from_secs(file.commands.timeout_secs),
                output_limit_bytes: file.commands.output_limit_bytes,
            },
            thresholds: Thresholds {
                log_stale: Duration::from_secs(file.diagnostics.log_stale_secs),
                job_stuck: Duration::from_secs(file.diagnostics.job_stuck_secs),
            },
            services: ServicesConfig {
                reconcile_timer: file.services.reconcile_timer,
                worker_path_unit: file.services.worker_path_unit,
                status_units: file.services.status_units,
                query_timeout: Duration::from_secs(file.services.query_timeout_secs),
            },
            collection_path: file
                .collection_file
                .map_or_else(|| paths.default_collection_path(), &relative),
            tick: Duration::from_millis(file.ui.tick_ms),
            follow_interval: Duration::from_millis(file.ui.follow_interval_ms),
            paths,
        })
    }

    /// Defaults for `base` without reading anything from disk.
    pub fn with_defaults(base: &Path) -> Result<Self> {
        Self::resolve(base, ConfigFile::default())
    }
}

/// Load configuration for `base`.
///
/// `explicit` must exist when given. Otherwise `<base>/inboxctl.toml` is used if
/// present and defaults apply when it is missing.
pub fn load_config(base: &Path, explicit: Option<&Path>) -> Result<Config> {
    let default_path = PipelinePaths::new(base).config_path;
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None if default_path.exists() => default_path,
        None => {
            debug!(base = %base.display(), "no config file, using defaults");
            return Config::with_defaults(base);
        }
    };
    let contents = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let file: ConfigFile =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    debug!(path = %path.display(), "config loaded");
    Config::resolve(base, file).with_context(|| format!("invalid config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(temp.path(), None).expect("load");
        assert_eq!(cfg.thresholds, Thresholds::default());
        assert_eq!(cfg.tick, Duration::from_millis(200));
        assert_eq!(cfg.follow_interval, Duration::from_millis(500));
        assert_eq!(cfg.commands.reconcile, temp.path().join("bin/reconcile.sh"));
        assert_eq!(cfg.commands.worker_once, temp.path().join("bin/worker.sh"));
        assert_eq!(cfg.services.status_units.len(), 4);
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            temp.path().join("inboxctl.toml"),
            "collection_file = \"lists/owned.json\"\n\n[diagnostics]\njob_stuck_secs = 60\n\n[commands]\nworker_once = \"/opt/worker\"\n",
        )
        .expect("write");
        let cfg = load_config(temp.path(), None).expect("load");
        assert_eq!(cfg.thresholds.job_stuck, Duration::from_secs(60));
        assert_eq!(cfg.thresholds.log_stale, Duration::from_secs(3600));
        assert_eq!(cfg.commands.worker_once, PathBuf::from("/opt/worker"));
        assert_eq!(cfg.collection_path, temp.path().join("lists/owned.json"));
    }

    #[test]
    fn explicit_path_must_exist() {
        let temp = tempfile::tempdir().expect("tempdir");
        let missing = temp.path().join("nope.toml");
        assert!(load_config(temp.path(), Some(&missing)).is_err());
    }

    #[test]
    fn rejects_zero_tick() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("custom.toml");
        fs::write(&path, "[ui]\ntick_ms = 0\n").expect("write");
        let err = load_config(temp.path(), Some(&path)).expect_err("invalid");
        assert!(format!("{err:#}").contains("ui intervals must be > 0"));
    }

    #[test]
    fn default_file_serializes_to_loadable_toml() {
        let text = toml::to_string_pretty(&ConfigFile::default()).expect("toml");
        let parsed: ConfigFile = toml::from_str(&text).expect("parse");
        assert_eq!(parsed, ConfigFile::default());
    }
}
