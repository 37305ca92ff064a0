/// `load_config` module: turns parsed CLI arguments plus the environment into the
/// immutable configuration for one run, and reads the KV file.
///
/// This is the only place where the process environment is consulted for
/// substitution variables; the core receives a ready-made [`SyncConfig`].
///
/// # Errors
/// Failures use `anyhow::Error` for context-rich diagnostics and are surfaced
/// at the CLI boundary. The only failure is an unreadable input file.
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

use update_kv_core::config::SyncConfig;
use update_kv_core::document::FormatMode;
use update_kv_core::readiness::DEFAULT_POLL_INTERVAL;
use update_kv_core::substitute::SubstitutionTable;

use crate::cli::Cli;
use crate::consul::ConsulSettings;

#[derive(Debug)]
pub struct CliConfig {
    pub kv_file: PathBuf,
    /// File contents, before substitution.
    pub raw: String,
    pub sync: SyncConfig,
    pub consul: ConsulSettings,
}

/// Maps the mutually exclusive `--json`/`--yaml` flags to a parser mode.
pub fn format_mode(json_only: bool, yaml_only: bool) -> FormatMode {
    match (json_only, yaml_only) {
        (true, _) => FormatMode::JsonOnly,
        (_, true) => FormatMode::YamlOnly,
        _ => FormatMode::Auto,
    }
}

/// Builds the run configuration without touching the filesystem.
pub fn sync_config(cli: &Cli) -> SyncConfig {
    let substitutions = match cli.subst.as_deref() {
        Some(list) => SubstitutionTable::from_env(SubstitutionTable::parse_names(list)),
        None => SubstitutionTable::new(),
    };

    let config = SyncConfig {
        format: format_mode(cli.json_only, cli.yaml_only),
        substitutions,
        overwrite: cli.overwrite,
        timeout: Duration::from_secs(cli.timeout),
        poll_interval: DEFAULT_POLL_INTERVAL,
    };
    config.trace_loaded();
    config
}

pub fn read_kv_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path_ref = path.as_ref();
    info!(kv_file = ?path_ref, "Reading KV file");

    match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(kv_file = ?path_ref, bytes = content.len(), "KV file read successfully");
            Ok(content)
        }
        Err(e) => {
            error!(error = ?e, kv_file = ?path_ref, "Failed to read KV file");
            Err(e).with_context(|| format!("can't open '{}'", path_ref.display()))
        }
    }
}

/// Reads the KV file and assembles everything a run needs.
pub fn load_config(cli: &Cli) -> Result<CliConfig> {
    let raw = read_kv_file(&cli.kv_file)?;
    Ok(CliConfig {
        kv_file: cli.kv_file.clone(),
        raw,
        sync: sync_config(cli),
        consul: ConsulSettings {
            addr: cli.consul_addr.clone(),
            token: cli.token.clone(),
        },
    })
}
