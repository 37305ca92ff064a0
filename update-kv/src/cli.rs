///
/// This module implements the CLI interface for update-kv: argument parsing,
/// console progress output, and mapping run outcomes to exit codes.
///
/// All synchronisation logic (substitution, parsing, readiness, reconciliation)
/// lives in the [`update-kv-core`] crate. This module is strictly CLI glue.
///
/// ## How To Use
/// - For command-line users: use the installed `update-kv` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`],
///   or [`run_with_store`] to supply your own store.
///
/// [`update-kv-core`]: ../../update-kv-core/
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use update_kv_core::contract::{KeyAction, KeyOutcome, KeyReport, KvStore, Progress};
use update_kv_core::document::DocumentError;
use update_kv_core::readiness::DEFAULT_TIMEOUT_SECS;
use update_kv_core::synchronise::{synchronise, RunOutcome, SyncError};

use crate::consul::{ConsulClient, DEFAULT_CONSUL_ADDR};
use crate::load_config::{load_config, CliConfig};

/// Update consul KV from a file.
#[derive(Parser, Debug)]
#[command(name = "update-kv", version, about = "Update consul KV from a YAML or JSON file")]
pub struct Cli {
    /// Consider KV file only as YAML
    #[arg(short = 'y', long = "yaml", conflicts_with = "json_only")]
    pub yaml_only: bool,

    /// Consider KV file only as JSON
    #[arg(short = 'j', long = "json")]
    pub json_only: bool,

    /// Comma-separated list of env var names to substitute in KV file as $NAME$
    #[arg(
        short = 's',
        long = "subst",
        visible_alias = "substitute",
        value_name = "VARNAME,...",
        env = "UPDATEKV_VARIABLES"
    )]
    pub subst: Option<String>,

    /// Time in seconds to wait for consul to up
    #[arg(short = 't', long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Overwrite values for existing keys
    #[arg(short = 'f', long = "force", visible_alias = "overwrite")]
    pub overwrite: bool,

    /// Consul HTTP API address
    #[arg(long, env = "CONSUL_HTTP_ADDR", default_value = DEFAULT_CONSUL_ADDR)]
    pub consul_addr: String,

    /// Consul ACL token
    #[arg(long, env = "CONSUL_HTTP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// File containing KV to update (YAML or JSON)
    #[arg(value_name = "FILE")]
    pub kv_file: PathBuf,
}

/// Prints the same progress lines operators know from the shell tooling:
/// a dotted wait line, then one line per key.
pub struct ConsoleProgress<W: Write> {
    out: W,
}

impl<W: Write> ConsoleProgress<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn all_done(&mut self) {
        self.line("All DONE!");
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn partial(&mut self, text: &str) {
        let written = write!(self.out, "{text}").and_then(|()| self.out.flush());
        if let Err(e) = written {
            tracing::debug!(error = %e, "Failed to write progress to console");
        }
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{text}") {
            tracing::debug!(error = %e, "Failed to write progress to console");
        }
    }
}

impl<W: Write> Progress for ConsoleProgress<W> {
    fn waiting(&mut self, timeout: Duration) {
        self.partial(&format!(
            "Waiting for consul to up (for max {} seconds)..",
            timeout.as_secs()
        ));
    }

    fn heartbeat(&mut self) {
        self.partial(".");
    }

    fn ready(&mut self) {
        self.line("consul is up!");
    }

    fn timed_out(&mut self) {
        self.line("FAIL!");
    }

    fn key_started(&mut self, key: &str, action: KeyAction) {
        match action {
            KeyAction::Create => self.partial(&format!("Creating key '{key}'...")),
            KeyAction::Overwrite => self.partial(&format!("Updating key '{key}'...")),
        }
    }

    fn key_finished(&mut self, report: &KeyReport) {
        let line = match &report.outcome {
            KeyOutcome::Created | KeyOutcome::Updated => "DONE".to_owned(),
            KeyOutcome::Skipped => format!("Skipping key '{}' as it exists", report.key),
            KeyOutcome::Failed {
                action: Some(_),
                error,
            } => format!("FAILED ({error})"),
            KeyOutcome::Failed {
                action: None,
                error,
            } => format!("Reading key '{}'...FAILED ({error})", report.key),
        };
        self.line(&line);
    }
}

/// Runs the pipeline against `store` and reports the outcome on the console.
pub async fn run_with_store<S, W>(
    config: &CliConfig,
    store: &S,
    progress: &mut ConsoleProgress<W>,
) -> RunOutcome
where
    S: KvStore + ?Sized,
    W: Write,
{
    match synchronise(&config.sync, &config.raw, store, progress).await {
        Ok(report) => {
            if report.has_failures() {
                eprintln!(
                    "Error: {} of {} keys could not be updated",
                    report.failed(),
                    report.keys.len()
                );
            } else {
                progress.all_done();
            }
            tracing::info!(
                created = report.created(),
                updated = report.updated(),
                skipped = report.skipped(),
                failed = report.failed(),
                "Synchronisation complete"
            );
            report.run_outcome()
        }
        Err(SyncError::Document(e @ DocumentError::Unparsable { .. })) => {
            eprintln!("Error: file '{}' {e}", config.kv_file.display());
            RunOutcome::ParseFailure
        }
        Err(e) => {
            eprintln!("Error: {e}");
            e.outcome()
        }
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> RunOutcome {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            eprintln!("Error: {e:#}");
            return RunOutcome::UsageFailure;
        }
    };

    let store = match ConsulClient::new(&config.consul) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "Failed to construct consul client");
            eprintln!("Error: {e}");
            return RunOutcome::UsageFailure;
        }
    };

    let mut progress = ConsoleProgress::new(std::io::stdout());
    let outcome = run_with_store(&config, &store, &mut progress).await;
    tracing::info!(?outcome, exit_code = outcome.exit_code(), "update-kv finished");

    // For CLI/test parity: explicit process exit only in main(), not in run()
    outcome
}
