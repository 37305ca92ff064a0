use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use update_kv::cli::{run, Cli};

/// Keeps the process alive across terminal hangups and closed pipes while it
/// waits on consul.
#[cfg(unix)]
fn ignore_signals() {
    use nix::sys::signal::{signal, SigHandler, Signal};

    for sig in [Signal::SIGHUP, Signal::SIGPIPE, Signal::SIGCHLD] {
        // SAFETY: SIG_IGN installs no handler code, and no other thread exists yet.
        if let Err(e) = unsafe { signal(sig, SigHandler::SigIgn) } {
            tracing::warn!(signal = ?sig, error = %e, "Failed to ignore signal");
        }
    }
}

#[cfg(not(unix))]
fn ignore_signals() {}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing for the CLI; stdout is reserved for progress output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    ignore_signals();

    let cli = Cli::parse();
    tracing::info!("CLI arguments parsed, invoking run");
    let outcome = run(cli).await;
    match outcome.exit_code() {
        0 => tracing::info!("CLI completed successfully"),
        code => tracing::error!(?outcome, code, "CLI exited with error"),
    }
    ExitCode::from(outcome.exit_code())
}
