//! High-level pipeline: substitute → parse → wait for leader → reconcile.
//!
//! This module provides the top-level orchestration for one `update-kv` run:
//!   - Applies the configured `$NAME$` substitutions to the raw document text
//!   - Parses and validates the text into a [`ConfigSet`]
//!   - Waits for the store to report a leader, bounded by the configured timeout
//!   - Reconciles every key and returns a [`SyncReport`]
//!
//! # Error Handling
//! Parse, validation and readiness failures are fatal and returned as a
//! [`SyncError`] before any key is touched. Per-key store failures are not:
//! they are recorded in the report, which maps to [`RunOutcome::StoreFailure`].
//!
//! # Navigation
//! - Main entrypoint: [`synchronise`]
//! - Exit-status mapping: [`RunOutcome`]

use thiserror::Error;
use tracing::{error, info};

use crate::config::SyncConfig;
use crate::contract::{KvStore, Progress};
use crate::document::{self, ConfigSet, DocumentError};
use crate::readiness::{await_ready, Readiness};
use crate::substitute::substitute;

pub use crate::reconcile::SyncReport;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("consul is not up for {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
}

impl SyncError {
    pub fn outcome(&self) -> RunOutcome {
        match self {
            SyncError::Document(e) if e.is_validation() => RunOutcome::ValidationFailure,
            SyncError::Document(_) => RunOutcome::ParseFailure,
            SyncError::Timeout { .. } => RunOutcome::TimeoutFailure,
        }
    }
}

/// Terminal result of one run; decides the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    ParseFailure,
    ValidationFailure,
    TimeoutFailure,
    /// At least one key could not be read or written.
    StoreFailure,
    /// The run could not start: unreadable input file or unusable store address.
    UsageFailure,
}

impl RunOutcome {
    pub fn exit_code(self) -> u8 {
        match self {
            RunOutcome::Success => 0,
            RunOutcome::ParseFailure => 1,
            RunOutcome::ValidationFailure | RunOutcome::UsageFailure => 2,
            RunOutcome::TimeoutFailure => 3,
            RunOutcome::StoreFailure => 4,
        }
    }
}

impl SyncReport {
    pub fn run_outcome(&self) -> RunOutcome {
        if self.has_failures() {
            RunOutcome::StoreFailure
        } else {
            RunOutcome::Success
        }
    }
}

/// Substitutes and parses `raw` according to `config`. No store access.
pub fn prepare(config: &SyncConfig, raw: &str) -> Result<ConfigSet, DocumentError> {
    let text = substitute(raw, &config.substitutions);
    document::parse(&text, config.format)
}

/// Entrypoint: run the whole pipeline for one document.
pub async fn synchronise<S, P>(
    config: &SyncConfig,
    raw: &str,
    store: &S,
    progress: &mut P,
) -> Result<SyncReport, SyncError>
where
    S: KvStore + ?Sized,
    P: Progress + ?Sized,
{
    info!("[SYNC] Starting synchronisation");

    let entries = prepare(config, raw).map_err(|e| {
        error!(error = %e, "[SYNC][ERROR] Document rejected");
        SyncError::from(e)
    })?;
    info!(entries = entries.len(), "[SYNC] Document accepted");

    if await_ready(store, config.timeout, config.poll_interval, progress).await == Readiness::TimedOut {
        error!(timeout_secs = config.timeout.as_secs(), "[SYNC][ERROR] Store never became ready");
        return Err(SyncError::Timeout {
            timeout_secs: config.timeout.as_secs(),
        });
    }

    let report = crate::reconcile::reconcile(&entries, store, config.overwrite, progress).await;
    info!(outcome = ?report.run_outcome(), "[SYNC] Synchronisation complete");
    Ok(report)
}
