//! Per-key reconciliation of a validated [`ConfigSet`] against the store.
//!
//! Every key is handled on its own: read the current value, then create,
//! overwrite or skip. A failing key is recorded in the report and the loop
//! moves on; nothing already written is rolled back.

use tracing::{debug, error, info};

use crate::contract::{KeyAction, KeyOutcome, KeyReport, KvStore, Progress};
use crate::document::ConfigSet;

/// Outcome of one reconciliation run, one entry per key in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub keys: Vec<KeyReport>,
}

impl SyncReport {
    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, KeyOutcome::Created))
    }

    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, KeyOutcome::Updated))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, KeyOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(KeyOutcome::is_failure)
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Outcome recorded for `key`, if it was part of the run.
    pub fn outcome(&self, key: &str) -> Option<&KeyOutcome> {
        self.keys.iter().find(|r| r.key == key).map(|r| &r.outcome)
    }

    fn count(&self, pred: impl Fn(&KeyOutcome) -> bool) -> usize {
        self.keys.iter().filter(|r| pred(&r.outcome)).count()
    }
}

pub async fn reconcile<S, P>(
    entries: &ConfigSet,
    store: &S,
    overwrite: bool,
    progress: &mut P,
) -> SyncReport
where
    S: KvStore + ?Sized,
    P: Progress + ?Sized,
{
    info!(keys = entries.len(), overwrite, "[KV] Reconciling entries");
    let mut report = SyncReport::default();

    for (key, value) in entries.iter() {
        let outcome = reconcile_key(key, &value.to_string(), store, overwrite, progress).await;
        let key_report = KeyReport {
            key: key.to_owned(),
            outcome,
        };
        progress.key_finished(&key_report);
        report.keys.push(key_report);
    }

    info!(
        created = report.created(),
        updated = report.updated(),
        skipped = report.skipped(),
        failed = report.failed(),
        "[KV] Reconciliation finished"
    );
    report
}

async fn reconcile_key<S, P>(
    key: &str,
    value: &str,
    store: &S,
    overwrite: bool,
    progress: &mut P,
) -> KeyOutcome
where
    S: KvStore + ?Sized,
    P: Progress + ?Sized,
{
    let action = match store.get(key).await {
        Ok(None) => KeyAction::Create,
        Ok(Some(_)) if overwrite => KeyAction::Overwrite,
        Ok(Some(_)) => {
            debug!(key = %key, "[KV] Key exists, skipping");
            return KeyOutcome::Skipped;
        }
        Err(e) => {
            error!(key = %key, error = %e, "[KV] Failed to read key");
            return KeyOutcome::Failed {
                action: None,
                error: e.to_string(),
            };
        }
    };

    progress.key_started(key, action);
    match store.put(key, value).await {
        Ok(()) => {
            info!(key = %key, ?action, "[KV] Key written");
            match action {
                KeyAction::Create => KeyOutcome::Created,
                KeyAction::Overwrite => KeyOutcome::Updated,
            }
        }
        Err(e) => {
            error!(key = %key, ?action, error = %e, "[KV] Failed to write key");
            KeyOutcome::Failed {
                action: Some(action),
                error: e.to_string(),
            }
        }
    }
}
