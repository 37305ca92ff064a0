//! # contract: the seams between the core and the outside world
//!
//! This module defines the [`KvStore`] trait through which every store
//! round-trip goes, the [`Progress`] sink the pipeline reports to, and the
//! plain data types shared between the reconciler, the pipeline and the CLI.
//!
//! ## Mocking & Testing
//! - [`KvStore`] is annotated for `mockall`, so consumers get a
//!   `MockKvStore` under `cfg(test)` or the `test-export-mocks` feature.
//! - [`Progress`] has no-op defaults; [`NoProgress`] is the silent sink.

use async_trait::async_trait;
use std::time::Duration;

use mockall::automock;

/// Error type for store calls (simple boxed error, as transports differ).
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// A distributed key/value store with a leadership (readiness) probe.
///
/// Values are opaque bytes on read; the core only ever writes text.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Whether the store currently has an elected leader and accepts writes.
    async fn leader_status(&self) -> Result<bool, StoreError>;

    /// Current value for `key`, or `None` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write `value` under `key`, creating or replacing it.
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// What the reconciler decided to do with a key that is about to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Create,
    Overwrite,
}

/// Result of reconciling a single key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    Created,
    Updated,
    Skipped,
    /// `action` is `None` when reading the current value failed.
    Failed {
        action: Option<KeyAction>,
        error: String,
    },
}

impl KeyOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, KeyOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyReport {
    pub key: String,
    pub outcome: KeyOutcome,
}

/// Observer for user-visible progress. None of the hooks may influence
/// timing or control flow.
pub trait Progress {
    /// Called once before the first readiness probe.
    fn waiting(&mut self, _timeout: Duration) {}

    /// Called after every probe that did not observe a leader.
    fn heartbeat(&mut self) {}

    fn ready(&mut self) {}

    fn timed_out(&mut self) {}

    /// Called right before a write is issued for `key`.
    fn key_started(&mut self, _key: &str, _action: KeyAction) {}

    fn key_finished(&mut self, _report: &KeyReport) {}
}

/// Progress sink that reports nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {}
