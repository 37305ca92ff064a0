use std::time::Duration;
use tracing::{debug, info};

use crate::document::FormatMode;
use crate::readiness::{DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT_SECS};
use crate::substitute::SubstitutionTable;

/// Everything one synchronisation run needs besides the document and the
/// store. Built once at startup and passed by reference.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub format: FormatMode,
    pub substitutions: SubstitutionTable,
    pub overwrite: bool,
    /// How long to wait for the store to elect a leader.
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            format: FormatMode::Auto,
            substitutions: SubstitutionTable::default(),
            overwrite: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl SyncConfig {
    pub fn trace_loaded(&self) {
        info!(
            format = ?self.format,
            substitutions = self.substitutions.len(),
            overwrite = self.overwrite,
            timeout_secs = self.timeout.as_secs(),
            "Loaded SyncConfig"
        );
        debug!(
            variables = ?self.substitutions.names().collect::<Vec<_>>(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "SyncConfig loaded (substitution variables)"
        );
    }
}
