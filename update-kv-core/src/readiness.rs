use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::contract::{KvStore, Progress};

/// Interval between two leader probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Seconds to wait for a leader when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Stand-in deadline distance for timeouts the clock cannot represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut,
}

/// Polls `store.leader_status()` until a leader is reported or `timeout`
/// elapses. Probe errors are treated like "no leader yet".
///
/// A probe is only started while `now <= start + timeout`, so a zero timeout
/// still gets one probe. A single probe may run for the time left until the
/// deadline, but never less than one `interval`. A timeout too large for the
/// clock waits as if unbounded.
pub async fn await_ready<S, P>(
    store: &S,
    timeout: Duration,
    interval: Duration,
    progress: &mut P,
) -> Readiness
where
    S: KvStore + ?Sized,
    P: Progress + ?Sized,
{
    let start = Instant::now();
    let deadline = start
        .checked_add(timeout)
        .unwrap_or_else(|| start + FAR_FUTURE);
    let mut attempts: u32 = 0;
    progress.waiting(timeout);
    info!(timeout_secs = timeout.as_secs(), "[READY] Waiting for store leader");

    loop {
        attempts += 1;
        let budget = deadline.saturating_duration_since(Instant::now()).max(interval);
        match tokio::time::timeout(budget, store.leader_status()).await {
            Ok(Ok(true)) => {
                info!(attempts, "[READY] Store has a leader");
                progress.ready();
                return Readiness::Ready;
            }
            Ok(Ok(false)) => debug!(attempts, "[READY] No leader elected yet"),
            Ok(Err(e)) => debug!(attempts, error = %e, "[READY] Leader probe failed"),
            Err(_) => debug!(attempts, "[READY] Leader probe did not answer before the deadline"),
        }

        progress.heartbeat();
        tokio::time::sleep(interval).await;
        if Instant::now() > deadline {
            break;
        }
    }

    warn!(attempts, timeout_secs = timeout.as_secs(), "[READY] Gave up waiting for store leader");
    progress.timed_out();
    Readiness::TimedOut
}
