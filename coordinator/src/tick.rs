use std::time::Duration;

use codehub_common::backoff::backoff_full_jitter;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Thundering-Herd-safe startup delay applied once before a loop's first tick (§4.7: "0-5s").
pub async fn startup_delay(cancel: &CancellationToken) {
    let delay = Duration::from_millis(rand::random_range(0..=5_000));
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(delay) => {}
    }
}

/// Outcome of one `wait_for_wake_or_interval` wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// `cancel` fired; the caller should stop ticking.
    Cancelled,
    /// A wake hint arrived (or the channel lagged, which is treated the same per §9: "any
    /// replacement... is acceptable as long as duplicate or dropped messages remain safe").
    Woken,
    /// The jittered timer fired with no wake hint.
    TimerFired,
}

/// Waits for either a wake hint on `wake_rx` or a jittered (±30%) timer firing at `base`, per
/// §4.7's push/pull hybrid scheduling.
pub async fn wait_for_wake_or_interval(
    cancel: &CancellationToken,
    wake_rx: &mut broadcast::Receiver<bytes::Bytes>,
    base: Duration,
) -> WaitOutcome {
    let jittered = jitter_interval(base);
    tokio::select! {
        _ = cancel.cancelled() => WaitOutcome::Cancelled,
        _ = tokio::time::sleep(jittered) => WaitOutcome::TimerFired,
        msg = wake_rx.recv() => match msg {
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => WaitOutcome::Woken,
            Err(broadcast::error::RecvError::Closed) => WaitOutcome::TimerFired,
        },
    }
}

/// `base` jittered by up to ±30%, so many replicas polling the same interval don't land on
/// the database in lockstep.
fn jitter_interval(base: Duration) -> Duration {
    let base_ms = base.as_millis() as u64;
    let spread = base_ms * 3 / 10;
    let low = base_ms.saturating_sub(spread);
    let high = base_ms.saturating_add(spread);
    Duration::from_millis(rand::random_range(low..=high.max(low + 1)))
}

/// Exponential backoff with full jitter for a failed tick before the next attempt, reusing
/// the same base/cap as Agent-call retries (§4.7).
pub fn tick_retry_delay(attempt: usize) -> Duration {
    backoff_full_jitter(Duration::from_secs(1), Duration::from_secs(30), attempt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_interval_stays_within_thirty_percent() {
        let base = Duration::from_secs(15);
        for _ in 0..100 {
            let jittered = jitter_interval(base);
            assert!(jittered >= Duration::from_millis(10_500));
            assert!(jittered <= Duration::from_millis(19_500));
        }
    }

    #[test]
    fn tick_retry_delay_never_exceeds_cap() {
        for attempt in 0..10 {
            assert!(tick_retry_delay(attempt) <= Duration::from_secs(30));
        }
    }
}
