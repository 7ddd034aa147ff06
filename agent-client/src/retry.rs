use std::future::Future;
use std::time::Duration;

use codehub_common::backoff::backoff_full_jitter;
use tracing::warn;

use crate::error::AgentError;

const MAX_ATTEMPTS: usize = 3;
const BASE: Duration = Duration::from_secs(1);
const CAP: Duration = Duration::from_secs(30);

/// Retries `call` up to [`MAX_ATTEMPTS`] times with full-jitter exponential backoff,
/// stopping as soon as an attempt succeeds or fails with a permanent error (§4.7).
pub async fn with_retry<F, Fut, T>(mut call: F) -> Result<T, AgentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AgentError>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < MAX_ATTEMPTS => {
                let delay = backoff_full_jitter(BASE, CAP, attempt);
                warn!(attempt, ?delay, error = %err, "transient agent call failure, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let calls = AtomicUsize::new(0);
        let result = with_retry(|| async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(AgentError::Timeout)
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_immediately_on_permanent_failure() {
        let calls = AtomicUsize::new(0);
        let result: Result<i32, AgentError> = with_retry(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AgentError::Action {
                code: "NOT_FOUND".to_string(),
                message: "no such workspace".to_string(),
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let result: Result<i32, AgentError> = with_retry(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AgentError::Timeout)
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }
}
