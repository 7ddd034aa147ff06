use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::AgentError;

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub fails_to_open: u32,
    pub successes_to_close: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            fails_to_open: 5,
            successes_to_close: 2,
            open_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    consecutive_fails: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
}

/// Per-Agent circuit breaker sitting in front of all outbound Agent calls (§4.7): after 5
/// consecutive transient failures it opens; requests fast-fail for 30s; two successful
/// probes close it.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                consecutive_fails: 0,
                consecutive_successes: 0,
                opened_at: None,
            }),
        }
    }

    /// Returns `Err(AgentError::CircuitOpen)` if the breaker should fast-fail the call
    /// rather than let it through.
    pub fn check(&self) -> Result<(), AgentError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Closed => Ok(()),
            State::HalfOpen => Ok(()),
            State::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.config.open_timeout {
                    inner.state = State::HalfOpen;
                    inner.consecutive_successes = 0;
                    Ok(())
                } else {
                    Err(AgentError::CircuitOpen)
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Closed => {
                inner.consecutive_fails = 0;
            }
            State::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.successes_to_close {
                    inner.state = State::Closed;
                    inner.consecutive_fails = 0;
                    inner.consecutive_successes = 0;
                    inner.opened_at = None;
                }
            }
            State::Open => {}
        }
    }

    /// Only transient failures count against the breaker; a permanent failure is a problem
    /// with this call's inputs, not with the Agent's availability.
    pub fn record_failure(&self, transient: bool) {
        if !transient {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            State::Closed => {
                inner.consecutive_fails += 1;
                if inner.consecutive_fails >= self.config.fails_to_open {
                    inner.state = State::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            State::HalfOpen => {
                inner.state = State::Open;
                inner.opened_at = Some(Instant::now());
                inner.consecutive_successes = 0;
            }
            State::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            fails_to_open: 3,
            successes_to_close: 2,
            open_timeout: Duration::from_millis(20),
        })
    }

    #[test]
    fn opens_after_consecutive_transient_failures() {
        let b = breaker();
        for _ in 0..3 {
            b.record_failure(true);
        }
        assert!(matches!(b.check(), Err(AgentError::CircuitOpen)));
    }

    #[test]
    fn permanent_failures_do_not_count() {
        let b = breaker();
        for _ in 0..10 {
            b.record_failure(false);
        }
        assert!(b.check().is_ok());
    }

    #[test]
    fn half_open_after_timeout_and_closes_after_probes() {
        let b = breaker();
        for _ in 0..3 {
            b.record_failure(true);
        }
        std::thread::sleep(Duration::from_millis(25));
        assert!(b.check().is_ok()); // half-open probe allowed through
        b.record_success();
        assert!(b.check().is_ok());
        b.record_success();
        // closed again; a fresh failure streak shouldn't reopen after just one failure
        b.record_failure(true);
        assert!(b.check().is_ok());
    }

    #[test]
    fn half_open_failure_reopens() {
        let b = breaker();
        for _ in 0..3 {
            b.record_failure(true);
        }
        std::thread::sleep(Duration::from_millis(25));
        assert!(b.check().is_ok());
        b.record_failure(true);
        assert!(matches!(b.check(), Err(AgentError::CircuitOpen)));
    }
}
