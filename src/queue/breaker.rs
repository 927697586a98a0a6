//! Circuit breaker for the enqueue path.
//!
//! Consecutive failures open the circuit; while open, callers skip the
//! primary path entirely instead of waiting on a dead broker. After a
//! cooldown the circuit half-opens and lets trial calls through, closing
//! again only after enough consecutive successes.

use std::fmt::Display;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::BreakerConfig;

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Circuit {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerState {
    circuit: Circuit,
    failures: u32,
    successes: u32,
    open_until: Option<Instant>,
}

pub struct CircuitBreaker {
    config: BreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerState {
                circuit: Circuit::Closed,
                failures: 0,
                successes: 0,
                open_until: None,
            }),
        }
    }

    pub fn circuit(&self) -> Circuit {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).circuit
    }

    /// Whether a call may go to the primary path right now. Flips an open
    /// circuit to half-open once the cooldown has elapsed.
    fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match state.circuit {
            Circuit::Closed | Circuit::HalfOpen => true,
            Circuit::Open => {
                let elapsed = state
                    .open_until
                    .map(|until| Instant::now() >= until)
                    .unwrap_or(true);
                if elapsed {
                    state.circuit = Circuit::HalfOpen;
                    state.successes = 0;
                    info!("circuit half-open, probing primary path");
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match state.circuit {
            Circuit::HalfOpen => {
                state.successes += 1;
                if state.successes >= self.config.success_threshold {
                    state.circuit = Circuit::Closed;
                    state.failures = 0;
                    state.successes = 0;
                    state.open_until = None;
                    info!("circuit closed");
                }
            }
            Circuit::Closed => state.failures = 0,
            Circuit::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match state.circuit {
            Circuit::HalfOpen => {
                self.open(&mut state);
                warn!("probe failed, circuit reopened");
            }
            Circuit::Closed => {
                state.failures += 1;
                if state.failures >= self.config.failure_threshold {
                    self.open(&mut state);
                    warn!(failures = state.failures, "circuit opened");
                }
            }
            Circuit::Open => {}
        }
    }

    fn open(&self, state: &mut BreakerState) {
        state.circuit = Circuit::Open;
        state.successes = 0;
        state.open_until = Some(Instant::now() + Duration::from_millis(self.config.cooldown_ms));
    }

    /// Run `primary` under the breaker, falling back when the circuit is
    /// open or the primary call fails.
    pub async fn exec<T, E, PFut, FFut>(
        &self,
        primary: impl FnOnce() -> PFut,
        fallback: impl FnOnce() -> FFut,
    ) -> Result<T, E>
    where
        E: Display,
        PFut: Future<Output = Result<T, E>>,
        FFut: Future<Output = Result<T, E>>,
    {
        if !self.try_acquire() {
            return fallback().await;
        }
        match primary().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                warn!(error = %e, "primary path failed, using fallback");
                fallback().await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(failure_threshold: u32, cooldown_ms: u64, success_threshold: u32) -> BreakerConfig {
        BreakerConfig {
            failure_threshold,
            cooldown_ms,
            success_threshold,
        }
    }

    async fn fail(breaker: &CircuitBreaker, primary_calls: &AtomicUsize) -> Result<u32, String> {
        breaker
            .exec(
                || async {
                    primary_calls.fetch_add(1, Ordering::SeqCst);
                    Err("broker down".to_string())
                },
                || async { Ok(0) },
            )
            .await
    }

    async fn succeed(breaker: &CircuitBreaker, primary_calls: &AtomicUsize) -> Result<u32, String> {
        breaker
            .exec(
                || async {
                    primary_calls.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                },
                || async { Ok(0) },
            )
            .await
    }

    #[tokio::test]
    async fn test_opens_after_consecutive_failures_and_skips_primary() {
        let breaker = CircuitBreaker::new(config(2, 60_000, 1));
        let calls = AtomicUsize::new(0);

        fail(&breaker, &calls).await.unwrap();
        fail(&breaker, &calls).await.unwrap();
        assert_eq!(breaker.circuit(), Circuit::Open);

        // Open circuit routes straight to the fallback.
        let result = fail(&breaker, &calls).await.unwrap();
        assert_eq!(result, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_half_open_probe_after_cooldown() {
        let breaker = CircuitBreaker::new(config(1, 0, 1));
        let calls = AtomicUsize::new(0);

        fail(&breaker, &calls).await.unwrap();
        assert_eq!(breaker.circuit(), Circuit::Open);

        // Zero cooldown: the next call probes immediately.
        let result = succeed(&breaker, &calls).await.unwrap();
        assert_eq!(result, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(breaker.circuit(), Circuit::Closed);
    }

    #[tokio::test]
    async fn test_closing_requires_enough_successes() {
        let breaker = CircuitBreaker::new(config(1, 0, 2));
        let calls = AtomicUsize::new(0);

        fail(&breaker, &calls).await.unwrap();
        succeed(&breaker, &calls).await.unwrap();
        assert_eq!(breaker.circuit(), Circuit::HalfOpen);
        succeed(&breaker, &calls).await.unwrap();
        assert_eq!(breaker.circuit(), Circuit::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(config(1, 0, 2));
        let calls = AtomicUsize::new(0);

        fail(&breaker, &calls).await.unwrap();
        fail(&breaker, &calls).await.unwrap();
        assert_eq!(breaker.circuit(), Circuit::Open);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count_while_closed() {
        let breaker = CircuitBreaker::new(config(2, 60_000, 1));
        let calls = AtomicUsize::new(0);

        fail(&breaker, &calls).await.unwrap();
        succeed(&breaker, &calls).await.unwrap();
        fail(&breaker, &calls).await.unwrap();
        assert_eq!(breaker.circuit(), Circuit::Closed);
    }
}
