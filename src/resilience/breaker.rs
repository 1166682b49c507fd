//! Circuit breaker.
//!
//! Protects the upstream from being hammered while it is failing.
//! Three states:
//!
//! ```text
//!            failure_threshold consecutive failures
//!   CLOSED ──────────────────────────────────────▶ OPEN
//!      ▲                                            │ reset timeout
//!      │ success_threshold consecutive successes    ▼ elapsed (on query)
//!      └─────────────────────────────────────── HALF_OPEN
//!                        any failure in HALF_OPEN reopens
//! ```
//!
//! While OPEN every call fails immediately with
//! [`PipelineError::CircuitOpen`] without touching the upstream.
//! HALF_OPEN admits a bounded number of concurrent probe calls. A
//! pluggable predicate decides which errors count toward the failure
//! threshold, so expected client errors (e.g. not-found) can be
//! excluded.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Decides whether an error counts toward the failure threshold.
pub type FailurePredicate = Box<dyn Fn(&PipelineError) -> bool + Send + Sync>;

pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    /// Probe calls admitted concurrently while HALF_OPEN.
    pub half_open_max_requests: u32,
    /// Consecutive successes in HALF_OPEN required to close.
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            half_open_max_requests: 3,
            success_threshold: 2,
        }
    }
}

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
}

pub struct CircuitBreaker {
    config: BreakerConfig,
    counts_as_failure: FailurePredicate,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            counts_as_failure: Box::new(|_| true),
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
                half_open_in_flight: 0,
            }),
        }
    }

    pub fn with_failure_predicate(mut self, predicate: FailurePredicate) -> Self {
        self.counts_as_failure = predicate;
        self
    }

    /// Current state. Querying performs the OPEN → HALF_OPEN transition
    /// once the reset timeout has elapsed.
    pub fn state(&self) -> BreakerState {
        let mut inner = self.inner.lock().unwrap();
        self.refresh(&mut inner);
        inner.state
    }

    fn refresh(&self, inner: &mut Inner) {
        if inner.state == BreakerState::Open {
            if let Some(opened_at) = inner.opened_at {
                if opened_at.elapsed() >= self.config.reset_timeout {
                    inner.state = BreakerState::HalfOpen;
                    inner.consecutive_successes = 0;
                    inner.half_open_in_flight = 0;
                }
            }
        }
    }

    /// Admission check before an attempt. Returns an error when the
    /// call must not proceed.
    fn admit(&self) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock().unwrap();
        self.refresh(&mut inner);
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => Err(PipelineError::CircuitOpen),
            BreakerState::HalfOpen => {
                if inner.half_open_in_flight < self.config.half_open_max_requests {
                    inner.half_open_in_flight += 1;
                    Ok(())
                } else {
                    Err(PipelineError::CircuitOpen)
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures = 0;
            }
            BreakerState::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    inner.opened_at = None;
                }
            }
            BreakerState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        failures = inner.consecutive_failures,
                        "circuit breaker opening"
                    );
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::HalfOpen => {
                // One bad probe is enough.
                warn!("circuit breaker reopening from half-open");
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.half_open_in_flight = 0;
                inner.consecutive_successes = 0;
            }
            BreakerState::Open => {}
        }
    }

    /// Run `op` under the breaker.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T, PipelineError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, PipelineError>>,
    {
        self.admit()?;
        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                if (self.counts_as_failure)(&err) {
                    self.record_failure();
                } else {
                    // Errors outside the predicate leave the counters
                    // alone but still release the probe slot.
                    let mut inner = self.inner.lock().unwrap();
                    if inner.state == BreakerState::HalfOpen {
                        inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                    }
                }
                Err(err)
            }
        }
    }
}
