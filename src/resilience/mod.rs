//! Call-protection primitives: retry, circuit breaker, token-bucket
//! rate limiter.
//!
//! Three independent state machines. The orchestrator composes them
//! around source-API calls (limiter → breaker → retry, outermost first)
//! and applies retry alone around embedding and vector-store calls.

pub mod breaker;
pub mod limiter;
pub mod retry;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker, FailurePredicate};
pub use limiter::{LimiterConfig, RateLimiter};
pub use retry::{RetryObserver, RetryPolicy};

use std::time::Duration;

use crate::config::ResilienceConfig;

impl ResilienceConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_base_ms),
            Duration::from_millis(self.retry_cap_ms),
        )
    }

    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.breaker_failure_threshold,
            reset_timeout: Duration::from_secs(self.breaker_reset_timeout_secs),
            half_open_max_requests: self.breaker_half_open_max_requests,
            success_threshold: self.breaker_half_open_successes,
        }
    }

    pub fn limiter_config(&self) -> LimiterConfig {
        LimiterConfig {
            rate_per_sec: self.rate_per_sec,
            burst: self.rate_burst,
            max_wait: Duration::from_secs(self.rate_max_wait_secs),
        }
    }
}
