//! Token-bucket rate limiter.
//!
//! Sustained rate plus burst capacity. `acquire` refills the bucket
//! from elapsed time (capped at capacity), consumes a token when one is
//! available, and otherwise waits for the deficit to refill — unless
//! that wait would exceed the configured maximum, in which case it
//! fails fast with [`PipelineError::RateLimited`].

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::PipelineError;

pub struct LimiterConfig {
    /// Tokens added per second.
    pub rate_per_sec: f64,
    /// Bucket capacity (burst size).
    pub burst: f64,
    /// Longest wait `acquire` will accept before failing.
    pub max_wait: Duration,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: 2.0,
            burst: 5.0,
            max_wait: Duration::from_secs(10),
        }
    }
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

pub struct RateLimiter {
    config: LimiterConfig,
    // Async mutex: held across the deficit sleep so waiters queue fairly.
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        let bucket = Bucket {
            tokens: config.burst,
            last_refill: Instant::now(),
        };
        Self {
            config,
            bucket: Mutex::new(bucket),
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let elapsed = bucket.last_refill.elapsed().as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.config.rate_per_sec).min(self.config.burst);
        bucket.last_refill = Instant::now();
    }

    /// Acquire one token, waiting for refill when the bucket is empty.
    pub async fn acquire(&self) -> Result<(), PipelineError> {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Ok(());
        }

        let deficit = 1.0 - bucket.tokens;
        let wait = Duration::from_secs_f64(deficit / self.config.rate_per_sec);
        if wait > self.config.max_wait {
            return Err(PipelineError::RateLimited);
        }

        tokio::time::sleep(wait).await;
        self.refill(&mut bucket);
        bucket.tokens -= 1.0;
        Ok(())
    }
}
