//! Retry wrapper with exponential backoff and jitter.
//!
//! Wraps a fallible async call and retries it while the error
//! classifies as retryable (see [`PipelineError::is_retryable`]):
//! connection failures, timeouts, HTTP 5xx and 429. Anything else
//! short-circuits after the first attempt. Delay before attempt `n` is
//! `min(base * 2^n, cap)` plus a random jitter in `[0, 100)` ms.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::error::PipelineError;

/// Observer invoked before each retry with the upcoming attempt number
/// (1-based) and the delay about to be slept.
pub type RetryObserver = Box<dyn Fn(u32, Duration) + Send + Sync>;

pub struct RetryPolicy {
    max_retries: u32,
    base: Duration,
    cap: Duration,
    observer: Option<RetryObserver>,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base: Duration, cap: Duration) -> Self {
        Self {
            max_retries,
            base,
            cap,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: RetryObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.cap);
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..100));
        exp + jitter
    }

    /// Run `op`, retrying retryable failures up to `max_retries` times.
    ///
    /// Re-raises the last error after exhausting retries; a
    /// non-retryable error is re-raised immediately.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PipelineError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = self.backoff(attempt);
                    attempt += 1;
                    debug!(label, attempt, delay_ms = delay.as_millis() as u64, %err, "retrying");
                    if let Some(observer) = &self.observer {
                        observer(attempt, delay);
                    }
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn policy(max: u32) -> RetryPolicy {
        RetryPolicy::new(max, Duration::from_millis(10), Duration::from_millis(100))
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_k_retryable_failures() {
        let calls = AtomicU32::new(0);
        let result = policy(3)
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(PipelineError::Transient("boom".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        // Failed twice, succeeded on the third invocation: k + 1 calls.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_short_circuits() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy(5)
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(PipelineError::Permanent("404".to_string())) }
            })
            .await;
        assert!(matches!(result, Err(PipelineError::Permanent(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_reraise_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy(2)
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(PipelineError::Transient("still down".to_string())) }
            })
            .await;
        assert!(matches!(result, Err(PipelineError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn observer_sees_each_retry() {
        let seen: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let policy = policy(2).with_observer(Box::new(move |attempt, delay| {
            assert!(delay >= Duration::from_millis(10));
            seen_clone.lock().unwrap().push(attempt);
        }));
        let _: Result<(), _> = policy
            .run("test", || async {
                Err(PipelineError::Transient("x".to_string()))
            })
            .await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_is_capped() {
        let policy = RetryPolicy::new(8, Duration::from_millis(100), Duration::from_millis(400));
        for attempt in 0..8 {
            let d = policy.backoff(attempt);
            assert!(d < Duration::from_millis(500));
        }
    }
}
