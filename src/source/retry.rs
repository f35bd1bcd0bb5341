//! Retry policy for Source adapter operations (§4.2, §7): up to five
//! attempts, attempt-count × 5s backoff, with a randomized short wait
//! instead on HTTP 429. Non-retryable errors (4xx other than 429, schema
//! violations) abort immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::error::{SourceError, SourceResult};

const MAX_ATTEMPTS: usize = 5;
const BACKOFF_UNIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default)]
pub struct RetryPolicy;

impl RetryPolicy {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> SourceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SourceResult<T>>,
    {
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < MAX_ATTEMPTS {
            attempts += 1;
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if !err.is_retryable() {
                        debug!(error = %err, "non-retryable error, aborting");
                        return Err(err);
                    }

                    warn!(attempt = attempts, max = MAX_ATTEMPTS, error = %err, "source call failed");

                    let wait = match &err {
                        SourceError::RateLimited { retry_after_secs } => {
                            jittered_short_wait(*retry_after_secs)
                        }
                        _ => BACKOFF_UNIT * attempts as u32,
                    };

                    last_error = Some(err);

                    if attempts < MAX_ATTEMPTS {
                        debug!(?wait, "retrying after backoff");
                        sleep(wait).await;
                    }
                }
            }
        }

        Err(SourceError::RetryExhausted {
            attempts,
            last_error: Box::new(last_error.expect("at least one attempt recorded an error")),
        })
    }
}

fn jittered_short_wait(base_secs: u64) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_ms = rng.gen_range(100..=1500);
    Duration::from_secs(base_secs.max(1)) + Duration::from_millis(jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let policy = RetryPolicy::new();

        let result = policy
            .execute(|| {
                let c = c.clone();
                async move {
                    let n = c.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(SourceError::Api { status: 503, message: "down".into() })
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_stops_immediately() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let policy = RetryPolicy::new();

        let result: SourceResult<()> = policy
            .execute(|| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(SourceError::Api { status: 404, message: "nope".into() })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_five_attempts() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let policy = RetryPolicy::new();

        let result: SourceResult<()> = policy
            .execute(|| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(SourceError::Api { status: 500, message: "down".into() })
                }
            })
            .await;

        assert!(matches!(result, Err(SourceError::RetryExhausted { attempts: 5, .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }
}
