//! Retry policy for external LLM calls
//!
//! Applied uniformly around every chat completion in the pipeline:
//! transient failures (timeout, HTTP 429/502/503/504) sleep a fixed backoff
//! and retry — indefinitely unless `max_attempts` bounds the loop — while
//! any other error propagates immediately as fatal. Every retry and every
//! terminal failure is recorded to the audit sink without blocking the loop.

use crate::audit::AuditSink;
use crate::errors::Result;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Fixed-backoff retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Fixed wait between attempts
    pub backoff: Duration,

    /// Attempt bound; `None` retries indefinitely
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Retry forever on transient failures (maximizes availability under
    /// upstream rate-limiting at the cost of unbounded latency)
    pub fn unbounded(backoff: Duration) -> Self {
        Self {
            backoff,
            max_attempts: None,
        }
    }

    /// Retry at most `max_attempts` times
    pub fn bounded(backoff: Duration, max_attempts: u32) -> Self {
        Self {
            backoff,
            max_attempts: Some(max_attempts),
        }
    }

    /// Run `op` under this policy.
    ///
    /// The backoff sleep is a tokio suspension point, never a busy-wait.
    pub async fn run<T, F, Fut>(&self, operation: &str, audit: &dyn AuditSink, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    audit.record(format!(
                        "retry operation={} attempt={} error=\"{}\"",
                        operation, attempt, e
                    ));
                    crate::metrics::record_llm_retry(operation);

                    if let Some(max) = self.max_attempts {
                        if attempt >= max {
                            audit.record(format!(
                                "retry-exhausted operation={} attempts={}",
                                operation, attempt
                            ));
                            error!(operation, attempts = attempt, error = %e, "Retries exhausted");
                            return Err(e);
                        }
                    }

                    warn!(
                        operation,
                        attempt,
                        backoff_ms = self.backoff.as_millis() as u64,
                        error = %e,
                        "Transient upstream failure, retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                Err(e) => {
                    audit.record(format!(
                        "fatal operation={} error=\"{}\"",
                        operation, e
                    ));
                    error!(operation, error = %e, "Fatal upstream failure");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::errors::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn transient() -> AppError {
        AppError::LlmStatus {
            status: 503,
            message: "upstream busy".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_n_transient_failures() {
        let audit = MemoryAuditSink::new();
        let policy = RetryPolicy::unbounded(Duration::from_millis(500));
        let n = 3usize;
        let attempts = AtomicUsize::new(0);

        let start = tokio::time::Instant::now();
        let result = policy
            .run("synthesize", audit.as_ref(), || {
                let i = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if i < n {
                        Err(transient())
                    } else {
                        Ok("answer".to_string())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "answer");
        assert_eq!(attempts.load(Ordering::SeqCst), n + 1);
        // Exactly N backoff sleeps
        assert_eq!(start.elapsed(), Duration::from_millis(500 * n as u64));
        // Exactly N transient-failure audit entries
        let events = audit.events();
        assert_eq!(events.len(), n);
        assert!(events.iter().all(|e| e.starts_with("retry operation=synthesize")));
    }

    #[tokio::test]
    async fn test_fatal_error_propagates_immediately() {
        let audit = MemoryAuditSink::new();
        let policy = RetryPolicy::unbounded(Duration::from_millis(500));
        let attempts = AtomicUsize::new(0);

        let result: Result<String> = policy
            .run("compress", audit.as_ref(), || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(AppError::LlmStatus {
                        status: 401,
                        message: "invalid key".into(),
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        let events = audit.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].starts_with("fatal operation=compress"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_policy_exhausts() {
        let audit = MemoryAuditSink::new();
        let policy = RetryPolicy::bounded(Duration::from_millis(100), 2);

        let result: Result<String> = policy
            .run("synthesize", audit.as_ref(), || async { Err(transient()) })
            .await;

        assert!(result.is_err());
        let events = audit.events();
        // Two retry entries plus the terminal exhaustion entry
        assert_eq!(events.len(), 3);
        assert!(events[2].starts_with("retry-exhausted"));
    }
}
