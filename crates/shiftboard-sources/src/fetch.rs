//! Parallel fetching with retry.
//!
//! Every source is fetched concurrently; a source failing with a retryable
//! error is retried with exponential backoff. Results keep source order.

use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::error::SourceResult;
use crate::source::{FetchedDocument, ScheduleSource};

/// Retry configuration for transient fetch failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per source, the first one included.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Builder: set the number of attempts (at least one).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Builder: set backoff parameters.
    pub fn with_backoff(mut self, initial: Duration, max: Duration, multiplier: f64) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculates the delay before retry number `retry` (1-based).
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let base = self.initial_backoff.as_secs_f64();
        let delay = base * self.backoff_multiplier.powi(retry as i32 - 1);
        let max = self.max_backoff.as_secs_f64();

        Duration::from_secs_f64(delay.min(max))
    }
}

/// Fetches one source, retrying transient failures.
pub async fn fetch_with_retry(
    source: &dyn ScheduleSource,
    policy: RetryPolicy,
) -> SourceResult<FetchedDocument> {
    let mut attempt = 1;
    loop {
        match source.fetch().await {
            Ok(doc) => return Ok(doc),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.backoff_delay(attempt);
                warn!(
                    source = source.name(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "fetch failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Fetches all sources concurrently.
///
/// The returned vector has one entry per source, in input order.
pub async fn fetch_all(
    sources: &[Box<dyn ScheduleSource>],
    policy: RetryPolicy,
) -> Vec<SourceResult<FetchedDocument>> {
    debug!(count = sources.len(), "fetching sources");
    let results = join_all(
        sources
            .iter()
            .map(|source| fetch_with_retry(source.as_ref(), policy)),
    )
    .await;

    let failed = results.iter().filter(|r| r.is_err()).count();
    debug!(count = sources.len(), failed, "fetched sources");
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SourceError, SourceErrorCode};
    use crate::source::{BoxFuture, ErrorSource, StaticSource};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with a network error until `failures` attempts have been made.
    struct FlakySource {
        failures: u32,
        calls: AtomicU32,
    }

    impl ScheduleSource for FlakySource {
        fn name(&self) -> &str {
            "flaky"
        }

        fn location(&self) -> String {
            "<flaky>".to_string()
        }

        fn fetch(&self) -> BoxFuture<'_, SourceResult<FetchedDocument>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let failures = self.failures;
            Box::pin(async move {
                if call <= failures {
                    Err(SourceError::network("connection reset"))
                } else {
                    Ok(FetchedDocument::new("flaky", format!("attempt {call}")))
                }
            })
        }
    }

    fn flaky(failures: u32) -> FlakySource {
        FlakySource {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    mod policy {
        use super::*;

        #[test]
        fn backoff_grows_and_caps() {
            let policy = RetryPolicy::default().with_backoff(
                Duration::from_secs(1),
                Duration::from_secs(5),
                2.0,
            );
            assert_eq!(policy.backoff_delay(0), Duration::ZERO);
            assert_eq!(policy.backoff_delay(1), Duration::from_secs(1));
            assert_eq!(policy.backoff_delay(2), Duration::from_secs(2));
            assert_eq!(policy.backoff_delay(3), Duration::from_secs(4));
            assert_eq!(policy.backoff_delay(4), Duration::from_secs(5));
        }

        #[test]
        fn attempts_never_drop_below_one() {
            assert_eq!(RetryPolicy::default().with_max_attempts(0).max_attempts, 1);
            assert_eq!(RetryPolicy::none().max_attempts, 1);
        }
    }

    mod retry {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn retries_transient_failures() {
            let source = flaky(2);
            let doc = fetch_with_retry(&source, RetryPolicy::default()).await.unwrap();
            assert_eq!(doc.body, "attempt 3");
            assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        }

        #[tokio::test(start_paused = true)]
        async fn gives_up_after_max_attempts() {
            let source = flaky(5);
            let err = fetch_with_retry(&source, RetryPolicy::default().with_max_attempts(2))
                .await
                .unwrap_err();
            assert_eq!(err.code(), SourceErrorCode::NetworkError);
            assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        }

        #[tokio::test]
        async fn permanent_errors_are_not_retried() {
            let source = ErrorSource::new("bad", &SourceError::not_found("gone"));
            let err = fetch_with_retry(&source, RetryPolicy::default()).await.unwrap_err();
            assert_eq!(err.code(), SourceErrorCode::NotFound);
        }
    }

    mod all {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn keeps_source_order_and_failures() {
            let sources: Vec<Box<dyn ScheduleSource>> = vec![
                Box::new(StaticSource::new("first", "<table>1</table>")),
                Box::new(ErrorSource::new("second", &SourceError::configuration("no url"))),
                Box::new(flaky(1)),
            ];
            let results = fetch_all(&sources, RetryPolicy::default()).await;

            assert_eq!(results.len(), 3);
            assert_eq!(results[0].as_ref().unwrap().source, "first");
            assert_eq!(
                results[1].as_ref().unwrap_err().origin(),
                Some("second")
            );
            assert_eq!(results[2].as_ref().unwrap().body, "attempt 2");
        }
    }
}
