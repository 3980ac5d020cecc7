//! Retry-with-countdown around a single query

use crate::error::IpWhoisError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Outcome of one failed attempt
#[derive(Debug)]
pub(crate) enum Failure {
    /// Socket or HTTP transport error; worth another attempt
    Transient(String),
    /// The server asked us to slow down
    RateLimited,
    /// No point retrying
    Fatal(IpWhoisError),
}

/// Why the retry loop gave up
#[derive(Debug)]
pub(crate) enum RetryError {
    /// Retries exhausted on transient errors; carries the last message
    Exhausted(String),
    /// Retries exhausted while rate limited
    RateLimited,
    /// A fatal error stopped the loop early
    Fatal(IpWhoisError),
}

impl RetryError {
    /// Converts into the caller's typed errors
    pub(crate) fn into_error(
        self,
        lookup: impl FnOnce(String) -> IpWhoisError,
        rate_limited: impl FnOnce() -> IpWhoisError,
    ) -> IpWhoisError {
        match self {
            RetryError::Exhausted(msg) => lookup(msg),
            RetryError::RateLimited => rate_limited(),
            RetryError::Fatal(e) => e,
        }
    }
}

/// Runs `attempt` up to `retry_count + 1` times.
///
/// Transient failures retry immediately. Rate-limit failures sleep for
/// `rate_limit_wait` first. Both consume one retry.
pub(crate) async fn with_retries<T, F, Fut>(
    label: &str,
    retry_count: u32,
    rate_limit_wait: Duration,
    mut attempt: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Failure>>,
{
    let mut remaining = retry_count;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(Failure::Fatal(e)) => return Err(RetryError::Fatal(e)),
            Err(Failure::Transient(msg)) => {
                debug!("{label} error: {msg}");
                if remaining == 0 {
                    return Err(RetryError::Exhausted(msg));
                }
                debug!("{label} retrying (count: {remaining})");
            }
            Err(Failure::RateLimited) => {
                if remaining == 0 {
                    return Err(RetryError::RateLimited);
                }
                debug!("{label} rate limit exceeded, waiting {rate_limit_wait:?}");
                tokio::time::sleep(rate_limit_wait).await;
            }
        }
        remaining -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn fail_n_times(failures: u32, retry_count: u32) -> (Result<u32, RetryError>, u32) {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_retries("test", retry_count, Duration::ZERO, || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < failures {
                Err(Failure::Transient(format!("failure {n}")))
            } else {
                Ok(n)
            }
        })
        .await;
        (result, calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_succeeds_when_retries_cover_failures() {
        for failures in 0..4 {
            let (result, calls) = fail_n_times(failures, 3).await;
            assert_eq!(result.unwrap(), failures);
            assert_eq!(calls, failures + 1);
        }
    }

    #[tokio::test]
    async fn test_exhausted_when_failures_exceed_retries() {
        let (result, calls) = fail_n_times(3, 2).await;
        assert!(matches!(result, Err(RetryError::Exhausted(ref m)) if m == "failure 2"));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_fatal_stops_immediately() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = with_retries("test", 5, Duration::ZERO, || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(Failure::Fatal(IpWhoisError::WhoisLookup("x".into())))
        })
        .await;
        assert!(matches!(result, Err(RetryError::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_sleeps_then_retries() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let wait = Duration::from_millis(20);
        let start = std::time::Instant::now();
        let result = with_retries("test", 3, wait, || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Failure::RateLimited)
            } else {
                Ok("done")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert!(start.elapsed() >= wait * 2);
    }

    #[tokio::test]
    async fn test_rate_limit_exhausted() {
        let result: Result<(), _> =
            with_retries("test", 1, Duration::ZERO, || async { Err(Failure::RateLimited) }).await;
        let err = result
            .unwrap_err()
            .into_error(IpWhoisError::WhoisLookup, || {
                IpWhoisError::WhoisRateLimit("1.2.3.4".into())
            });
        assert!(matches!(err, IpWhoisError::WhoisRateLimit(_)));
    }
}
