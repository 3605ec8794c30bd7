//! Deadline-bounded retry of API calls.

use rand::Rng;
use regex::Regex;
use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::pingone::{HttpResponse, SdkError, SdkResponse, ServiceError};

use super::context::OpContext;

/// Default overall deadline of one call, retries included.
pub const DEFAULT_RETRY_TIMEOUT: Duration = Duration::from_secs(600);
/// Default minimum delay between attempts.
pub const DEFAULT_MIN_BACKOFF: Duration = Duration::from_secs(10);
/// Default maximum delay between attempts.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Extra retry condition evaluated after every failed attempt.
///
/// The transient classes (429, 500, 502, 503, 504 and transport failures)
/// always retry; a custom condition can only widen that set.
pub type Retryable = fn(Option<&HttpResponse>, Option<&ServiceError>) -> bool;

/// Never retries beyond the transient classes.
#[must_use]
pub const fn default_retryable(_http: Option<&HttpResponse>, _error: Option<&ServiceError>) -> bool {
    false
}

#[allow(clippy::expect_used)]
static ACTOR_NOT_AUTHORIZED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^The actor attempting to perform the request is not authorized.")
        .expect("static regex is valid")
});

/// Also retries while newly granted roles propagate.
#[must_use]
pub fn default_create_read_retryable(
    _http: Option<&HttpResponse>,
    error: Option<&ServiceError>,
) -> bool {
    if error.is_some_and(|e| ACTOR_NOT_AUTHORIZED.is_match(&e.message)) {
        warn!("Insufficient PingOne privileges detected");
        return true;
    }
    false
}

/// Returns true for failures that are always retried.
#[must_use]
pub fn is_transient(http: Option<&HttpResponse>, error: Option<&SdkError>) -> bool {
    if matches!(error, Some(SdkError::Transport { .. })) {
        return true;
    }
    http.is_some_and(|h| matches!(h.status, 429 | 500 | 502 | 503 | 504))
}

/// Exponential backoff with jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub min: Duration,
    /// Upper bound of any delay.
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_BACKOFF,
            max: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl Backoff {
    /// Creates a backoff policy.
    #[must_use]
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Delay before retry number `attempt` (zero-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        let base = self.min.saturating_mul(factor).min(self.max);
        let jitter_ms = u64::try_from(base.as_millis() / 4).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        (base + jitter).min(self.max)
    }
}

/// Retry timeout and backoff shared by all calls of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    /// Overall deadline of one call.
    pub timeout: Duration,
    /// Delay policy.
    pub backoff: Backoff,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_RETRY_TIMEOUT,
            backoff: Backoff::default(),
        }
    }
}

/// Runs `thunk` until it succeeds, fails terminally, or the deadline passes.
///
/// A retryable failure is only surfaced once the deadline has passed: the
/// final wait is shortened to end at the deadline, where one last attempt is
/// made. On deadline the last observed response is returned unchanged. On
/// cancellation a [`SdkError::Cancelled`] failure is returned and no further
/// attempt starts.
pub async fn retry_wrapper<T, F, Fut>(
    ctx: &OpContext,
    timeout: Duration,
    backoff: Backoff,
    mut thunk: F,
    retryable: Retryable,
) -> SdkResponse<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SdkResponse<T>>,
{
    let deadline = ctx.effective_deadline(timeout);
    let mut attempt: u32 = 0;

    loop {
        let resp = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => return SdkResponse::failed(None, SdkError::Cancelled),
            resp = thunk() => resp,
        };

        if !resp.is_failure() {
            return resp;
        }

        let retry = is_transient(resp.http.as_ref(), resp.error.as_ref())
            || retryable(resp.http.as_ref(), resp.envelope());
        if !retry {
            return resp;
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            debug!("Retry deadline reached after {} attempt(s)", attempt + 1);
            return resp;
        }
        // The last wait is cut short so one final attempt lands on the deadline.
        let delay = backoff.delay(attempt).min(remaining);

        warn!(
            "Retrying request in {delay:?} (attempt {}, status {:?})",
            attempt + 1,
            resp.status()
        );

        tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => return SdkResponse::failed(resp.http, SdkError::Cancelled),
            () = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> Backoff {
        Backoff::new(Duration::from_millis(5), Duration::from_millis(20))
    }

    fn service(status: u16, message: &str) -> SdkResponse<String> {
        SdkResponse::failed(
            Some(HttpResponse::new(status, "")),
            SdkError::Service {
                status,
                reason: String::new(),
                envelope: Some(ServiceError::new("id", "CODE", message)),
            },
        )
    }

    #[test]
    fn test_backoff_is_capped() {
        let backoff = Backoff::default();
        for attempt in 0..40 {
            assert!(backoff.delay(attempt) <= DEFAULT_MAX_BACKOFF);
        }
        assert!(backoff.delay(0) >= DEFAULT_MIN_BACKOFF);
    }

    #[test]
    fn test_transient_classes() {
        for status in [429, 500, 502, 503, 504] {
            assert!(is_transient(Some(&HttpResponse::new(status, "")), None));
        }
        for status in [400, 401, 403, 404, 409, 422] {
            assert!(!is_transient(Some(&HttpResponse::new(status, "")), None));
        }
        let transport = SdkError::Transport {
            kind: crate::pingone::TransportKind::Connect,
            message: "refused".to_string(),
        };
        assert!(is_transient(None, Some(&transport)));
    }

    #[test]
    fn test_create_read_retryable_matches_prefix() {
        let denied = ServiceError::new(
            "id",
            "ACCESS_FAILED",
            "The actor attempting to perform the request is not authorized.",
        );
        assert!(default_create_read_retryable(None, Some(&denied)));
        let other = ServiceError::new("id", "ACCESS_FAILED", "Forbidden");
        assert!(!default_create_read_retryable(None, Some(&other)));
        assert!(!default_retryable(None, Some(&denied)));
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let resp = retry_wrapper(
            &OpContext::new(),
            Duration::from_secs(5),
            fast(),
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        service(503, "unavailable")
                    } else {
                        SdkResponse::ok(Some("done".to_string()), HttpResponse::new(200, "\"done\""))
                    }
                }
            },
            default_retryable,
        )
        .await;

        assert_eq!(resp.body.as_deref(), Some("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_terminal_error_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let resp = retry_wrapper(
            &OpContext::new(),
            Duration::from_secs(5),
            fast(),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { service(400, "bad") }
            },
            default_retryable,
        )
        .await;

        assert_eq!(resp.status(), Some(400));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deadline_returns_last_response() {
        let resp = retry_wrapper(
            &OpContext::new(),
            Duration::from_millis(50),
            fast(),
            || async { service(502, "gateway") },
            default_retryable,
        )
        .await;

        assert_eq!(resp.status(), Some(502));
        assert_eq!(resp.envelope().map(|e| e.message.as_str()), Some("gateway"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_failure_waits_for_deadline() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let started = Instant::now();
        let resp = retry_wrapper(
            &OpContext::new(),
            Duration::from_millis(500),
            Backoff::new(Duration::from_millis(300), Duration::from_millis(300)),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { service(503, "unavailable") }
            },
            default_retryable,
        )
        .await;

        assert_eq!(resp.status(), Some(503));
        assert!(started.elapsed() >= Duration::from_millis(500));
        // Attempts at 0ms, 300ms and on the 500ms deadline.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_custom_retryable_widens() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let resp = retry_wrapper(
            &OpContext::new(),
            Duration::from_secs(5),
            fast(),
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        service(403, "The actor attempting to perform the request is not authorized.")
                    } else {
                        SdkResponse::ok(Some("ok".to_string()), HttpResponse::new(200, "\"ok\""))
                    }
                }
            },
            default_create_read_retryable,
        )
        .await;

        assert!(!resp.is_failure());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancellation_is_prompt() {
        let ctx = OpContext::new();
        ctx.cancel.cancel();
        let resp: SdkResponse<String> = retry_wrapper(
            &ctx,
            Duration::from_secs(600),
            Backoff::default(),
            || async { service(503, "unavailable") },
            default_retryable,
        )
        .await;

        assert!(matches!(resp.error, Some(SdkError::Cancelled)));
    }
}
