//! The response parser: retry, classify, then either hand back the body or
//! render diagnostics.

use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::framework::Diagnostics;
use crate::pingone::{HttpResponse, SdkResponse, ServiceError};

use super::classify::{Classification, classify, format_generic, format_service_error, format_transport};
use super::context::OpContext;
use super::retry::{Backoff, DEFAULT_RETRY_TIMEOUT, RetrySettings, Retryable, default_retryable, retry_wrapper};

/// Hook giving a call site the first say on a failed call. An empty result
/// falls through to default formatting.
pub type CustomError = fn(Option<&HttpResponse>, &ServiceError) -> Diagnostics;

const RESOURCE_NOT_FOUND_SUMMARY: &str = "Requested resource not found";
const RESOURCE_NOT_FOUND_DETAIL: &str = "The requested resource configuration cannot be found in the PingOne service.  If the requested resource is managed in the orchestrator's state, it may have been removed outside of the orchestrator.";

/// Performs no special handling.
#[must_use]
pub const fn default_custom_error(_http: Option<&HttpResponse>, _error: &ServiceError) -> Diagnostics {
    Diagnostics::new()
}

/// Turns a missing resource into a warning.
#[must_use]
pub fn custom_error_resource_not_found_warning(
    http: Option<&HttpResponse>,
    error: &ServiceError,
) -> Diagnostics {
    let mut diags = Diagnostics::new();

    if error.code == "NOT_FOUND" && !error.message.is_empty() {
        diags.add_warning(
            RESOURCE_NOT_FOUND_SUMMARY,
            format!("{RESOURCE_NOT_FOUND_DETAIL}\nAPI error: {}", error.message),
        );
    } else if error.code == "NOT_FOUND" || http.is_some_and(|h| h.status == 404) {
        diags.add_warning(RESOURCE_NOT_FOUND_SUMMARY, RESOURCE_NOT_FOUND_DETAIL);
    }

    diags
}

/// Surfaces a rejected `name` as a plain error.
#[must_use]
pub fn custom_error_invalid_value(_http: Option<&HttpResponse>, error: &ServiceError) -> Diagnostics {
    let mut diags = Diagnostics::new();

    if let Some(detail) = error.first_detail() {
        if detail.code == "INVALID_VALUE" && detail.target.as_deref() == Some("name") {
            diags.add_error("Invalid Value", detail.message.clone());
        }
    }

    diags
}

/// Per-call error handling and retry policy.
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Name of the API operation, used in every rendered diagnostic.
    pub label: String,
    /// Custom error hook.
    pub custom_error: CustomError,
    /// Extra retry condition.
    pub retryable: Retryable,
    /// Overall deadline, retries included.
    pub timeout: Duration,
    /// Delay policy between attempts.
    pub backoff: Backoff,
}

impl CallOptions {
    /// Default options for the named operation.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            custom_error: default_custom_error,
            retryable: default_retryable,
            timeout: DEFAULT_RETRY_TIMEOUT,
            backoff: Backoff::default(),
        }
    }

    /// Sets the custom error hook.
    #[must_use]
    pub fn custom_error(mut self, hook: CustomError) -> Self {
        self.custom_error = hook;
        self
    }

    /// Sets the extra retry condition.
    #[must_use]
    pub fn retryable(mut self, retryable: Retryable) -> Self {
        self.retryable = retryable;
        self
    }

    /// Sets the overall deadline.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Applies provider-wide retry settings.
    #[must_use]
    pub const fn retry_settings(mut self, settings: RetrySettings) -> Self {
        self.timeout = settings.timeout;
        self.backoff = settings.backoff;
        self
    }
}

/// Runs `thunk` under the retry policy of `opts` and interprets the outcome.
///
/// The body is returned only on success, in which case the diagnostics hold
/// no error. A `None` body with no error means the target was not found.
pub async fn parse_response<T, F, Fut>(
    ctx: &OpContext,
    opts: &CallOptions,
    thunk: F,
) -> (Option<T>, Diagnostics)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SdkResponse<T>>,
{
    let resp = retry_wrapper(ctx, opts.timeout, opts.backoff, thunk, opts.retryable).await;
    let mut diags = Diagnostics::new();

    match classify(resp.http.as_ref(), resp.error.as_ref()) {
        Classification::Success => return (resp.body, diags),
        Classification::NotFound => {
            let fallback;
            let envelope = if let Some(envelope) = resp.envelope() {
                envelope
            } else {
                fallback = ServiceError::new("", "NOT_FOUND", "");
                &fallback
            };

            let hooked = (opts.custom_error)(resp.http.as_ref(), envelope);
            if !hooked.is_empty() {
                return (None, hooked);
            }

            if envelope.id.is_empty() {
                diags.push(format_generic(&opts.label, resp.error.as_ref(), resp.http.as_ref()));
            } else {
                diags.push(format_service_error(&opts.label, envelope));
            }
        }
        Classification::UserError(envelope) => {
            let hooked = (opts.custom_error)(resp.http.as_ref(), envelope);
            if !hooked.is_empty() {
                return (None, hooked);
            }
            diags.push(format_service_error(&opts.label, envelope));
        }
        Classification::ServerError(envelope) => {
            diags.push(format_service_error(&opts.label, envelope));
        }
        Classification::TransportError => {
            if let Some(err) = resp.error.as_ref() {
                warn!("Detected HTTP error calling {}: {err}", opts.label);
                diags.push(format_transport(&opts.label, err));
            }
        }
        Classification::Unknown => {
            if let Some(http) = resp.http.as_ref() {
                error!(
                    "Error when calling '{}'\n\nResponse code: {}\nResponse content-type: {}\nFull response body: {}",
                    opts.label,
                    http.status,
                    http.content_type.as_deref().unwrap_or_default(),
                    http.body
                );
            } else {
                warn!("Detected unknown error calling {}: {:?}", opts.label, resp.error);
            }
            diags.push(format_generic(&opts.label, resp.error.as_ref(), resp.http.as_ref()));
        }
    }

    (None, diags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::Severity;
    use crate::pingone::{ErrorDetail, SdkError, TransportKind};

    fn fast(label: &str) -> CallOptions {
        CallOptions {
            backoff: Backoff::new(Duration::from_millis(1), Duration::from_millis(5)),
            timeout: Duration::from_millis(100),
            ..CallOptions::new(label)
        }
    }

    fn failure(status: u16, envelope: Option<ServiceError>) -> SdkResponse<String> {
        SdkResponse::failed(
            Some(HttpResponse::new(status, "")),
            SdkError::Service {
                status,
                reason: String::new(),
                envelope,
            },
        )
    }

    #[tokio::test]
    async fn test_success_returns_body() {
        let (body, diags) = parse_response(&OpContext::new(), &fast("ReadOneThing"), || async {
            SdkResponse::ok(Some("x".to_string()), HttpResponse::new(200, "\"x\""))
        })
        .await;
        assert_eq!(body.as_deref(), Some("x"));
        assert!(diags.is_empty());
    }

    #[tokio::test]
    async fn test_not_found_with_warning_hook() {
        let opts = fast("ReadOneThing").custom_error(custom_error_resource_not_found_warning);
        let (body, diags) = parse_response(&OpContext::new(), &opts, || async {
            failure(404, Some(ServiceError::new("e", "NOT_FOUND", "Unable to find thing")))
        })
        .await;

        assert!(body.is_none());
        assert!(!diags.has_error());
        let warning = diags.warnings().next().expect("warning");
        assert_eq!(warning.summary, "Requested resource not found");
        assert!(warning.detail.ends_with("API error: Unable to find thing"));
    }

    #[tokio::test]
    async fn test_not_found_without_hook_is_error() {
        let (body, diags) = parse_response(&OpContext::new(), &fast("UpdateThing"), || async {
            failure(404, Some(ServiceError::new("e", "NOT_FOUND", "gone")))
        })
        .await;

        assert!(body.is_none());
        assert_eq!(diags.error_count(), 1);
        assert!(diags.iter().any(|d| d.summary == "Error when calling 'UpdateThing': gone"));
    }

    #[tokio::test]
    async fn test_probe_rewrite_without_envelope_warns() {
        let opts = fast("ReadOneThing").custom_error(custom_error_resource_not_found_warning);
        let (body, diags) = parse_response(&OpContext::new(), &opts, || async {
            SdkResponse::<String> {
                body: None,
                http: Some(HttpResponse::new(404, "")),
                error: None,
            }
        })
        .await;

        assert!(body.is_none());
        assert_eq!(diags.warning_count(), 1);
        assert!(!diags.has_error());
    }

    #[tokio::test]
    async fn test_invalid_value_on_name() {
        let opts = fast("CreateRiskPredictor").custom_error(custom_error_invalid_value);
        let (_, diags) = parse_response(&OpContext::new(), &opts, || async {
            failure(
                400,
                Some(
                    ServiceError::new("e", "INVALID_DATA", "invalid")
                        .with_detail(ErrorDetail::new("INVALID_VALUE", "Name must be unique").with_target("name")),
                ),
            )
        })
        .await;

        let only = diags.iter().next().expect("one diagnostic");
        assert_eq!(only.severity, Severity::Error);
        assert_eq!(only.summary, "Invalid Value");
        assert_eq!(only.detail, "Name must be unique");
    }

    #[tokio::test]
    async fn test_user_error_falls_through_to_format() {
        let opts = fast("CreateRiskPredictor").custom_error(custom_error_invalid_value);
        let (_, diags) = parse_response(&OpContext::new(), &opts, || async {
            failure(400, Some(ServiceError::new("e", "INVALID_DATA", "bad request")))
        })
        .await;

        let only = diags.iter().next().expect("one diagnostic");
        assert!(only.detail.starts_with("PingOne Error Details:"));
    }

    #[tokio::test]
    async fn test_transport_error_after_deadline() {
        let (body, diags) = parse_response(&OpContext::new(), &fast("ReadOneThing"), || async {
            SdkResponse::<String>::failed(
                None,
                SdkError::Transport {
                    kind: TransportKind::Connect,
                    message: "connection refused".to_string(),
                },
            )
        })
        .await;

        assert!(body.is_none());
        assert_eq!(
            diags.iter().next().map(|d| d.summary.as_str()),
            Some("Error when calling 'ReadOneThing': connection refused")
        );
    }

    #[tokio::test]
    async fn test_server_error_ignores_hook() {
        let opts = fast("ReadOneThing").custom_error(custom_error_resource_not_found_warning);
        let (_, diags) = parse_response(&OpContext::new(), &opts, || async {
            failure(500, Some(ServiceError::new("e", "NOT_FOUND", "weird")))
        })
        .await;
        assert!(diags.has_error());
    }
}
