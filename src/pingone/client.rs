//! `PingOne` REST client.
//!
//! Every call returns an [`SdkResponse`]: the decoded body (if any), the raw
//! HTTP response (if one was received) and the failure (if any). Failures are
//! values, not `Err`s, so that the retry invoker and the classifier can
//! inspect every part of the outcome.

use reqwest::header::{self, HeaderMap};
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

use crate::error::{ApiError, Result};

use super::auth::TokenSource;
use super::envelope::ServiceError;

/// Default request timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Raw HTTP response retained alongside the decoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// `Content-Type` header.
    pub content_type: Option<String>,
    /// Raw body text.
    pub body: String,
}

impl HttpResponse {
    /// Builds a response from a status and body.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: None,
            body: body.into(),
        }
    }
}

/// Kind of transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// DNS or TCP/TLS connect failure.
    Connect,
    /// The request timed out before a status was received.
    Timeout,
    /// The body could not be read.
    Body,
    /// Any other request failure.
    Request,
}

/// Per-call failure.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SdkError {
    /// The service answered with a non-success status.
    #[error("{status} {reason}")]
    Service {
        /// Status code.
        status: u16,
        /// Canonical reason phrase.
        reason: String,
        /// Decoded error envelope, when the body carried one.
        envelope: Option<ServiceError>,
    },

    /// No HTTP status was received.
    #[error("{message}")]
    Transport {
        /// Kind of transport failure.
        kind: TransportKind,
        /// Description.
        message: String,
    },

    /// The body could not be decoded.
    #[error("failed to decode response body: {message}")]
    Decode {
        /// Decoder message.
        message: String,
    },

    /// An access token could not be obtained.
    #[error("failed to obtain an access token: {message}")]
    Auth {
        /// Description.
        message: String,
    },

    /// The operation was cancelled.
    #[error("the operation was cancelled")]
    Cancelled,
}

impl SdkError {
    /// The service error envelope, when present.
    #[must_use]
    pub const fn envelope(&self) -> Option<&ServiceError> {
        match self {
            Self::Service { envelope, .. } => envelope.as_ref(),
            _ => None,
        }
    }

    /// Returns true for transport-level failures without an HTTP status.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Cancelled)
    }

    fn from_reqwest(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportKind::Timeout
        } else if err.is_connect() {
            TransportKind::Connect
        } else if err.is_body() || err.is_decode() {
            TransportKind::Body
        } else {
            TransportKind::Request
        };
        Self::Transport {
            kind,
            message: err.to_string(),
        }
    }
}

/// Outcome of one API call: `(body, http, error)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SdkResponse<T> {
    /// Decoded body.
    pub body: Option<T>,
    /// Raw HTTP response, when one was received.
    pub http: Option<HttpResponse>,
    /// Failure, when the call did not succeed.
    pub error: Option<SdkError>,
}

impl<T> SdkResponse<T> {
    /// A successful response.
    #[must_use]
    pub const fn ok(body: Option<T>, http: HttpResponse) -> Self {
        Self {
            body,
            http: Some(http),
            error: None,
        }
    }

    /// A failed response.
    #[must_use]
    pub const fn failed(http: Option<HttpResponse>, error: SdkError) -> Self {
        Self {
            body: None,
            http,
            error: Some(error),
        }
    }

    /// HTTP status, when a response was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.http.as_ref().map(|h| h.status)
    }

    /// Returns true when the call failed or the status is not a success.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.error.is_some() || self.status().is_some_and(|s| s >= 300)
    }

    /// The service error envelope, when present.
    #[must_use]
    pub fn envelope(&self) -> Option<&ServiceError> {
        self.error.as_ref().and_then(SdkError::envelope)
    }

    /// Maps the body.
    #[must_use]
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> SdkResponse<U> {
        SdkResponse {
            body: self.body.map(f),
            http: self.http,
            error: self.error,
        }
    }
}

/// HTTP client for one `PingOne` API base URL.
///
/// Cloning is cheap; clones share the connection pool and token cache.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// HTTP client.
    http: Client,
    /// Base URL without trailing slash, e.g. `https://api.pingone.eu/v1`.
    base_url: String,
    /// Token source.
    token: Arc<TokenSource>,
}

impl ApiClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: &str, token: Arc<TokenSource>, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .user_agent(concat!("pingone-provider/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::ClientBuild {
                message: e.to_string(),
            })?;

        Ok(Self::with_http(http, base_url, token))
    }

    /// Creates a client sharing an existing HTTP client.
    #[must_use]
    pub fn with_http(http: Client, base_url: &str, token: Arc<TokenSource>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// The base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The shared HTTP client.
    #[must_use]
    pub const fn http(&self) -> &Client {
        &self.http
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{path}", self.base_url)
        }
    }

    /// `GET` and decode.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> SdkResponse<T> {
        self.execute(Method::GET, path, |r| r).await
    }

    /// `POST` a JSON body and decode.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> SdkResponse<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(Method::POST, path, |r| r.json(body)).await
    }

    /// `PUT` a JSON body and decode.
    pub async fn put<B, T>(&self, path: &str, body: &B) -> SdkResponse<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(Method::PUT, path, |r| r.json(body)).await
    }

    /// `DELETE`, ignoring any body.
    pub async fn delete(&self, path: &str) -> SdkResponse<()> {
        self.execute::<IgnoredAny, _>(Method::DELETE, path, |r| r)
            .await
            .map(|_| ())
    }

    async fn execute<T, F>(&self, method: Method, path: &str, prepare: F) -> SdkResponse<T>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestBuilder) -> RequestBuilder + Send,
    {
        let token = match self.token.access_token(&self.http).await {
            Ok(token) => token,
            Err(message) => return SdkResponse::failed(None, SdkError::Auth { message }),
        };

        let url = self.url(path);
        debug!("{method} {url}");

        let request = prepare(self.http.request(method, &url).bearer_auth(token));
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Request to {url} failed: {e}");
                return SdkResponse::failed(None, SdkError::from_reqwest(&e));
            }
        };

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                let http = HttpResponse {
                    status: status.as_u16(),
                    content_type,
                    body: String::new(),
                };
                return SdkResponse::failed(Some(http), SdkError::from_reqwest(&e));
            }
        };
        trace!("Response {status} from {url}: {body}");

        let http = HttpResponse {
            status: status.as_u16(),
            content_type,
            body,
        };

        if http.status >= 300 {
            let envelope = serde_json::from_str::<ServiceError>(&http.body)
                .ok()
                .filter(|e| !e.id.is_empty());
            let error = SdkError::Service {
                status: http.status,
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                envelope,
            };
            return SdkResponse::failed(Some(http), error);
        }

        if http.body.trim().is_empty() {
            return SdkResponse::ok(None, http);
        }

        match serde_json::from_str::<T>(&http.body) {
            Ok(decoded) => SdkResponse::ok(Some(decoded), http),
            Err(e) => SdkResponse::failed(
                Some(http),
                SdkError::Decode {
                    message: e.to_string(),
                },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Thing {
        id: String,
    }

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(
            &server.uri(),
            Arc::new(TokenSource::fixed("token-1")),
            Duration::from_secs(5),
        )
        .expect("client builds")
    }

    #[tokio::test]
    async fn test_get_decodes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/things/1"))
            .and(header("authorization", "Bearer token-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "1"})))
            .mount(&server)
            .await;

        let resp: SdkResponse<Thing> = client(&server).get("/things/1").await;
        assert!(!resp.is_failure());
        assert_eq!(resp.body, Some(Thing { id: "1".to_string() }));
        assert_eq!(resp.status(), Some(200));
    }

    #[tokio::test]
    async fn test_error_decodes_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/things/2"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "id": "b0c4f2a1-0000-4000-8000-000000000000",
                "code": "INVALID_DATA",
                "message": "The request could not be completed.",
                "details": [{"code": "INVALID_VALUE", "target": "name", "message": "must be unique"}]
            })))
            .mount(&server)
            .await;

        let resp: SdkResponse<Thing> = client(&server).get("/things/2").await;
        assert!(resp.is_failure());
        let envelope = resp.envelope().expect("envelope decoded");
        assert_eq!(envelope.code, "INVALID_DATA");
        assert_eq!(envelope.details[0].target.as_deref(), Some("name"));
        assert_eq!(resp.error.map(|e| e.to_string()), Some("400 Bad Request".to_string()));
    }

    #[tokio::test]
    async fn test_non_json_error_has_no_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let resp: SdkResponse<Thing> = client(&server).get("/things/3").await;
        assert!(resp.envelope().is_none());
        assert_eq!(resp.http.map(|h| h.body), Some("<html>bad gateway</html>".to_string()));
    }

    #[tokio::test]
    async fn test_delete_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/things/4"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let resp = client(&server).delete("/things/4").await;
        assert!(!resp.is_failure());
        assert!(resp.body.is_none());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport() {
        let api = ApiClient::new(
            "http://127.0.0.1:9",
            Arc::new(TokenSource::fixed("t")),
            Duration::from_secs(2),
        )
        .expect("client builds");
        let resp: SdkResponse<Thing> = api.get("/x").await;
        assert!(resp.http.is_none());
        assert!(resp.error.as_ref().is_some_and(SdkError::is_transport));
    }
}
