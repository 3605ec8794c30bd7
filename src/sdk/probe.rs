//! Environment existence probe.
//!
//! The platform answers lookups inside a deleted environment with a
//! permissions error rather than "not found". Wrapping a call's outcome with
//! [`check_environment_exists_on_permissions_error`] rewrites such failures
//! into a plain 404 once the environment itself is confirmed gone.

use tracing::warn;

use crate::pingone::{ApiClient, SdkResponse};

/// Statuses that trigger the environment lookup.
const PROBED_STATUSES: [u16; 4] = [400, 401, 403, 404];

/// Rewrites `resp` to "not found" when its environment no longer exists.
///
/// The rewritten response carries no body, no error and the environment
/// lookup's 404 response. Every other outcome passes through unchanged.
pub async fn check_environment_exists_on_permissions_error<T>(
    api: &ApiClient,
    environment_id: &str,
    resp: SdkResponse<T>,
) -> SdkResponse<T> {
    let Some(status) = resp.status() else {
        return resp;
    };
    if !resp.is_failure() || !PROBED_STATUSES.contains(&status) {
        return resp;
    }

    let env = api.read_one_environment(environment_id).await;
    if env.status() == Some(404) {
        warn!(
            "API responded with {status}, and the environment {environment_id} does not exist. Overriding resource response."
        );
        return SdkResponse {
            body: None,
            http: env.http,
            error: None,
        };
    }

    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pingone::{HttpResponse, SdkError, TokenSource};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn forbidden() -> SdkResponse<String> {
        SdkResponse::failed(
            Some(HttpResponse::new(403, "")),
            SdkError::Service {
                status: 403,
                reason: "Forbidden".to_string(),
                envelope: None,
            },
        )
    }

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(&server.uri(), Arc::new(TokenSource::fixed("t")), Duration::from_secs(5))
            .expect("client")
    }

    #[tokio::test]
    async fn test_deleted_environment_rewrites_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/environments/env-gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "id": "x", "code": "NOT_FOUND", "message": "Environment not found"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resp = check_environment_exists_on_permissions_error(&client(&server), "env-gone", forbidden()).await;
        assert!(resp.body.is_none());
        assert!(resp.error.is_none());
        assert_eq!(resp.status(), Some(404));
    }

    #[tokio::test]
    async fn test_existing_environment_keeps_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/environments/env-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "env-1"})))
            .mount(&server)
            .await;

        let resp = check_environment_exists_on_permissions_error(&client(&server), "env-1", forbidden()).await;
        assert_eq!(resp.status(), Some(403));
        assert!(resp.error.is_some());
    }

    #[tokio::test]
    async fn test_success_and_transport_pass_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(0)
            .mount(&server)
            .await;
        let api = client(&server);

        let ok = SdkResponse::ok(Some("x".to_string()), HttpResponse::new(200, "\"x\""));
        let ok = check_environment_exists_on_permissions_error(&api, "env-1", ok).await;
        assert_eq!(ok.body.as_deref(), Some("x"));

        let transport: SdkResponse<String> = SdkResponse::failed(
            None,
            SdkError::Transport {
                kind: crate::pingone::TransportKind::Connect,
                message: "refused".to_string(),
            },
        );
        let transport = check_environment_exists_on_permissions_error(&api, "env-1", transport).await;
        assert!(transport.http.is_none());

        let conflict = SdkResponse::<String>::failed(
            Some(HttpResponse::new(409, "")),
            SdkError::Service {
                status: 409,
                reason: "Conflict".to_string(),
                envelope: None,
            },
        );
        let conflict = check_environment_exists_on_permissions_error(&api, "env-1", conflict).await;
        assert_eq!(conflict.status(), Some(409));
    }
}
