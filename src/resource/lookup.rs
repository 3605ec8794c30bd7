//! First-match search over paged listings.
//!
//! Pages are pulled one at a time and the search stops at the first entity
//! the predicate accepts, so later pages are never requested. Name
//! collisions resolve to the first match in pagination order.

use futures::{Stream, StreamExt};
use tracing::trace;

use crate::pingone::{PageCursor, SdkResponse};

/// Scans `pages` for the first entity accepted by `matches`.
///
/// A failed page ends the search with that page's failure. Exhausting the
/// listing yields a successful response whose body is `Some(None)`, which
/// keeps "not found" apart from a transport or service failure.
pub async fn find_first<T, S, P>(pages: S, mut matches: P) -> SdkResponse<Option<T>>
where
    S: Stream<Item = PageCursor<T>>,
    P: FnMut(&T) -> bool,
{
    let mut pages = std::pin::pin!(pages);
    let mut first_http = None;
    let mut scanned = 0usize;

    while let Some(page) = pages.next().await {
        if let Some(error) = page.error {
            return SdkResponse::failed(page.http, error);
        }
        if first_http.is_none() {
            first_http.clone_from(&page.http);
        }

        scanned += 1;
        if let Some(found) = page.entities.into_iter().find(|e| matches(e)) {
            trace!("Lookup matched on page {scanned}");
            return SdkResponse {
                body: Some(Some(found)),
                http: page.http,
                error: None,
            };
        }
    }

    trace!("Lookup exhausted {scanned} pages without a match");
    SdkResponse {
        body: Some(None),
        http: first_http,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pingone::{ApiClient, TokenSource};
    use crate::pingone::risk::RiskPredictor;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ENV: &str = "9c9ba6a1-3c43-4d70-9d45-9a59e1f6a0b1";

    fn predictor(id: &str, name: &str) -> serde_json::Value {
        json!({"id": id, "name": name, "compactName": id, "type": "VELOCITY"})
    }

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(&server.uri(), Arc::new(TokenSource::fixed("t")), Duration::from_secs(5))
            .expect("client")
    }

    async fn two_pages(server: &MockServer, second_page_calls: u64) {
        let listing = format!("/environments/{ENV}/riskPredictors");
        Mock::given(method("GET"))
            .and(path(listing.clone()))
            .and(query_param("cursor", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_embedded": {"riskPredictors": [predictor("p3", "Gamma"), predictor("p4", "Beta")]},
                "_links": {}
            })))
            .expect(second_page_calls)
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(listing.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_embedded": {"riskPredictors": [predictor("p1", "Alpha"), predictor("p2", "Beta")]},
                "_links": {"next": {"href": format!("{}{listing}?cursor=2", server.uri())}}
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_stops_at_first_match() {
        let server = MockServer::start().await;
        two_pages(&server, 0).await;

        let api = client(&server);
        let resp = find_first(api.read_all_risk_predictors(ENV), |p: &RiskPredictor| p.name == "Beta").await;

        let found = resp.body.flatten().expect("match");
        assert_eq!(found.id.as_deref(), Some("p2"));
    }

    #[tokio::test]
    async fn test_exhausted_listing_is_not_an_error() {
        let server = MockServer::start().await;
        two_pages(&server, 1).await;

        let api = client(&server);
        let resp = find_first(api.read_all_risk_predictors(ENV), |p: &RiskPredictor| p.name == "Delta").await;

        assert!(resp.error.is_none());
        assert_eq!(resp.body.map(|b| b.is_none()), Some(true));
    }

    #[tokio::test]
    async fn test_failed_page_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "id": "e1", "code": "UNEXPECTED_ERROR", "message": "boom"
            })))
            .mount(&server)
            .await;

        let api = client(&server);
        let resp = find_first(api.read_all_risk_predictors(ENV), |_: &RiskPredictor| true).await;
        assert!(resp.is_failure());
        assert!(resp.body.is_none());
    }
}
