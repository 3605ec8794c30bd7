//! Lazy pagination over HAL collection endpoints.
//!
//! Collection responses carry the page's entities under
//! `_embedded.<key>` and the next page under `_links.next.href`. Pages are
//! fetched only when the stream is polled, so a consumer that stops early
//! never requests the remaining pages.

use futures::Stream;
use futures::stream;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tracing::trace;

use super::client::{ApiClient, HttpResponse, SdkError};

/// One page of a paged listing.
#[derive(Debug, Clone)]
pub struct PageCursor<T> {
    /// Entities on this page.
    pub entities: Vec<T>,
    /// Raw response for this page.
    pub http: Option<HttpResponse>,
    /// Failure fetching or decoding this page.
    pub error: Option<SdkError>,
}

#[derive(Debug, Deserialize)]
struct HalPage {
    #[serde(rename = "_embedded", default)]
    embedded: HashMap<String, JsonValue>,
    #[serde(rename = "_links", default)]
    links: HalLinks,
}

#[derive(Debug, Default, Deserialize)]
struct HalLinks {
    #[serde(default)]
    next: Option<HalLink>,
}

#[derive(Debug, Deserialize)]
struct HalLink {
    href: String,
}

impl ApiClient {
    /// Streams the pages of a collection. The stream ends after the last
    /// page or after the first failed page.
    pub fn paged<'a, T>(
        &'a self,
        path: &str,
        embedded_key: &'a str,
    ) -> impl Stream<Item = PageCursor<T>> + Send + use<'a, T>
    where
        T: DeserializeOwned + Send + 'a,
    {
        stream::unfold(Some(path.to_string()), move |next| async move {
            let url = next?;
            trace!("Fetching page {url}");
            let resp = self.get::<HalPage>(&url).await;

            if let Some(error) = resp.error {
                let cursor = PageCursor {
                    entities: Vec::new(),
                    http: resp.http,
                    error: Some(error),
                };
                return Some((cursor, None));
            }

            let Some(page) = resp.body else {
                let cursor = PageCursor {
                    entities: Vec::new(),
                    http: resp.http,
                    error: None,
                };
                return Some((cursor, None));
            };

            let following = page.links.next.map(|l| l.href);
            let entities = page
                .embedded
                .get(embedded_key)
                .cloned()
                .map_or_else(|| Ok(Vec::new()), serde_json::from_value::<Vec<T>>);

            match entities {
                Ok(entities) => Some((
                    PageCursor {
                        entities,
                        http: resp.http,
                        error: None,
                    },
                    following,
                )),
                Err(e) => Some((
                    PageCursor {
                        entities: Vec::new(),
                        http: resp.http,
                        error: Some(SdkError::Decode {
                            message: e.to_string(),
                        }),
                    },
                    None,
                )),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pingone::auth::TokenSource;
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize)]
    struct Item {
        name: String,
    }

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(
            &server.uri(),
            Arc::new(TokenSource::fixed("t")),
            Duration::from_secs(5),
        )
        .expect("client")
    }

    #[tokio::test]
    async fn test_follows_next_links() {
        let server = MockServer::start().await;
        let page2 = format!("{}/items?cursor=2", server.uri());
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param("cursor", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_embedded": {"items": [{"name": "c"}]},
                "_links": {}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_embedded": {"items": [{"name": "a"}, {"name": "b"}]},
                "_links": {"next": {"href": page2}}
            })))
            .mount(&server)
            .await;

        let api = client(&server);
        let pages: Vec<PageCursor<Item>> = api.paged("/items", "items").collect().await;
        let names: Vec<String> = pages
            .into_iter()
            .flat_map(|p| p.entities)
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_stops_after_failed_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "id": "1", "code": "ACCESS_FAILED", "message": "denied"
            })))
            .mount(&server)
            .await;

        let api = client(&server);
        let pages: Vec<PageCursor<Item>> = api.paged("/items", "items").collect().await;
        assert_eq!(pages.len(), 1);
        assert!(pages[0].error.is_some());
    }
}
