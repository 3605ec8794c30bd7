//! Access token acquisition.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use tokio::sync::Mutex;
use tracing::debug;

/// Seconds before expiry at which a cached token is refreshed.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// A token issued by the auth service, held until shortly before expiry.
#[derive(Debug, Clone)]
pub struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// When the token expires.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    fn is_fresh(&self) -> bool {
        self.expires_at - ChronoDuration::seconds(REFRESH_MARGIN_SECS) > Utc::now()
    }
}

/// Source of bearer tokens for API requests.
pub enum TokenSource {
    /// A pre-issued access token.
    Static(String),

    /// OAuth 2 client credentials grant against the auth service.
    ClientCredentials {
        /// Token endpoint URL.
        token_url: String,
        /// Worker application client ID.
        client_id: String,
        /// Worker application client secret.
        client_secret: String,
        /// Cached token.
        cache: Mutex<Option<CachedToken>>,
    },
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(_) => f.debug_tuple("Static").field(&"***").finish(),
            Self::ClientCredentials {
                token_url,
                client_id,
                ..
            } => f
                .debug_struct("ClientCredentials")
                .field("token_url", token_url)
                .field("client_id", client_id)
                .field("client_secret", &"***")
                .finish_non_exhaustive(),
        }
    }
}

impl TokenSource {
    /// A fixed access token.
    #[must_use]
    pub fn fixed(token: impl Into<String>) -> Self {
        Self::Static(token.into())
    }

    /// A client credentials source.
    #[must_use]
    pub fn client_credentials(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self::ClientCredentials {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cache: Mutex::new(None),
        }
    }

    /// Returns a valid access token, requesting a new one when needed.
    ///
    /// # Errors
    ///
    /// Returns a description of the failure when the token endpoint cannot be
    /// reached or rejects the credentials.
    pub async fn access_token(&self, http: &Client) -> Result<String, String> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::ClientCredentials {
                token_url,
                client_id,
                client_secret,
                cache,
            } => {
                let mut cached = cache.lock().await;
                if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
                    return Ok(token.value.clone());
                }

                debug!("Requesting access token from {token_url}");
                let response = http
                    .post(token_url)
                    .basic_auth(client_id, Some(client_secret))
                    .header(
                        reqwest::header::CONTENT_TYPE,
                        "application/x-www-form-urlencoded",
                    )
                    .body("grant_type=client_credentials")
                    .send()
                    .await
                    .map_err(|e| e.to_string())?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(format!("token endpoint returned {status}: {body}"));
                }

                let token: TokenResponse = response.json().await.map_err(|e| e.to_string())?;
                let expires_at = Utc::now() + ChronoDuration::seconds(token.expires_in.unwrap_or(3600));
                *cached = Some(CachedToken {
                    value: token.access_token.clone(),
                    expires_at,
                });
                Ok(token.access_token)
            }
        }
    }
}
