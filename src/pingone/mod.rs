//! `PingOne` platform API client.
//!
//! This module provides:
//! - Token acquisition (client credentials or a static token)
//! - A REST client returning `(body, http, error)` triples
//! - Lazy HAL pagination
//! - Typed DTOs and endpoints for the management, MFA, risk and verify APIs

mod auth;
mod client;
mod envelope;
pub mod management;
pub mod mfa;
mod paging;
mod region;
pub mod risk;
pub mod verify;

pub use auth::{CachedToken, TokenSource};
pub use client::{
    ApiClient, DEFAULT_HTTP_TIMEOUT_SECS, HttpResponse, SdkError, SdkResponse, TransportKind,
};
pub use envelope::{ErrorDetail, InnerError, ServiceError};
pub use management::ObjectReference;
pub use paging::PageCursor;
pub use region::Region;

use std::sync::Arc;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::Result;

/// Clients shared by every resource operation.
#[derive(Debug, Clone)]
pub struct ClientBundle {
    /// Platform API client.
    pub api: ApiClient,
    /// Region the clients point at.
    pub region: Region,
}

impl ClientBundle {
    /// Builds the clients from provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let token = match &config.access_token {
            Some(token) => TokenSource::fixed(token.clone()),
            None => TokenSource::client_credentials(
                config.token_url(),
                config.client_id.clone().unwrap_or_default(),
                config.client_secret.clone().unwrap_or_default(),
            ),
        };

        let base_url = config.api_base_url();
        debug!("Using PingOne API at {base_url} (region {})", config.region);

        let api = ApiClient::new(&base_url, Arc::new(token), config.http_timeout)?;
        Ok(Self {
            api,
            region: config.region,
        })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_api(api: ApiClient, region: Region) -> Self {
        Self { api, region }
    }
}
