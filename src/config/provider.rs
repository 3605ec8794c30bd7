//! Provider connection settings read from the environment.
//!
//! Values come from process environment variables, optionally seeded from a
//! `.env` file. The desired-state document may override the region.

use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ConfigError, ProviderError, Result};
use crate::pingone::{DEFAULT_HTTP_TIMEOUT_SECS, Region};
use crate::sdk::{Backoff, DEFAULT_MAX_BACKOFF, DEFAULT_MIN_BACKOFF, DEFAULT_RETRY_TIMEOUT, RetrySettings};

/// Worker application client ID.
pub const ENV_CLIENT_ID: &str = "PINGONE_CLIENT_ID";
/// Worker application client secret.
pub const ENV_CLIENT_SECRET: &str = "PINGONE_CLIENT_SECRET";
/// Environment owning the worker application.
pub const ENV_ENVIRONMENT_ID: &str = "PINGONE_ENVIRONMENT_ID";
/// Pre-issued access token.
pub const ENV_ACCESS_TOKEN: &str = "PINGONE_API_ACCESS_TOKEN";
/// Region code.
pub const ENV_REGION_CODE: &str = "PINGONE_REGION_CODE";
/// API hostname override.
pub const ENV_API_HOSTNAME: &str = "PINGONE_API_SERVICE_HOSTNAME";
/// Auth hostname override.
pub const ENV_AUTH_HOSTNAME: &str = "PINGONE_AUTH_SERVICE_HOSTNAME";
/// Per-request HTTP timeout in seconds.
pub const ENV_HTTP_TIMEOUT: &str = "PINGONE_HTTP_TIMEOUT_SECS";
/// Overall retry deadline in seconds.
pub const ENV_RETRY_TIMEOUT: &str = "PINGONE_RETRY_TIMEOUT_SECS";
/// Minimum retry delay in milliseconds.
pub const ENV_MIN_BACKOFF: &str = "PINGONE_RETRY_MIN_BACKOFF_MS";
/// Maximum retry delay in milliseconds.
pub const ENV_MAX_BACKOFF: &str = "PINGONE_RETRY_MAX_BACKOFF_MS";

/// Connection settings for the platform.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Worker application client ID.
    pub client_id: Option<String>,
    /// Worker application client secret.
    pub client_secret: Option<String>,
    /// Environment owning the worker application.
    pub environment_id: Option<String>,
    /// Pre-issued access token; replaces client credentials when set.
    pub access_token: Option<String>,
    /// Region of the environments.
    pub region: Region,
    /// API hostname override.
    pub api_hostname: Option<String>,
    /// Auth hostname override.
    pub auth_hostname: Option<String>,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
    /// Retry deadline and backoff.
    pub retry: RetrySettings,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("client_id", &self.client_id)
            .field("environment_id", &self.environment_id)
            .field("region", &self.region)
            .field("api_hostname", &self.api_hostname)
            .field("auth_hostname", &self.auth_hostname)
            .field("http_timeout", &self.http_timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ProviderConfig {
    /// Reads the settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are incomplete or a value is malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the settings through `lookup`, which returns a variable's value.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are incomplete or a value is malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let access_token = get(ENV_ACCESS_TOKEN);
        let client_id = get(ENV_CLIENT_ID);
        let client_secret = get(ENV_CLIENT_SECRET);
        let environment_id = get(ENV_ENVIRONMENT_ID);

        if access_token.is_none() {
            for (name, value) in [
                (ENV_CLIENT_ID, &client_id),
                (ENV_CLIENT_SECRET, &client_secret),
                (ENV_ENVIRONMENT_ID, &environment_id),
            ] {
                if value.is_none() {
                    return Err(ProviderError::Config(ConfigError::MissingEnvVar {
                        name: name.to_string(),
                    }));
                }
            }
        }

        let region = match get(ENV_REGION_CODE) {
            Some(code) => code.trim().parse()?,
            None => Region::Na,
        };

        let seconds = |name: &str, default: Duration| parse_duration(&get, name, default, Duration::from_secs);
        let millis = |name: &str, default: Duration| parse_duration(&get, name, default, Duration::from_millis);

        let config = Self {
            client_id,
            client_secret,
            environment_id,
            access_token,
            region,
            api_hostname: get(ENV_API_HOSTNAME),
            auth_hostname: get(ENV_AUTH_HOSTNAME),
            http_timeout: seconds(ENV_HTTP_TIMEOUT, Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))?,
            retry: RetrySettings {
                timeout: seconds(ENV_RETRY_TIMEOUT, DEFAULT_RETRY_TIMEOUT)?,
                backoff: Backoff::new(
                    millis(ENV_MIN_BACKOFF, DEFAULT_MIN_BACKOFF)?,
                    millis(ENV_MAX_BACKOFF, DEFAULT_MAX_BACKOFF)?,
                ),
            },
        };
        debug!("Provider configuration: {config:?}");
        Ok(config)
    }

    /// Replaces the region when `region` is set.
    #[must_use]
    pub fn with_region(mut self, region: Option<Region>) -> Self {
        if let Some(region) = region {
            debug!("Region overridden to {region} by the deployment document");
            self.region = region;
        }
        self
    }

    /// Base URL of the platform API, e.g. `https://api.pingone.eu/v1`.
    #[must_use]
    pub fn api_base_url(&self) -> String {
        let host = self
            .api_hostname
            .clone()
            .unwrap_or_else(|| self.region.api_hostname());
        format!("https://{host}/v1")
    }

    /// Token endpoint of the worker application's environment.
    #[must_use]
    pub fn token_url(&self) -> String {
        let host = self
            .auth_hostname
            .clone()
            .unwrap_or_else(|| self.region.auth_hostname());
        format!(
            "https://{host}/{}/as/token",
            self.environment_id.as_deref().unwrap_or_default()
        )
    }
}

fn parse_duration(
    get: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: Duration,
    unit: fn(u64) -> Duration,
) -> Result<Duration> {
    get(name).map_or(Ok(default), |raw| {
        raw.trim().parse::<u64>().map(unit).map_err(|_| {
            ProviderError::Config(ConfigError::validation(
                format!("{name} must be a non-negative integer, got \"{raw}\""),
                name,
            ))
        })
    })
}

/// Loads a `.env` file from `dir` when present.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be loaded.
pub fn load_dotenv(dir: impl AsRef<Path>) -> Result<()> {
    let env_path = dir.as_ref().join(".env");

    if env_path.exists() {
        info!("Loading environment from: {}", env_path.display());
        dotenvy::from_path(&env_path).map_err(|e| {
            ProviderError::Config(ConfigError::ParseError {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })
        })?;
    } else {
        debug!(".env file not found at: {}", env_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_client_credentials_and_defaults() {
        let config = ProviderConfig::from_lookup(lookup(&[
            (ENV_CLIENT_ID, "cid"),
            (ENV_CLIENT_SECRET, "secret"),
            (ENV_ENVIRONMENT_ID, "env-1"),
        ]))
        .expect("config");

        assert_eq!(config.region, Region::Na);
        assert_eq!(config.api_base_url(), "https://api.pingone.com/v1");
        assert_eq!(config.token_url(), "https://auth.pingone.com/env-1/as/token");
        assert_eq!(config.retry, RetrySettings::default());
    }

    #[test]
    fn test_access_token_alone_is_enough() {
        let config = ProviderConfig::from_lookup(lookup(&[
            (ENV_ACCESS_TOKEN, "tok"),
            (ENV_REGION_CODE, "eu"),
            (ENV_MIN_BACKOFF, "1"),
        ]))
        .expect("config");
        assert_eq!(config.access_token.as_deref(), Some("tok"));
        assert_eq!(config.api_base_url(), "https://api.pingone.eu/v1");
    }

    #[test]
    fn test_partial_credentials_rejected() {
        let err = ProviderConfig::from_lookup(lookup(&[(ENV_CLIENT_ID, "cid")])).expect_err("missing");
        assert!(matches!(
            err,
            ProviderError::Config(ConfigError::MissingEnvVar { name }) if name == ENV_CLIENT_SECRET
        ));
    }

    #[test]
    fn test_hostname_and_region_overrides() {
        let config = ProviderConfig::from_lookup(lookup(&[
            (ENV_ACCESS_TOKEN, "tok"),
            (ENV_API_HOSTNAME, "api.internal.test"),
            (ENV_RETRY_TIMEOUT, "30"),
        ]))
        .expect("config")
        .with_region(Some(Region::Ca));

        assert_eq!(config.api_base_url(), "https://api.internal.test/v1");
        assert_eq!(config.token_url(), "https://auth.pingone.ca//as/token");
        assert_eq!(config.retry.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_malformed_number_rejected() {
        let err = ProviderConfig::from_lookup(lookup(&[(ENV_ACCESS_TOKEN, "tok"), (ENV_HTTP_TIMEOUT, "soon")]))
            .expect_err("malformed");
        assert!(matches!(err, ProviderError::Config(ConfigError::ValidationError { .. })));
    }
}
