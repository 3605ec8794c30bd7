//! Error types for the `PingOne` provider host.
//!
//! Resource operations report user-facing problems as
//! [`Diagnostics`](crate::framework::Diagnostics). The types here cover the
//! host around them: configuration, state storage, client construction and
//! planning.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the provider host.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// State management errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// `PingOne` API client errors.
    #[error("PingOne API error: {0}")]
    Api(#[from] ApiError),

    /// Planning and apply errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// Unknown region code.
    #[error("Invalid region code: {code} (expected one of AP, AU, CA, EU, NA, SG)")]
    InvalidRegion {
        /// The offending code.
        code: String,
    },

    /// Duplicate resource address.
    #[error("Duplicate resource address: {address}")]
    DuplicateResource {
        /// The duplicated address.
        address: String,
    },

    /// Resource or data source type not served by this provider.
    #[error("Unsupported {kind} type: {type_name}")]
    UnknownType {
        /// `resource` or `data source`.
        kind: String,
        /// The unknown type name.
        type_name: String,
    },

    /// A `${...}` reference names something that does not exist.
    #[error("Unresolved reference {reference} in {address}")]
    UnresolvedReference {
        /// The reference text.
        reference: String,
        /// Address of the block containing it.
        address: String,
    },

    /// Circular dependency detected.
    #[error("Circular dependency detected: {cycle}")]
    CircularDependency {
        /// Description of the cycle.
        cycle: String,
    },
}

/// State management errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// State file not found.
    #[error("State file not found: {path}")]
    NotFound {
        /// Path to the missing state file.
        path: PathBuf,
    },

    /// State is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// State lock acquisition failed.
    #[error("Failed to acquire state lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// State lock is held by another process.
    #[error("State is locked by another process (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// State version mismatch.
    #[error("State version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected state version.
        expected: String,
        /// Found state version.
        found: String,
    },

    /// No resource at the given address.
    #[error("No resource in state at address {address}")]
    ResourceNotFound {
        /// The requested address.
        address: String,
    },
}

/// `PingOne` API client errors raised outside of a resource operation.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {message}")]
    ClientBuild {
        /// Description of the failure.
        message: String,
    },

    /// Authentication failed.
    #[error("PingOne authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// A base URL could not be parsed.
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser message.
        message: String,
    },
}

/// Planning and apply errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Diagnostics contained errors.
    #[error("{count} error(s) reported")]
    Diagnostics {
        /// Number of error diagnostics.
        count: usize,
    },

    /// The plan contains values that cannot be applied yet.
    #[error("Cannot apply {address}: {message}")]
    NotApplicable {
        /// Resource address.
        address: String,
        /// Reason.
        message: String,
    },

    /// Apply was aborted.
    #[error("Apply aborted: {reason}")]
    Aborted {
        /// Reason for abort.
        reason: String,
    },
}

/// Result type alias for provider host operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

impl ProviderError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if retrying the whole command may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::State(StateError::LockFailed { .. } | StateError::LockedByOther { .. })
        )
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a parse error without a location.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location: None,
        }
    }
}

impl StateError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Creates a corruption error with the given message.
    #[must_use]
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::State(StateError::serialization(err.to_string()))
    }
}

impl From<serde_yaml::Error> for ProviderError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(ConfigError::ParseError {
            message: err.to_string(),
            location: err.location().map(|l| format!("line {}, column {}", l.line(), l.column())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::Config(ConfigError::MissingEnvVar {
            name: "PINGONE_CLIENT_ID".to_string(),
        });
        assert!(err.to_string().contains("PINGONE_CLIENT_ID"));
    }

    #[test]
    fn test_lock_errors_are_retryable() {
        let err = ProviderError::State(StateError::LockedByOther {
            holder: "host:1".to_string(),
            since: "now".to_string(),
        });
        assert!(err.is_retryable());
        assert!(!ProviderError::internal("boom").is_retryable());
    }

    #[test]
    fn test_yaml_error_carries_location() {
        let err: std::result::Result<serde_yaml::Value, _> = serde_yaml::from_str("a: [b");
        let err = ProviderError::from(err.expect_err("invalid yaml"));
        assert!(matches!(
            err,
            ProviderError::Config(ConfigError::ParseError { location: Some(_), .. })
        ));
    }
}
