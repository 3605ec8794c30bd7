//! Composite import identifiers.
//!
//! Resources are imported with slash-joined IDs such as
//! `environment_id/voice_phrase_id`. Each component is checked against its
//! own pattern and written to its own state key.

use regex::Regex;
use std::collections::BTreeMap;
use thiserror::Error;

use super::validator::RESOURCE_ID_PATTERN;

/// State key receiving the primary component.
pub const PRIMARY_ID_KEY: &str = "id";

/// One component of a composite import ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportComponent {
    /// Label shown in the expected format, and the state key for
    /// non-primary components.
    pub label: &'static str,
    /// Unanchored pattern the component must match.
    pub pattern: &'static str,
    /// Whether this component is the resource's own ID.
    pub primary_id: bool,
}

impl ImportComponent {
    /// A component holding a platform resource ID.
    #[must_use]
    pub const fn resource_id(label: &'static str) -> Self {
        Self {
            label,
            pattern: RESOURCE_ID_PATTERN,
            primary_id: false,
        }
    }

    /// The primary platform resource ID component.
    #[must_use]
    pub const fn primary(label: &'static str) -> Self {
        Self {
            label,
            pattern: RESOURCE_ID_PATTERN,
            primary_id: true,
        }
    }

    /// State key this component is written to.
    #[must_use]
    pub const fn state_key(&self) -> &'static str {
        if self.primary_id {
            PRIMARY_ID_KEY
        } else {
            self.label
        }
    }
}

/// Errors from parsing an import ID.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImportError {
    /// The ID does not match the expected format.
    #[error(
        "Invalid import ID specified (\"{id}\").  The ID should be in the format \"{format}\" and must match regex: {regex}"
    )]
    InvalidFormat {
        /// The offending ID.
        id: String,
        /// Human-readable expected format.
        format: String,
        /// The full regex.
        regex: String,
    },

    /// The component patterns do not form a valid regex.
    #[error("Invalid import ID pattern: {message}")]
    InvalidPattern {
        /// Regex compiler message.
        message: String,
    },
}

/// Parses `id` into a map of state key to component value.
///
/// # Errors
///
/// Returns [`ImportError::InvalidFormat`] when the ID has the wrong number of
/// components, an empty component, or a component that does not match its
/// pattern.
pub fn parse_import_id(
    id: &str,
    components: &[ImportComponent],
) -> Result<BTreeMap<String, String>, ImportError> {
    let format = components
        .iter()
        .map(|c| c.label)
        .collect::<Vec<_>>()
        .join("/");
    let pattern = format!(
        "^{}$",
        components
            .iter()
            .map(|c| format!("({})", c.pattern))
            .collect::<Vec<_>>()
            .join(r"\/")
    );

    let regex = Regex::new(&pattern).map_err(|e| ImportError::InvalidPattern {
        message: e.to_string(),
    })?;

    let invalid = || ImportError::InvalidFormat {
        id: id.to_string(),
        format: format.clone(),
        regex: pattern.clone(),
    };

    if !regex.is_match(id) {
        return Err(invalid());
    }

    let parts: Vec<&str> = id.splitn(components.len(), '/').collect();
    if parts.len() != components.len() || parts.iter().any(|p| p.is_empty()) {
        return Err(invalid());
    }

    Ok(components
        .iter()
        .zip(parts)
        .map(|(component, value)| (component.state_key().to_string(), value.to_string()))
        .collect())
}
