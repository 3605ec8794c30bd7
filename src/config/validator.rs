//! Structural validation of deployment documents.
//!
//! Attribute values are checked later against the provider's schemas; this
//! pass only checks what the document itself must get right: names, types
//! and address uniqueness.

use crate::error::{ConfigError, ProviderError, Result};
use std::collections::BTreeSet;
use tracing::debug;

use super::document::{Address, DeployDocument};

/// Validator for deployment documents.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    /// Resource types the provider serves.
    resource_types: BTreeSet<String>,
    /// Data source types the provider serves.
    data_types: BTreeSet<String>,
}

/// Validation result containing all problems found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The block or field that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a validator for the given resource and data source types.
    #[must_use]
    pub fn new<'a>(
        resource_types: impl IntoIterator<Item = &'a str>,
        data_types: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            resource_types: resource_types.into_iter().map(str::to_string).collect(),
            data_types: data_types.into_iter().map(str::to_string).collect(),
        }
    }

    /// Validates a document.
    ///
    /// # Errors
    ///
    /// Returns the first problem found: an unknown type, a duplicate address
    /// or a malformed block.
    pub fn validate(&self, document: &DeployDocument) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();
        let mut seen = BTreeSet::new();

        for (address, block) in document.blocks() {
            let field = address.to_string();

            let known = match address.kind {
                super::document::BlockKind::Resource => &self.resource_types,
                super::document::BlockKind::Data => &self.data_types,
            };
            if !known.contains(&block.type_name) {
                let kind = match address.kind {
                    super::document::BlockKind::Resource => "resource",
                    super::document::BlockKind::Data => "data source",
                };
                return Err(ProviderError::Config(ConfigError::UnknownType {
                    kind: kind.to_string(),
                    type_name: block.type_name.clone(),
                }));
            }

            if !is_valid_name(&block.name) {
                result.errors.push(ValidationError {
                    field: field.clone(),
                    message: format!(
                        "Name '{}' is invalid. Must start with a letter or underscore and contain only letters, digits, underscores and hyphens.",
                        block.name
                    ),
                });
            }

            if !block.config.is_object() {
                result.errors.push(ValidationError {
                    field: format!("{field}.config"),
                    message: String::from("config must be a mapping of attribute names to values"),
                });
            }

            if !seen.insert(address.clone()) {
                return Err(ProviderError::Config(ConfigError::DuplicateResource {
                    address: field,
                }));
            }
        }

        if document.resources.is_empty() {
            result
                .warnings
                .push(String::from("The document declares no managed resources"));
        }

        if result.errors.is_empty() {
            debug!("Document validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(ProviderError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Whether `address` names a type this provider serves.
    #[must_use]
    pub fn knows(&self, address: &Address) -> bool {
        match address.kind {
            super::document::BlockKind::Resource => self.resource_types.contains(&address.type_name),
            super::document::BlockKind::Data => self.data_types.contains(&address.type_name),
        }
    }
}

/// Block names follow identifier rules.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
