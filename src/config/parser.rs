//! Loading of the deployment document.
//!
//! Documents are YAML; JSON documents parse as well since JSON is a subset
//! of YAML.

use crate::error::{ConfigError, ProviderError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::document::{DEFAULT_DOCUMENT_FILE, DeployDocument};

/// Parser for deployment documents.
#[derive(Debug, Default)]
pub struct ConfigParser;

impl ConfigParser {
    /// Creates a new parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Loads a document from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DeployDocument> {
        let path = path.as_ref();
        info!("Loading deployment document from: {}", path.display());

        if !path.exists() {
            return Err(ProviderError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a document from YAML or JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid document.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<DeployDocument> {
        debug!("Parsing deployment document");

        if content.trim().is_empty() {
            return Ok(DeployDocument::default());
        }

        let document: DeployDocument = serde_yaml::from_str(content).map_err(|e| {
            let location = match (source, e.location()) {
                (Some(p), Some(l)) => Some(format!("{}:{}:{}", p.display(), l.line(), l.column())),
                (Some(p), None) => Some(p.display().to_string()),
                (None, Some(l)) => Some(format!("line {}, column {}", l.line(), l.column())),
                (None, None) => None,
            };
            ProviderError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!(
            "Parsed {} resource(s) and {} data source(s)",
            document.resources.len(),
            document.data.len()
        );
        Ok(document)
    }
}

/// Finds the document in `start_dir` or one of its parents.
///
/// # Errors
///
/// Returns an error if no document is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    const CANDIDATES: &[&str] = &[DEFAULT_DOCUMENT_FILE, "pingone.deploy.yml", "pingone.deploy.json"];

    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in CANDIDATES {
            let candidate = current.join(filename);
            if candidate.exists() {
                info!("Found deployment document: {}", candidate.display());
                return Ok(candidate);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(ProviderError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_DOCUMENT_FILE),
    }))
}
