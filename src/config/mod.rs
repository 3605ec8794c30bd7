//! Configuration.
//!
//! This module handles:
//! - Provider connection settings from the environment
//! - Parsing the deployment document
//! - Structural validation and `${...}` reference ordering
//! - Configuration hashes for change detection

mod document;
mod graph;
mod hash;
mod parser;
mod provider;
mod validator;

pub use document::{Address, Block, BlockKind, DEFAULT_DOCUMENT_FILE, DeployDocument, ProviderBlock};
pub use graph::{DependencyGraph, Reference, references_in};
pub use hash::ConfigHasher;
pub use parser::{ConfigParser, find_config_file};
pub use provider::{
    ENV_ACCESS_TOKEN, ENV_API_HOSTNAME, ENV_AUTH_HOSTNAME, ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_ENVIRONMENT_ID,
    ENV_HTTP_TIMEOUT, ENV_MAX_BACKOFF, ENV_MIN_BACKOFF, ENV_REGION_CODE, ENV_RETRY_TIMEOUT, ProviderConfig, load_dotenv,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
