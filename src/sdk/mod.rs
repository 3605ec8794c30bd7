//! Call execution engine between resources and the platform client.
//!
//! This module provides:
//! - Deadline-bounded retries with backoff and cancellation
//! - Classification of call outcomes
//! - Rendering of failures as diagnostics
//! - The response parser used by every resource operation
//! - The environment existence probe

mod classify;
mod context;
mod probe;
mod response;
mod retry;

pub use classify::{Classification, classify, format_generic, format_service_error, format_transport};
pub use context::OpContext;
pub use probe::check_environment_exists_on_permissions_error;
pub use response::{
    CallOptions, CustomError, custom_error_invalid_value, custom_error_resource_not_found_warning,
    default_custom_error, parse_response,
};
pub use retry::{
    Backoff, DEFAULT_MAX_BACKOFF, DEFAULT_MIN_BACKOFF, DEFAULT_RETRY_TIMEOUT, RetrySettings,
    Retryable, default_create_read_retryable, default_retryable, is_transient, retry_wrapper,
};
