//! Classification of call outcomes and rendering of failures.

use std::fmt::Write as _;

use crate::framework::Diagnostic;
use crate::pingone::{ErrorDetail, HttpResponse, SdkError, ServiceError};

/// Detail codes that mark a service error as caused by user input.
const USER_FACING_DETAIL_CODES: &[&str] = &["INVALID_VALUE", "INVALID_DATA", "REQUIRED_VALUE"];

/// Outcome class of one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Classification<'a> {
    /// The call succeeded.
    Success,
    /// The target does not exist.
    NotFound,
    /// The service rejected the request.
    UserError(&'a ServiceError),
    /// The service failed.
    ServerError(&'a ServiceError),
    /// No HTTP status was received.
    TransportError,
    /// Anything else.
    Unknown,
}

/// Classifies the outcome of a call.
#[must_use]
pub fn classify<'a>(http: Option<&HttpResponse>, error: Option<&'a SdkError>) -> Classification<'a> {
    let status = http.map(|h| h.status);

    if error.is_none() && status.is_none_or(|s| s < 300) {
        return Classification::Success;
    }
    if status == Some(404) {
        return Classification::NotFound;
    }

    let Some(error) = error else {
        return Classification::Unknown;
    };

    if status.is_none() && matches!(error, SdkError::Transport { .. } | SdkError::Cancelled) {
        return Classification::TransportError;
    }

    if let Some(envelope) = error.envelope().filter(|e| !e.id.is_empty()) {
        return match status {
            Some(400..=499) => Classification::UserError(envelope),
            Some(500..) => Classification::ServerError(envelope),
            _ if envelope
                .details
                .iter()
                .any(|d| USER_FACING_DETAIL_CODES.contains(&d.code.as_str())) =>
            {
                Classification::UserError(envelope)
            }
            _ => Classification::Unknown,
        };
    }

    Classification::Unknown
}

/// Renders a service error envelope.
#[must_use]
pub fn format_service_error(label: &str, error: &ServiceError) -> Diagnostic {
    let summary = format!("Error when calling '{label}': {}", error.message);
    let mut detail = format!(
        "PingOne Error Details:\nID:\t\t{}\nCode:\t\t{}\nMessage:\t{}",
        error.id, error.code, error.message
    );

    if !error.details.is_empty() {
        let blocks: Vec<String> = error.details.iter().map(format_detail).collect();
        let _ = write!(detail, "\nDetails:\n{}", blocks.join("\n"));
    }

    Diagnostic::error(summary, detail)
}

fn format_detail(detail: &ErrorDetail) -> String {
    let mut block = String::new();
    let mut marker = "-";

    if !detail.code.is_empty() {
        let _ = writeln!(block, "  {marker} Code:\t{}", detail.code);
        marker = " ";
    }
    if !detail.message.is_empty() {
        let _ = writeln!(block, "  {marker} Message:\t{}", detail.message);
        marker = " ";
    }
    if let Some(target) = &detail.target {
        let _ = writeln!(block, "  {marker} Target:\t{target}");
        marker = " ";
    }
    if let Some(inner) = &detail.inner_error {
        let _ = writeln!(block, "  {marker} Data:");
        if let Some(v) = inner.range_minimum_value {
            let _ = writeln!(block, "      Range Min Value:\t{v}");
        }
        if let Some(v) = inner.range_maximum_value {
            let _ = writeln!(block, "      Range Max Value:\t{v}");
        }
        if let Some(v) = &inner.allowed_pattern {
            let _ = writeln!(block, "      Allowed Pattern:\t{v}");
        }
        if !inner.allowed_values.is_empty() {
            let _ = writeln!(
                block,
                "      Allowed Values:\t[{}]",
                inner.allowed_values.join(", ")
            );
        }
        if let Some(v) = inner.maximum_value {
            let _ = writeln!(block, "      Max Value:\t{v}");
        }
        if let Some(v) = &inner.referenced_values {
            let _ = writeln!(block, "      Referenced Values:\t[{}]", referenced(v));
        }
    }
    block
}

fn referenced(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map_or_else(|| v.to_string(), ToString::to_string))
            .collect::<Vec<_>>()
            .join(", "),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Renders a transport failure.
#[must_use]
pub fn format_transport(label: &str, error: &SdkError) -> Diagnostic {
    Diagnostic::error(format!("Error when calling '{label}': {error}"), "")
}

/// Renders any other failure.
#[must_use]
pub fn format_generic(label: &str, error: Option<&SdkError>, http: Option<&HttpResponse>) -> Diagnostic {
    let cause = match (error, http) {
        (Some(e), _) => e.to_string(),
        (None, Some(h)) => format!("unexpected status {}", h.status),
        (None, None) => "no response received".to_string(),
    };
    Diagnostic::error(
        format!("Error when calling '{label}': {cause}"),
        format!("A generic error has occurred.\nError details: {error:?}"),
    )
}
