//! Platform error envelope.

use serde::{Deserialize, Serialize};

/// Structured error body returned by the platform on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceError {
    /// Correlation ID.
    #[serde(default)]
    pub id: String,
    /// Top-level error code, e.g. `INVALID_DATA`.
    #[serde(default)]
    pub code: String,
    /// Top-level message.
    #[serde(default)]
    pub message: String,
    /// Per-field details.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorDetail>,
}

/// One entry of [`ServiceError::details`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    /// Detail code, e.g. `INVALID_VALUE`.
    #[serde(default)]
    pub code: String,
    /// Detail message.
    #[serde(default)]
    pub message: String,
    /// Offending field, when the platform names one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Constraint information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_error: Option<InnerError>,
}

/// Constraint information attached to an [`ErrorDetail`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InnerError {
    /// Minimum of an allowed range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_minimum_value: Option<i64>,
    /// Maximum of an allowed range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_maximum_value: Option<i64>,
    /// Maximum allowed value or length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_value: Option<i64>,
    /// Pattern the value must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_pattern: Option<String>,
    /// Allowed values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
    /// Values referenced by the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_values: Option<serde_json::Value>,
}

impl ServiceError {
    /// Builds an envelope with a code and message.
    #[must_use]
    pub fn new(id: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Appends a detail.
    #[must_use]
    pub fn with_detail(mut self, detail: ErrorDetail) -> Self {
        self.details.push(detail);
        self
    }

    /// The first detail, if any.
    #[must_use]
    pub fn first_detail(&self) -> Option<&ErrorDetail> {
        self.details.first()
    }
}

impl ErrorDetail {
    /// Builds a detail.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    /// Sets the target field.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Sets the inner error.
    #[must_use]
    pub fn with_inner(mut self, inner: InnerError) -> Self {
        self.inner_error = Some(inner);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_full_envelope() {
        let envelope: ServiceError = serde_json::from_value(json!({
            "id": "abc",
            "code": "INVALID_DATA",
            "message": "The request could not be completed.",
            "details": [{
                "code": "OUT_OF_RANGE",
                "target": "minScore",
                "message": "must be between 1 and 100",
                "innerError": {"rangeMinimumValue": 1, "rangeMaximumValue": 100}
            }]
        }))
        .expect("decodes");

        let detail = envelope.first_detail().expect("detail");
        assert_eq!(detail.target.as_deref(), Some("minScore"));
        let inner = detail.inner_error.as_ref().expect("inner");
        assert_eq!(inner.range_minimum_value, Some(1));
        assert_eq!(inner.range_maximum_value, Some(100));
    }

    #[test]
    fn test_decode_minimal_envelope() {
        let envelope: ServiceError =
            serde_json::from_value(json!({"id": "x", "code": "NOT_FOUND"})).expect("decodes");
        assert!(envelope.details.is_empty());
        assert!(envelope.message.is_empty());
    }
}
