//! The tri-state value bridge.
//!
//! [`Value<T>`] is the typed view of a single attribute: Null, Unknown or
//! Known. The `*_ok_to_tf` functions lift the API's present-or-absent
//! accessors into that view, and [`Value::expand_required`] /
//! [`Value::expand_optional`] go the other way when building request DTOs.
//! Unknown is never collapsed into Null or a zero value.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeSet;

use super::diag::{Diagnostics, REPORT_TO_MAINTAINERS};
use super::path::AttributePath;
use super::tree::{Attr, AttrValue};

/// A typed tri-state attribute value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Value<T> {
    /// Explicitly absent.
    #[default]
    Null,
    /// Known only after the next apply.
    Unknown,
    /// A concrete value.
    Known(T),
}

impl<T> Value<T> {
    /// Lifts an optional value: `None` becomes Null.
    #[must_use]
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or(Self::Null, Self::Known)
    }

    /// Returns true for Null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true for Unknown.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Returns true for Known.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Borrows the known value.
    #[must_use]
    pub const fn as_known(&self) -> Option<&T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Mutably borrows the known value.
    pub const fn as_known_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Consumes the value, keeping only a known payload.
    #[must_use]
    pub fn into_known(self) -> Option<T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Maps the known payload.
    #[must_use]
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Value<U> {
        match self {
            Self::Null => Value::Null,
            Self::Unknown => Value::Unknown,
            Self::Known(v) => Value::Known(f(v)),
        }
    }

    /// Borrowing variant of [`Value::map`].
    #[must_use]
    pub fn as_ref(&self) -> Value<&T> {
        match self {
            Self::Null => Value::Null,
            Self::Unknown => Value::Unknown,
            Self::Known(v) => Value::Known(v),
        }
    }

    /// Expansion for optional attributes: Null and Unknown both skip the field.
    #[must_use]
    pub const fn expand_optional(&self) -> Option<&T> {
        self.as_known()
    }

    /// Expansion for required attributes. Null or Unknown at this point means
    /// planning let an incomplete value through, which is a provider bug.
    pub fn expand_required(&self, path: &AttributePath, diags: &mut Diagnostics) -> Option<&T> {
        match self {
            Self::Known(v) => Some(v),
            Self::Null => {
                diags.add_attribute_error(
                    path,
                    "Unexpected null value",
                    format!("A required attribute has no value during expansion.  {REPORT_TO_MAINTAINERS}"),
                );
                None
            }
            Self::Unknown => {
                diags.add_attribute_error(
                    path,
                    "Unexpected unknown value",
                    format!("A required attribute is still unknown during expansion.  {REPORT_TO_MAINTAINERS}"),
                );
                None
            }
        }
    }
}

impl<T: Attr> Value<T> {
    /// Converts into a dynamic attribute value.
    #[must_use]
    pub fn into_attr_value(self) -> AttrValue {
        match self {
            Self::Null => AttrValue::Null,
            Self::Unknown => AttrValue::Unknown,
            Self::Known(v) => v.into_attr(),
        }
    }
}

impl<T> From<T> for Value<T> {
    fn from(value: T) -> Self {
        Self::Known(value)
    }
}

impl Value<String> {
    /// Borrows a known string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_known().map(String::as_str)
    }
}

// ============================================================================
// API → state bridges
// ============================================================================

/// Lifts an optional string.
#[must_use]
pub fn string_ok_to_tf(value: Option<&str>) -> Value<String> {
    Value::from_option(value.map(ToString::to_string))
}

/// Lifts a string where the API uses the empty string for "absent".
#[must_use]
pub fn string_to_tf(value: &str) -> Value<String> {
    if value.is_empty() {
        Value::Null
    } else {
        Value::Known(value.to_string())
    }
}

/// Lifts an optional 32-bit integer into the 64-bit attribute space.
#[must_use]
pub fn int32_ok_to_tf(value: Option<i32>) -> Value<i64> {
    Value::from_option(value.map(i64::from))
}

/// Lifts an optional 64-bit integer.
#[must_use]
pub const fn int64_ok_to_tf(value: Option<i64>) -> Value<i64> {
    match value {
        Some(v) => Value::Known(v),
        None => Value::Null,
    }
}

/// Lifts an optional boolean.
#[must_use]
pub const fn bool_ok_to_tf(value: Option<bool>) -> Value<bool> {
    match value {
        Some(v) => Value::Known(v),
        None => Value::Null,
    }
}

/// Lifts an optional float.
#[must_use]
pub const fn float64_ok_to_tf(value: Option<f64>) -> Value<f64> {
    match value {
        Some(v) => Value::Known(v),
        None => Value::Null,
    }
}

/// Lifts an optional enum through its wire name.
#[must_use]
pub fn enum_ok_to_tf<E: AsRef<str>>(value: Option<&E>) -> Value<String> {
    Value::from_option(value.map(|v| v.as_ref().to_string()))
}

/// Lifts an optional timestamp as an RFC 3339 string.
#[must_use]
pub fn time_ok_to_tf(value: Option<&DateTime<Utc>>) -> Value<String> {
    Value::from_option(value.map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
}

/// Lifts an optional reference to another object by its id.
#[must_use]
pub fn resource_id_ok_to_tf(value: Option<&str>) -> Value<String> {
    string_ok_to_tf(value)
}

/// Lifts an optional list of strings into a set.
#[must_use]
pub fn string_set_ok_to_tf(value: Option<&[String]>) -> Value<BTreeSet<String>> {
    Value::from_option(value.map(|items| items.iter().cloned().collect()))
}

/// Lifts an optional list of strings, keeping order.
#[must_use]
pub fn string_list_ok_to_tf(value: Option<&[String]>) -> Value<Vec<String>> {
    Value::from_option(value.map(<[String]>::to_vec))
}

/// Lowers a string set to the API's list form. Null skips the field; an
/// Unknown set here is a provider bug.
pub fn tf_string_set_to_vec(
    value: &Value<BTreeSet<String>>,
    path: &AttributePath,
    diags: &mut Diagnostics,
) -> Option<Vec<String>> {
    match value {
        Value::Null => None,
        Value::Unknown => {
            diags.add_attribute_error(
                path,
                "Unexpected unknown value",
                format!("Unexpected unknown value in a set of strings.  {REPORT_TO_MAINTAINERS}"),
            );
            None
        }
        Value::Known(items) => Some(items.iter().cloned().collect()),
    }
}
