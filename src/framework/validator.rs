//! Attribute validators.
//!
//! Validators are pure: they look at the configuration tree and the value of
//! the attribute they are attached to, and report diagnostics. They never
//! consult state, and every validator treats Unknown as "not yet decidable".

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use super::diag::Diagnostics;
use super::path::{AttributePath, PathExpression};
use super::tree::{AttrValue, Tree};

/// Unanchored pattern of a platform resource identifier.
pub const RESOURCE_ID_PATTERN: &str =
    "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}";

#[allow(clippy::expect_used)]
static RESOURCE_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{RESOURCE_ID_PATTERN}$")).expect("resource id pattern compiles")
});

/// Returns true when `value` is shaped like a platform resource identifier.
#[must_use]
pub fn is_resource_id(value: &str) -> bool {
    RESOURCE_ID_REGEX.is_match(value)
}

/// Input to a validator.
#[derive(Debug, Clone, Copy)]
pub struct ValidatorRequest<'a> {
    /// The whole configuration tree.
    pub config: &'a Tree,
    /// Path of the attribute being validated.
    pub path: &'a AttributePath,
    /// Configured value of the attribute.
    pub value: &'a AttrValue,
}

/// A reusable attribute validator.
pub trait Validator: Send + Sync + fmt::Debug {
    /// Plain-text description used in schema documentation.
    fn description(&self) -> String;

    /// Validates the value.
    fn validate(&self, request: &ValidatorRequest<'_>) -> Diagnostics;
}

fn invalid_value(path: &AttributePath, detail: String) -> Diagnostics {
    let mut diags = Diagnostics::new();
    diags.add_attribute_error(path, "Invalid Attribute Value", detail);
    diags
}

// ============================================================================
// Integer validators
// ============================================================================

/// Requires an integer to be an exact multiple of a denominator.
#[derive(Debug, Clone, Copy)]
pub struct IsDivisibleBy {
    denominator: i64,
}

impl IsDivisibleBy {
    /// Creates the validator.
    #[must_use]
    pub const fn new(denominator: i64) -> Self {
        Self { denominator }
    }
}

impl Validator for IsDivisibleBy {
    fn description(&self) -> String {
        format!("value must be exactly divisible by {}", self.denominator)
    }

    fn validate(&self, request: &ValidatorRequest<'_>) -> Diagnostics {
        let Some(value) = request.value.as_i64() else {
            return Diagnostics::new();
        };
        if value.checked_rem(self.denominator) == Some(0) {
            return Diagnostics::new();
        }
        invalid_value(
            request.path,
            format!(
                "value {value} is not valid; must be exactly divisible by {}",
                self.denominator
            ),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Greater,
    Less,
}

/// Shared implementation of the path-relative integer comparisons.
#[derive(Debug, Clone)]
struct PathValueComparison {
    comparison: Comparison,
    expressions: Vec<PathExpression>,
}

impl PathValueComparison {
    fn validate(&self, request: &ValidatorRequest<'_>) -> Diagnostics {
        let Some(own) = request.value.as_i64() else {
            return Diagnostics::new();
        };

        let mut peers = Vec::new();
        for expression in &self.expressions {
            for path in expression.matching_paths(request.config, request.path) {
                if path == *request.path {
                    continue;
                }
                let value = request.config.value_at(&path);
                peers.push((path, value));
            }
        }

        if peers.iter().any(|(_, value)| value.is_unknown()) {
            return Diagnostics::new();
        }

        let mut diags = Diagnostics::new();
        for (path, value) in peers {
            let Some(peer) = value.as_i64() else {
                continue;
            };
            let (violated, word) = match self.comparison {
                Comparison::Greater => (peer >= own, "greater"),
                Comparison::Less => (peer <= own, "less"),
            };
            if violated {
                diags.add_attribute_error(
                    request.path,
                    "Invalid Attribute Value",
                    format!("value {own} is not {word} than {peer} at {path}"),
                );
            }
        }
        diags
    }

    fn description(&self) -> String {
        let word = match self.comparison {
            Comparison::Greater => "greater",
            Comparison::Less => "less",
        };
        let targets: Vec<String> = self.expressions.iter().map(ToString::to_string).collect();
        format!("value must be {word} than the value at {}", targets.join(", "))
    }
}

/// Requires an integer to be strictly greater than the integers at other paths.
#[derive(Debug, Clone)]
pub struct IsGreaterThanPathValue(PathValueComparison);

impl IsGreaterThanPathValue {
    /// Creates the validator.
    #[must_use]
    pub fn new(expressions: Vec<PathExpression>) -> Self {
        Self(PathValueComparison {
            comparison: Comparison::Greater,
            expressions,
        })
    }
}

impl Validator for IsGreaterThanPathValue {
    fn description(&self) -> String {
        self.0.description()
    }

    fn validate(&self, request: &ValidatorRequest<'_>) -> Diagnostics {
        self.0.validate(request)
    }
}

/// Requires an integer to be strictly less than the integers at other paths.
#[derive(Debug, Clone)]
pub struct IsLessThanPathValue(PathValueComparison);

impl IsLessThanPathValue {
    /// Creates the validator.
    #[must_use]
    pub fn new(expressions: Vec<PathExpression>) -> Self {
        Self(PathValueComparison {
            comparison: Comparison::Less,
            expressions,
        })
    }
}

impl Validator for IsLessThanPathValue {
    fn description(&self) -> String {
        self.0.description()
    }

    fn validate(&self, request: &ValidatorRequest<'_>) -> Diagnostics {
        self.0.validate(request)
    }
}

/// Inclusive lower bound on an integer.
#[derive(Debug, Clone, Copy)]
pub struct AtLeast(pub i64);

impl Validator for AtLeast {
    fn description(&self) -> String {
        format!("value must be at least {}", self.0)
    }

    fn validate(&self, request: &ValidatorRequest<'_>) -> Diagnostics {
        match request.value.as_i64() {
            Some(v) if v < self.0 => invalid_value(
                request.path,
                format!("Attribute {} value must be at least {}, got: {v}", request.path, self.0),
            ),
            _ => Diagnostics::new(),
        }
    }
}

/// Inclusive upper bound on an integer.
#[derive(Debug, Clone, Copy)]
pub struct AtMost(pub i64);

impl Validator for AtMost {
    fn description(&self) -> String {
        format!("value must be at most {}", self.0)
    }

    fn validate(&self, request: &ValidatorRequest<'_>) -> Diagnostics {
        match request.value.as_i64() {
            Some(v) if v > self.0 => invalid_value(
                request.path,
                format!("Attribute {} value must be at most {}, got: {v}", request.path, self.0),
            ),
            _ => Diagnostics::new(),
        }
    }
}

// ============================================================================
// String validators
// ============================================================================

/// Minimum string length in characters.
#[derive(Debug, Clone, Copy)]
pub struct LengthAtLeast(pub usize);

impl Validator for LengthAtLeast {
    fn description(&self) -> String {
        format!("string length must be at least {}", self.0)
    }

    fn validate(&self, request: &ValidatorRequest<'_>) -> Diagnostics {
        let mut diags = Diagnostics::new();
        if let Some(s) = request.value.as_str() {
            let len = s.chars().count();
            if len < self.0 {
                diags.add_attribute_error(
                    request.path,
                    "Invalid Attribute Value Length",
                    format!(
                        "Attribute {} string length must be at least {}, got: {len}",
                        request.path, self.0
                    ),
                );
            }
        }
        diags
    }
}

/// Maximum string length in characters.
#[derive(Debug, Clone, Copy)]
pub struct LengthAtMost(pub usize);

impl Validator for LengthAtMost {
    fn description(&self) -> String {
        format!("string length must be at most {}", self.0)
    }

    fn validate(&self, request: &ValidatorRequest<'_>) -> Diagnostics {
        let mut diags = Diagnostics::new();
        if let Some(s) = request.value.as_str() {
            let len = s.chars().count();
            if len > self.0 {
                diags.add_attribute_error(
                    request.path,
                    "Invalid Attribute Value Length",
                    format!(
                        "Attribute {} string length must be at most {}, got: {len}",
                        request.path, self.0
                    ),
                );
            }
        }
        diags
    }
}

/// Restricts a string to a fixed set of values.
#[derive(Debug, Clone)]
pub struct OneOf(Vec<String>);

impl OneOf {
    /// Creates the validator.
    #[must_use]
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }

    /// The allowed values.
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.0
    }
}

impl Validator for OneOf {
    fn description(&self) -> String {
        let quoted: Vec<String> = self.0.iter().map(|v| format!("\"{v}\"")).collect();
        format!("value must be one of: [{}]", quoted.join(" "))
    }

    fn validate(&self, request: &ValidatorRequest<'_>) -> Diagnostics {
        match request.value.as_str() {
            Some(s) if !self.0.iter().any(|v| v == s) => invalid_value(
                request.path,
                format!("Attribute {} {}, got: \"{s}\"", request.path, self.description()),
            ),
            _ => Diagnostics::new(),
        }
    }
}

/// Requires a string to match a regular expression.
#[derive(Debug, Clone)]
pub struct RegexMatches {
    regex: Regex,
    message: String,
}

impl RegexMatches {
    /// Creates the validator.
    #[must_use]
    pub fn new(regex: Regex, message: impl Into<String>) -> Self {
        Self {
            regex,
            message: message.into(),
        }
    }
}

impl Validator for RegexMatches {
    fn description(&self) -> String {
        self.message.clone()
    }

    fn validate(&self, request: &ValidatorRequest<'_>) -> Diagnostics {
        let mut diags = Diagnostics::new();
        if let Some(s) = request.value.as_str() {
            if !self.regex.is_match(s) {
                diags.add_attribute_error(
                    request.path,
                    "Invalid Attribute Value Match",
                    format!("Attribute {} {}, got: {s}", request.path, self.message),
                );
            }
        }
        diags
    }
}

/// Validator for attributes holding a platform resource identifier.
#[must_use]
pub fn resource_id() -> RegexMatches {
    RegexMatches::new(
        RESOURCE_ID_REGEX.clone(),
        "must be a valid PingOne resource ID",
    )
}

// ============================================================================
// Collection and cross-attribute validators
// ============================================================================

/// Minimum number of elements in a set or list.
#[derive(Debug, Clone, Copy)]
pub struct SizeAtLeast(pub usize);

impl Validator for SizeAtLeast {
    fn description(&self) -> String {
        format!("must contain at least {} elements", self.0)
    }

    fn validate(&self, request: &ValidatorRequest<'_>) -> Diagnostics {
        let mut diags = Diagnostics::new();
        if let Some(items) = request.value.as_elements() {
            if items.len() < self.0 {
                diags.add_attribute_error(
                    request.path,
                    "Invalid Attribute Value",
                    format!(
                        "Attribute {} must contain at least {} elements, got: {}",
                        request.path,
                        self.0,
                        items.len()
                    ),
                );
            }
        }
        diags
    }
}

/// Requires exactly one attribute of a group to be configured. The attribute
/// carrying the validator is always part of the group.
#[derive(Debug, Clone)]
pub struct ExactlyOneOf {
    expressions: Vec<PathExpression>,
}

impl ExactlyOneOf {
    /// Creates the validator.
    #[must_use]
    pub fn new(expressions: Vec<PathExpression>) -> Self {
        Self { expressions }
    }
}

impl Validator for ExactlyOneOf {
    fn description(&self) -> String {
        let targets: Vec<String> = self.expressions.iter().map(ToString::to_string).collect();
        format!(
            "Ensure that one and only one attribute from this collection is set: [{}]",
            targets.join(", ")
        )
    }

    fn validate(&self, request: &ValidatorRequest<'_>) -> Diagnostics {
        let mut paths = vec![request.path.clone()];
        for expression in &self.expressions {
            for path in expression.matching_paths(request.config, request.path) {
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }

        let values: Vec<AttrValue> = paths.iter().map(|p| request.config.value_at(p)).collect();
        if values.iter().any(AttrValue::is_unknown) {
            return Diagnostics::new();
        }

        let configured = values.iter().filter(|v| v.is_known()).count();
        if configured == 1 {
            return Diagnostics::new();
        }

        let names: Vec<String> = paths.iter().map(ToString::to_string).collect();
        let mut diags = Diagnostics::new();
        diags.add_attribute_error(
            request.path,
            "Invalid Attribute Combination",
            format!("exactly one of [{}] must be configured", names.join(", ")),
        );
        diags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(validator: &dyn Validator, config: &Tree, path: &AttributePath) -> Diagnostics {
        let value = config.value_at(path);
        validator.validate(&ValidatorRequest {
            config,
            path,
            value: &value,
        })
    }

    fn int_config(name: &str, value: AttrValue) -> Tree {
        let mut tree = Tree::new();
        tree.insert(name, value);
        tree
    }

    #[test]
    fn test_is_divisible_by_boundaries() {
        let validator = IsDivisibleBy::new(10);
        let path = AttributePath::root("weight");
        for ok in [0, 10, 100] {
            let diags = validate(&validator, &int_config("weight", AttrValue::Int(ok)), &path);
            assert!(diags.is_empty(), "{ok} should pass");
        }
        for bad in [1, 9, 11, 99] {
            let diags = validate(&validator, &int_config("weight", AttrValue::Int(bad)), &path);
            assert!(diags.has_error(), "{bad} should fail");
        }
        let diags = validate(&validator, &int_config("weight", AttrValue::Unknown), &path);
        assert!(diags.is_empty());

        let diags = validate(&validator, &int_config("weight", AttrValue::Int(11)), &path);
        assert_eq!(
            diags.iter().next().map(|d| d.detail.as_str()),
            Some("value 11 is not valid; must be exactly divisible by 10")
        );
    }

    fn threshold_config(medium: AttrValue, high: AttrValue) -> Tree {
        let mut m = Tree::new();
        m.insert("min_score", medium);
        let mut h = Tree::new();
        h.insert("min_score", high);
        let mut weights = Tree::new();
        weights.insert("policy_threshold_medium", m);
        weights.insert("policy_threshold_high", h);
        let mut config = Tree::new();
        config.insert("policy_weights", weights);
        config
    }

    fn high_path() -> AttributePath {
        AttributePath::root("policy_weights")
            .at_name("policy_threshold_high")
            .at_name("min_score")
    }

    fn greater_than_medium() -> IsGreaterThanPathValue {
        IsGreaterThanPathValue::new(vec![PathExpression::match_relative()
            .at_parent()
            .at_parent()
            .at_name("policy_threshold_medium")
            .at_name("min_score")])
    }

    #[test]
    fn test_is_greater_than_path_value_boundaries() {
        let validator = greater_than_medium();
        let path = high_path();

        let pass = threshold_config(AttrValue::Int(49), AttrValue::Int(50));
        assert!(validate(&validator, &pass, &path).is_empty());

        let equal = threshold_config(AttrValue::Int(50), AttrValue::Int(50));
        let diags = validate(&validator, &equal, &path);
        assert!(diags.has_error());
        assert_eq!(
            diags.iter().next().map(|d| d.detail.clone()),
            Some(
                "value 50 is not greater than 50 at policy_weights.policy_threshold_medium.min_score"
                    .to_string()
            )
        );

        let self_unknown = threshold_config(AttrValue::Int(50), AttrValue::Unknown);
        assert!(validate(&validator, &self_unknown, &path).is_empty());

        let peer_unknown = threshold_config(AttrValue::Unknown, AttrValue::Int(50));
        assert!(validate(&validator, &peer_unknown, &path).is_empty());
    }

    #[test]
    fn test_is_less_than_path_value_mirror() {
        let validator = IsLessThanPathValue::new(vec![PathExpression::match_root("policy_weights")
            .at_name("policy_threshold_high")
            .at_name("min_score")]);
        let path = AttributePath::root("policy_weights")
            .at_name("policy_threshold_medium")
            .at_name("min_score");

        let violated = threshold_config(AttrValue::Int(60), AttrValue::Int(50));
        let diags = validate(&validator, &violated, &path);
        assert!(diags.has_error());
        assert!(diags.iter().any(|d| d.detail.starts_with("value 60 is not less than 50")));

        let ok = threshold_config(AttrValue::Int(40), AttrValue::Int(50));
        assert!(validate(&validator, &ok, &path).is_empty());
    }

    #[test]
    fn test_exactly_one_of_all_combinations() {
        let validator = ExactlyOneOf::new(vec![PathExpression::match_root("name")]);
        let path = AttributePath::root("risk_predictor_id");
        let states = [
            AttrValue::Null,
            AttrValue::from("9c9ba6a1-3c43-4d70-9d45-9a59e1f6a0b1"),
        ];

        for id in &states {
            for name in &states {
                let mut config = Tree::new();
                config.insert("risk_predictor_id", id.clone());
                config.insert("name", name.clone());
                let configured = usize::from(id.is_known()) + usize::from(name.is_known());
                let diags = validate(&validator, &config, &path);
                assert_eq!(diags.is_empty(), configured == 1);
            }
        }

        let mut deferred = Tree::new();
        deferred.insert("risk_predictor_id", AttrValue::Unknown);
        deferred.insert("name", "x");
        assert!(validate(&validator, &deferred, &path).is_empty());
    }

    #[test]
    fn test_exactly_one_of_message() {
        let validator = ExactlyOneOf::new(vec![PathExpression::match_root("name")]);
        let path = AttributePath::root("risk_predictor_id");
        let diags = validate(&validator, &Tree::new(), &path);
        assert_eq!(
            diags.iter().next().map(|d| d.detail.as_str()),
            Some("exactly one of [risk_predictor_id, name] must be configured")
        );
    }

    #[test]
    fn test_one_of_and_lengths() {
        let path = AttributePath::root("type");
        let config = int_config("type", AttrValue::from("VELOCITY"));
        assert!(validate(&OneOf::new(["VELOCITY", "GEOVELOCITY"]), &config, &path).is_empty());
        assert!(validate(&OneOf::new(["ANONYMOUS_NETWORK"]), &config, &path).has_error());
        assert!(validate(&LengthAtMost(3), &config, &path).has_error());
        assert!(validate(&LengthAtLeast(1), &config, &path).is_empty());
    }

    #[test]
    fn test_resource_id() {
        assert!(is_resource_id("9c9ba6a1-3c43-4d70-9d45-9a59e1f6a0b1"));
        assert!(!is_resource_id("not-an-id"));

        let path = AttributePath::root("environment_id");
        let config = int_config("environment_id", AttrValue::from("abc"));
        assert!(validate(&resource_id(), &config, &path).has_error());
    }

    #[test]
    fn test_at_least_at_most() {
        let path = AttributePath::root("weight");
        let config = int_config("weight", AttrValue::Int(0));
        assert!(validate(&AtLeast(1), &config, &path).has_error());
        assert!(validate(&AtMost(100), &config, &path).is_empty());
    }
}
