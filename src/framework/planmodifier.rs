//! Attribute plan modifiers.
//!
//! A plan modifier sees one attribute's config, prior state and planned
//! values and may rewrite the planned value, force replacement of the whole
//! resource, or raise an error. Like validators they are synchronous and pure.

use std::fmt;
use std::sync::Arc;

use super::diag::Diagnostics;
use super::path::AttributePath;
use super::tree::{AttrValue, Tree};

/// Input to a plan modifier.
#[derive(Debug, Clone, Copy)]
pub struct PlanModifierRequest<'a> {
    /// Path of the attribute.
    pub path: &'a AttributePath,
    /// Whole configuration.
    pub config: &'a Tree,
    /// Whole prior state; `None` on create.
    pub state: Option<&'a Tree>,
    /// Whole plan; `None` on destroy.
    pub plan: Option<&'a Tree>,
    /// Configured value of the attribute.
    pub config_value: &'a AttrValue,
    /// Prior state value of the attribute.
    pub state_value: &'a AttrValue,
    /// Planned value of the attribute.
    pub plan_value: &'a AttrValue,
}

impl PlanModifierRequest<'_> {
    /// Returns true when the resource is being created.
    #[must_use]
    pub const fn is_create(&self) -> bool {
        self.state.is_none()
    }

    /// Returns true when the resource is being destroyed.
    #[must_use]
    pub const fn is_destroy(&self) -> bool {
        self.plan.is_none()
    }
}

/// Output of a plan modifier.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanModifierResponse {
    /// The (possibly rewritten) planned value.
    pub plan_value: AttrValue,
    /// Whether the change must be applied by replacing the resource.
    pub requires_replace: bool,
    /// Diagnostics raised by the modifier.
    pub diagnostics: Diagnostics,
}

impl PlanModifierResponse {
    /// A response that leaves the plan untouched.
    #[must_use]
    pub fn unchanged(request: &PlanModifierRequest<'_>) -> Self {
        Self {
            plan_value: request.plan_value.clone(),
            requires_replace: false,
            diagnostics: Diagnostics::new(),
        }
    }
}

/// A reusable plan modifier.
pub trait PlanModifier: Send + Sync + fmt::Debug {
    /// Plain-text description used in schema documentation.
    fn description(&self) -> String;

    /// Modifies the response in place. `response` starts as
    /// [`PlanModifierResponse::unchanged`] or the output of the previous
    /// modifier in the chain.
    fn modify(&self, request: &PlanModifierRequest<'_>, response: &mut PlanModifierResponse);
}

/// Copies the prior state value into an unknown plan value.
#[derive(Debug, Clone, Copy, Default)]
pub struct UseStateForUnknown;

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "Once set, the value of this attribute in state will not change.".to_string()
    }

    fn modify(&self, request: &PlanModifierRequest<'_>, response: &mut PlanModifierResponse) {
        if request.is_create() || request.state_value.is_null() {
            return;
        }
        if !response.plan_value.is_unknown() {
            return;
        }
        // An unknown config value is an unresolved reference, not a computed default.
        if request.config_value.is_unknown() {
            return;
        }
        response.plan_value = request.state_value.clone();
    }
}

/// Forces replacement whenever the planned value differs from state.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiresReplace;

impl PlanModifier for RequiresReplace {
    fn description(&self) -> String {
        "If the value of this attribute changes, the resource will be replaced.".to_string()
    }

    fn modify(&self, request: &PlanModifierRequest<'_>, response: &mut PlanModifierResponse) {
        if request.is_create() || request.is_destroy() {
            return;
        }
        if response.plan_value == *request.state_value {
            return;
        }
        response.requires_replace = true;
    }
}

/// Predicate used by conditional plan modifiers.
pub type PlanPredicate = Arc<dyn Fn(&PlanModifierRequest<'_>) -> bool + Send + Sync>;

/// Forces replacement when the value changes and a predicate agrees.
#[derive(Clone)]
pub struct RequiresReplaceIf {
    predicate: PlanPredicate,
    description: String,
}

impl RequiresReplaceIf {
    /// Creates the modifier.
    pub fn new<F>(predicate: F, description: impl Into<String>) -> Self
    where
        F: Fn(&PlanModifierRequest<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            description: description.into(),
        }
    }
}

impl fmt::Debug for RequiresReplaceIf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequiresReplaceIf")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl PlanModifier for RequiresReplaceIf {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn modify(&self, request: &PlanModifierRequest<'_>, response: &mut PlanModifierResponse) {
        if request.is_create() || request.is_destroy() {
            return;
        }
        if response.plan_value == *request.state_value {
            return;
        }
        if (self.predicate)(request) {
            response.requires_replace = true;
        }
    }
}

/// Forces replacement when a previously known value is removed from config.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiresReplaceIfNowNull;

impl PlanModifier for RequiresReplaceIfNowNull {
    fn description(&self) -> String {
        "If the value of this attribute is removed, the resource will be replaced.".to_string()
    }

    fn modify(&self, request: &PlanModifierRequest<'_>, response: &mut PlanModifierResponse) {
        if request.is_create() || request.is_destroy() {
            return;
        }
        if request.state_value.is_known() && request.config_value.is_null() {
            response.requires_replace = true;
        }
    }
}

/// Plans a fixed value whenever the attribute is not configured, replacing
/// both Unknown and a value carried from prior state.
#[derive(Debug, Clone)]
pub struct StaticDefault(pub AttrValue);

impl StaticDefault {
    /// A string default.
    #[must_use]
    pub fn string(value: &str) -> Self {
        Self(AttrValue::from(value))
    }

    /// A boolean default.
    #[must_use]
    pub const fn bool(value: bool) -> Self {
        Self(AttrValue::Bool(value))
    }
}

impl PlanModifier for StaticDefault {
    fn description(&self) -> String {
        let value = self.0.to_json().map_or_else(|| "null".to_string(), |v| v.to_string());
        format!("Defaults to `{value}` when not configured.")
    }

    fn modify(&self, request: &PlanModifierRequest<'_>, response: &mut PlanModifierResponse) {
        if request.is_destroy() || !request.config_value.is_null() {
            return;
        }
        response.plan_value = self.0.clone();
    }
}

/// Default summary of the data-loss-protection error.
pub const DATA_LOSS_PROTECTION_SUMMARY: &str = "Data Loss Protection";

/// Default detail of the data-loss-protection error.
pub const DATA_LOSS_PROTECTION_DETAIL: &str = "This field is immutable and cannot be changed once defined.  To protect against accidental data loss, this resource must be replaced manually (for example, by using the orchestrator's plan `-replace` command option).  Any data that is stored against this resource must be manually exported before the resource is removed and re-imported once the resource has been replaced.";

/// Rejects in-place changes to an immutable attribute instead of replacing
/// the resource automatically.
#[derive(Clone)]
pub struct UnmodifiableDataLossProtectionIf {
    predicate: PlanPredicate,
    summary: String,
    detail: String,
}

impl UnmodifiableDataLossProtectionIf {
    /// Creates the modifier with custom texts.
    pub fn new<F>(predicate: F, summary: impl Into<String>, detail: impl Into<String>) -> Self
    where
        F: Fn(&PlanModifierRequest<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            summary: summary.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Debug for UnmodifiableDataLossProtectionIf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnmodifiableDataLossProtectionIf")
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

impl PlanModifier for UnmodifiableDataLossProtectionIf {
    fn description(&self) -> String {
        DATA_LOSS_PROTECTION_DETAIL.to_string()
    }

    fn modify(&self, request: &PlanModifierRequest<'_>, response: &mut PlanModifierResponse) {
        if request.is_create() || request.is_destroy() {
            return;
        }
        let planned = &response.plan_value;
        if !planned.is_known() || !request.state_value.is_known() {
            return;
        }
        if planned == request.state_value {
            return;
        }
        if (self.predicate)(request) {
            response
                .diagnostics
                .add_attribute_error(request.path, self.summary.clone(), self.detail.clone());
        }
    }
}

/// Unconditional data-loss protection with the default texts.
#[must_use]
pub fn unmodifiable_data_loss_protection() -> UnmodifiableDataLossProtectionIf {
    UnmodifiableDataLossProtectionIf::new(
        |_| true,
        DATA_LOSS_PROTECTION_SUMMARY,
        DATA_LOSS_PROTECTION_DETAIL,
    )
}

/// Runs a chain of modifiers for one attribute.
#[must_use]
pub fn run_chain(
    modifiers: &[Arc<dyn PlanModifier>],
    request: &PlanModifierRequest<'_>,
) -> PlanModifierResponse {
    let mut response = PlanModifierResponse::unchanged(request);
    for modifier in modifiers {
        modifier.modify(request, &mut response);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        path: AttributePath,
        config: Tree,
        state: Option<Tree>,
        plan: Option<Tree>,
    }

    impl Fixture {
        fn new(name: &str, config: AttrValue, state: Option<AttrValue>, plan: Option<AttrValue>) -> Self {
            let tree_of = |v: AttrValue| {
                let mut t = Tree::new();
                t.insert(name, v);
                t
            };
            Self {
                path: AttributePath::root(name),
                config: tree_of(config),
                state: state.map(tree_of),
                plan: plan.map(tree_of),
            }
        }

        fn run(&self, modifier: &dyn PlanModifier) -> PlanModifierResponse {
            let config_value = self.config.value_at(&self.path);
            let state_value = self
                .state
                .as_ref()
                .map_or(AttrValue::Null, |s| s.value_at(&self.path));
            let plan_value = self
                .plan
                .as_ref()
                .map_or(AttrValue::Null, |p| p.value_at(&self.path));
            let request = PlanModifierRequest {
                path: &self.path,
                config: &self.config,
                state: self.state.as_ref(),
                plan: self.plan.as_ref(),
                config_value: &config_value,
                state_value: &state_value,
                plan_value: &plan_value,
            };
            let mut response = PlanModifierResponse::unchanged(&request);
            modifier.modify(&request, &mut response);
            response
        }
    }

    fn s(v: &str) -> AttrValue {
        AttrValue::from(v)
    }

    #[test]
    fn test_data_loss_protection_on_change() {
        let fixture = Fixture::new("compact_name", s("beta"), Some(s("alpha")), Some(s("beta")));
        let response = fixture.run(&unmodifiable_data_loss_protection());
        assert!(response.diagnostics.has_error());
        assert!(!response.requires_replace);
        let diag = response.diagnostics.iter().next().expect("one diagnostic");
        assert_eq!(diag.attribute, Some(AttributePath::root("compact_name")));
        assert!(diag.detail.contains("-replace"));
    }

    #[test]
    fn test_data_loss_protection_iff_both_known_and_different() {
        let values = [AttrValue::Null, AttrValue::Unknown, s("alpha"), s("beta")];
        let modifier = unmodifiable_data_loss_protection();
        for state in &values {
            for plan in &values {
                let fixture =
                    Fixture::new("compact_name", plan.clone(), Some(state.clone()), Some(plan.clone()));
                let expected = state.is_known() && plan.is_known() && state != plan;
                assert_eq!(fixture.run(&modifier).diagnostics.has_error(), expected);
            }
        }
    }

    #[test]
    fn test_data_loss_protection_noop_on_create_and_destroy() {
        let modifier = unmodifiable_data_loss_protection();
        let create = Fixture::new("compact_name", s("alpha"), None, Some(s("alpha")));
        assert!(create.run(&modifier).diagnostics.is_empty());
        let destroy = Fixture::new("compact_name", AttrValue::Null, Some(s("alpha")), None);
        assert!(destroy.run(&modifier).diagnostics.is_empty());
    }

    #[test]
    fn test_use_state_for_unknown() {
        let fixture = Fixture::new("id", AttrValue::Null, Some(s("abc")), Some(AttrValue::Unknown));
        assert_eq!(fixture.run(&UseStateForUnknown).plan_value, s("abc"));

        let create = Fixture::new("id", AttrValue::Null, None, Some(AttrValue::Unknown));
        assert!(create.run(&UseStateForUnknown).plan_value.is_unknown());
    }

    #[test]
    fn test_requires_replace_if_now_null() {
        let cleared = Fixture::new("relying_party_id", AttrValue::Null, Some(s("example.com")), Some(AttrValue::Null));
        assert!(cleared.run(&RequiresReplaceIfNowNull).requires_replace);

        let unknown = Fixture::new("relying_party_id", AttrValue::Unknown, Some(s("example.com")), Some(AttrValue::Unknown));
        assert!(!unknown.run(&RequiresReplaceIfNowNull).requires_replace);

        let changed = Fixture::new("relying_party_id", s("other.com"), Some(s("example.com")), Some(s("other.com")));
        assert!(!changed.run(&RequiresReplaceIfNowNull).requires_replace);
    }

    #[test]
    fn test_static_default_fills_unset_config() {
        let unset = Fixture::new("new_device_notification", AttrValue::Null, Some(s("SMS_THEN_EMAIL")), Some(AttrValue::Unknown));
        assert_eq!(unset.run(&StaticDefault::string("NONE")).plan_value, s("NONE"));

        let set = Fixture::new("new_device_notification", s("EMAIL_THEN_SMS"), None, Some(s("EMAIL_THEN_SMS")));
        assert_eq!(set.run(&StaticDefault::string("NONE")).plan_value, s("EMAIL_THEN_SMS"));
    }

    #[test]
    fn test_static_default_overrides_value_carried_from_state() {
        let cleared = Fixture::new(
            "new_device_notification",
            AttrValue::Null,
            Some(s("SMS_THEN_EMAIL")),
            Some(s("SMS_THEN_EMAIL")),
        );
        assert_eq!(cleared.run(&StaticDefault::string("NONE")).plan_value, s("NONE"));
    }

    #[test]
    fn test_requires_replace() {
        let changed = Fixture::new("environment_id", s("b"), Some(s("a")), Some(s("b")));
        assert!(changed.run(&RequiresReplace).requires_replace);
        let same = Fixture::new("environment_id", s("a"), Some(s("a")), Some(s("a")));
        assert!(!same.run(&RequiresReplace).requires_replace);
    }

    #[test]
    fn test_requires_replace_if_consults_predicate() {
        let modifier = RequiresReplaceIf::new(
            |req| req.state_value.as_str() == Some("CUSTOM"),
            "replace when leaving CUSTOM",
        );
        let leaving = Fixture::new("type", s("VELOCITY"), Some(s("CUSTOM")), Some(s("VELOCITY")));
        assert!(leaving.run(&modifier).requires_replace);
        let other = Fixture::new("type", s("VELOCITY"), Some(s("GEOVELOCITY")), Some(s("VELOCITY")));
        assert!(!other.run(&modifier).requires_replace);
    }
}
