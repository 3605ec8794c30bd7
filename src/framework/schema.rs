//! Resource and data source schemas.
//!
//! A [`Schema`] declares every attribute of a resource: its type, whether it
//! is required, optional or computed, its validators and plan modifiers, and
//! its documentation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::diag::Diagnostics;
use super::path::{AttributePath, PathStep};
use super::planmodifier::PlanModifier;
use super::tree::{AttrType, AttrValue, Tree};
use super::validator::{Validator, ValidatorRequest};

/// How an attribute is sourced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeMode {
    /// Must be configured.
    Required,
    /// May be configured; Null otherwise.
    Optional,
    /// Set by the provider only.
    Computed,
    /// May be configured; set by the provider otherwise.
    OptionalComputed,
}

impl AttributeMode {
    /// Returns true when the provider may supply the value.
    #[must_use]
    pub const fn is_computed(self) -> bool {
        matches!(self, Self::Computed | Self::OptionalComputed)
    }

    /// Returns true when configuration may supply the value.
    #[must_use]
    pub const fn is_configurable(self) -> bool {
        !matches!(self, Self::Computed)
    }
}

/// Nesting of a nested-attributes block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nesting {
    /// A single object.
    Single,
    /// A set of objects.
    Set,
    /// A list of objects.
    List,
}

/// Plain and markdown documentation of an attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Description {
    /// Plain text.
    pub description: String,
    /// Markdown.
    pub markdown: String,
}

impl Description {
    /// Builds a description from markdown. The plain form replaces code
    /// backticks with double quotes.
    #[must_use]
    pub fn from_markdown(markdown: impl Into<String>) -> Self {
        let markdown = markdown.into();
        Self {
            description: markdown.replace('`', "\""),
            markdown,
        }
    }

    /// Appends a markdown sentence.
    #[must_use]
    pub fn append(self, markdown: &str) -> Self {
        let markdown = if self.markdown.is_empty() {
            markdown.to_string()
        } else {
            format!("{}  {markdown}", self.markdown)
        };
        Self::from_markdown(markdown)
    }

    /// Notes that changes force replacement.
    #[must_use]
    pub fn requires_replace(self) -> Self {
        self.append("This field is immutable and will trigger a replace plan if changed.")
    }

    /// Notes that in-place changes are rejected to protect data.
    #[must_use]
    pub fn data_loss_protection(self) -> Self {
        self.append(super::planmodifier::DATA_LOSS_PROTECTION_DETAIL)
    }

    /// Lists allowed values.
    #[must_use]
    pub fn allowed_values(self, values: &[&str]) -> Self {
        let quoted: Vec<String> = values.iter().map(|v| format!("`{v}`")).collect();
        self.append(&format!("Options are {}.", quoted.join(", ")))
    }

    /// Names the default value.
    #[must_use]
    pub fn default_value(self, value: impl fmt::Display) -> Self {
        self.append(&format!("Defaults to `{value}`."))
    }

    /// Names a mutually exclusive group.
    #[must_use]
    pub fn exactly_one_of(self, names: &[&str]) -> Self {
        let quoted: Vec<String> = names.iter().map(|v| format!("`{v}`")).collect();
        self.append(&format!(
            "Exactly one of the following must be defined: {}.",
            quoted.join(", ")
        ))
    }
}

/// Declaration of one attribute.
#[derive(Clone)]
pub struct Attribute {
    /// Declared type.
    pub attr_type: AttrType,
    /// Sourcing mode.
    pub mode: AttributeMode,
    /// Documentation.
    pub description: Description,
    /// Whether the value is hidden from output.
    pub sensitive: bool,
    /// Attached validators.
    pub validators: Vec<Arc<dyn Validator>>,
    /// Attached plan modifiers.
    pub plan_modifiers: Vec<Arc<dyn PlanModifier>>,
    /// Child attributes of nested blocks.
    pub nested: Option<(Nesting, BTreeMap<String, Attribute>)>,
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("attr_type", &self.attr_type)
            .field("mode", &self.mode)
            .field("validators", &self.validators.len())
            .field("plan_modifiers", &self.plan_modifiers.len())
            .finish_non_exhaustive()
    }
}

impl Attribute {
    fn leaf(attr_type: AttrType, mode: AttributeMode) -> Self {
        Self {
            attr_type,
            mode,
            description: Description::default(),
            sensitive: false,
            validators: Vec::new(),
            plan_modifiers: Vec::new(),
            nested: None,
        }
    }

    /// A string attribute.
    #[must_use]
    pub fn string(mode: AttributeMode) -> Self {
        Self::leaf(AttrType::String, mode)
    }

    /// An integer attribute.
    #[must_use]
    pub fn int64(mode: AttributeMode) -> Self {
        Self::leaf(AttrType::Int64, mode)
    }

    /// A boolean attribute.
    #[must_use]
    pub fn bool(mode: AttributeMode) -> Self {
        Self::leaf(AttrType::Bool, mode)
    }

    /// A set-of-strings attribute.
    #[must_use]
    pub fn string_set(mode: AttributeMode) -> Self {
        Self::leaf(AttrType::set(AttrType::String), mode)
    }

    fn nested(nesting: Nesting, mode: AttributeMode, attributes: Vec<(&str, Self)>) -> Self {
        let children: BTreeMap<String, Self> = attributes
            .into_iter()
            .map(|(name, attr)| (name.to_string(), attr))
            .collect();
        let object = AttrType::Object(
            children
                .iter()
                .map(|(name, attr)| (name.clone(), attr.attr_type.clone()))
                .collect(),
        );
        let attr_type = match nesting {
            Nesting::Single => object,
            Nesting::Set => AttrType::set(object),
            Nesting::List => AttrType::list(object),
        };
        Self {
            nested: Some((nesting, children)),
            ..Self::leaf(attr_type, mode)
        }
    }

    /// A single nested object.
    #[must_use]
    pub fn single_nested(mode: AttributeMode, attributes: Vec<(&str, Self)>) -> Self {
        Self::nested(Nesting::Single, mode, attributes)
    }

    /// A set of nested objects.
    #[must_use]
    pub fn set_nested(mode: AttributeMode, attributes: Vec<(&str, Self)>) -> Self {
        Self::nested(Nesting::Set, mode, attributes)
    }

    /// Sets the documentation from markdown.
    #[must_use]
    pub fn with_description(mut self, markdown: &str) -> Self {
        self.description = Description::from_markdown(markdown);
        self
    }

    /// Sets a prepared description.
    #[must_use]
    pub fn describe(mut self, description: Description) -> Self {
        self.description = description;
        self
    }

    /// Marks the attribute sensitive.
    #[must_use]
    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Attaches a validator.
    #[must_use]
    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Attaches a plan modifier.
    #[must_use]
    pub fn with_plan_modifier(mut self, modifier: impl PlanModifier + 'static) -> Self {
        self.plan_modifiers.push(Arc::new(modifier));
        self
    }

    /// Child attributes, for nested blocks.
    #[must_use]
    pub fn children(&self) -> Option<&BTreeMap<String, Self>> {
        self.nested.as_ref().map(|(_, children)| children)
    }
}

/// Schema of a resource or data source.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    /// Documentation.
    pub description: Description,
    /// Top-level attributes.
    pub attributes: BTreeMap<String, Attribute>,
    /// Schema version.
    pub version: i64,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new(markdown: &str) -> Self {
        Self {
            description: Description::from_markdown(markdown),
            attributes: BTreeMap::new(),
            version: 0,
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: &str, attribute: Attribute) -> Self {
        self.attributes.insert(name.to_string(), attribute);
        self
    }

    /// Attribute types of the top-level object.
    #[must_use]
    pub fn attr_types(&self) -> BTreeMap<String, AttrType> {
        self.attributes
            .iter()
            .map(|(name, attr)| (name.clone(), attr.attr_type.clone()))
            .collect()
    }

    /// Finds the declaration of the attribute at `path`. Element indexes are
    /// skipped, so `predictors[2].weight` finds the `weight` declaration.
    #[must_use]
    pub fn attribute_at(&self, path: &AttributePath) -> Option<&Attribute> {
        let mut level = &self.attributes;
        let mut found = None;
        for step in path.steps() {
            if let PathStep::Name(name) = step {
                let attr = level.get(name)?;
                found = Some(attr);
                if let Some(children) = attr.children() {
                    level = children;
                }
            }
        }
        found
    }

    /// Checks configured values against the declared modes and runs every
    /// validator.
    #[must_use]
    pub fn validate_config(&self, config: &Tree) -> Diagnostics {
        let mut diags = Diagnostics::new();
        validate_level(&self.attributes, config, &AttributePath::empty(), &mut diags);
        diags
    }
}

fn validate_level(
    attributes: &BTreeMap<String, Attribute>,
    config: &Tree,
    parent: &AttributePath,
    diags: &mut Diagnostics,
) {
    for (name, attr) in attributes {
        let path = parent.at_name(name.clone());
        let value = config.value_at(&path);

        match attr.mode {
            AttributeMode::Required if value.is_null() => diags.add_attribute_error(
                &path,
                "Missing Configuration for Required Attribute",
                format!(
                    "Must set a configuration value for the {path} attribute as the provider has marked it as required."
                ),
            ),
            AttributeMode::Computed if !value.is_null() => diags.add_attribute_error(
                &path,
                "Invalid Configuration for Read-Only Attribute",
                format!(
                    "Cannot set value for the {path} attribute as the provider has marked it as read-only.  Remove the configuration line setting the value."
                ),
            ),
            _ => {}
        }

        for validator in &attr.validators {
            diags.append(validator.validate(&ValidatorRequest {
                config,
                path: &path,
                value: &value,
            }));
        }

        let Some((nesting, children)) = &attr.nested else {
            continue;
        };
        match (nesting, &value) {
            (Nesting::Single, AttrValue::Object(_)) => {
                validate_level(children, config, &path, diags);
            }
            (Nesting::Set | Nesting::List, AttrValue::Set(items) | AttrValue::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    if item.is_known() {
                        validate_level(children, config, &path.at_index(i), diags);
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::validator::{AtMost, LengthAtLeast};

    fn schema() -> Schema {
        Schema::new("Test resource.")
            .with_attribute("id", Attribute::string(AttributeMode::Computed))
            .with_attribute(
                "name",
                Attribute::string(AttributeMode::Required).with_validator(LengthAtLeast(1)),
            )
            .with_attribute(
                "threshold",
                Attribute::single_nested(
                    AttributeMode::Optional,
                    vec![(
                        "min_score",
                        Attribute::int64(AttributeMode::Required).with_validator(AtMost(1000)),
                    )],
                ),
            )
    }

    #[test]
    fn test_missing_required_and_computed_set() {
        let mut config = Tree::new();
        config.insert("id", "abc");
        let diags = schema().validate_config(&config);
        let summaries: Vec<&str> = diags.iter().map(|d| d.summary.as_str()).collect();
        assert!(summaries.contains(&"Missing Configuration for Required Attribute"));
        assert!(summaries.contains(&"Invalid Configuration for Read-Only Attribute"));
    }

    #[test]
    fn test_nested_validators_run_only_when_parent_set() {
        let mut config = Tree::new();
        config.insert("name", "n");
        assert!(schema().validate_config(&config).is_empty());

        let mut threshold = Tree::new();
        threshold.insert("min_score", 5000_i64);
        config.insert("threshold", threshold);
        let diags = schema().validate_config(&config);
        assert_eq!(diags.error_count(), 1);
        assert_eq!(
            diags.iter().next().and_then(|d| d.attribute.clone()),
            Some(AttributePath::root("threshold").at_name("min_score"))
        );
    }

    #[test]
    fn test_attribute_at_skips_indexes() {
        let schema = schema();
        let path = AttributePath::root("threshold").at_index(0).at_name("min_score");
        assert_eq!(
            schema.attribute_at(&path).map(|a| a.attr_type.clone()),
            Some(AttrType::Int64)
        );
        assert!(schema.attribute_at(&AttributePath::root("nope")).is_none());
    }

    #[test]
    fn test_description_plain_form() {
        let description = Description::from_markdown("The `name` of the policy.")
            .allowed_values(&["LOW", "HIGH"]);
        assert_eq!(
            description.description,
            "The \"name\" of the policy.  Options are \"LOW\", \"HIGH\"."
        );
        assert!(description.markdown.contains("`LOW`"));
    }
}
