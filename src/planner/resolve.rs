//! Typing of block configs with `${...}` references substituted.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{Address, Reference};
use crate::framework::{AttrValue, AttributePath, Diagnostics, Schema, Tree};

/// Values that references may resolve to.
///
/// A block is either known (its planned or stored tree is available) or
/// pending (it will only be known after apply). References to a pending
/// block resolve to Unknown.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    known: BTreeMap<Address, Tree>,
    pending: BTreeSet<Address>,
}

impl Scope {
    /// Creates an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the tree of `address`.
    pub fn set_known(&mut self, address: Address, tree: Tree) {
        self.pending.remove(&address);
        self.known.insert(address, tree);
    }

    /// Marks `address` as known only after apply.
    pub fn set_pending(&mut self, address: Address) {
        self.known.remove(&address);
        self.pending.insert(address);
    }

    /// The known tree of `address`.
    #[must_use]
    pub fn get(&self, address: &Address) -> Option<&Tree> {
        self.known.get(address)
    }

    /// Value of a reference, or why it cannot be resolved.
    ///
    /// # Errors
    ///
    /// Returns a message if the target was never planned or lacks the
    /// attribute.
    pub fn resolve(&self, reference: &Reference) -> Result<AttrValue, String> {
        if self.pending.contains(&reference.target) {
            return Ok(AttrValue::Unknown);
        }
        let Some(tree) = self.known.get(&reference.target) else {
            return Err(format!(
                "{} has not been planned, so its attributes are not available.",
                reference.target
            ));
        };
        tree.get_opt(&reference.attribute).cloned().ok_or_else(|| {
            format!(
                "{} does not have an attribute named \"{}\".",
                reference.target, reference.attribute
            )
        })
    }

    /// Types `config` against `schema`, substituting references, then
    /// validates it.
    #[must_use]
    pub fn type_config(&self, schema: &Schema, config: &serde_json::Value) -> (Tree, Diagnostics) {
        let mut diags = Diagnostics::new();
        let mut unresolved = Diagnostics::new();
        let tree = {
            let mut resolve = |text: &str, path: &AttributePath| {
                let reference = Reference::parse(text)?;
                match self.resolve(&reference) {
                    Ok(value) => Some(value),
                    Err(detail) => {
                        unresolved.add_attribute_error(path, "Invalid Reference", detail);
                        Some(AttrValue::Unknown)
                    }
                }
            };
            Tree::from_json_resolving(
                config,
                &schema.attr_types(),
                &AttributePath::empty(),
                &mut diags,
                &mut resolve,
            )
        };
        diags.append(unresolved);
        if !diags.has_error() {
            diags.append(schema.validate_config(&tree));
        }
        (tree, diags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::{Attribute, AttributeMode};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new("test")
            .with_attribute("voice_phrase_id", Attribute::string(AttributeMode::Required))
            .with_attribute("locale", Attribute::string(AttributeMode::Optional))
    }

    fn phrase() -> Address {
        Address::resource("pingone_verify_voice_phrase", "main")
    }

    #[test]
    fn test_reference_to_known_block() {
        let mut scope = Scope::new();
        let mut tree = Tree::new();
        tree.insert("id", "abc");
        scope.set_known(phrase(), tree);

        let (config, diags) = scope.type_config(
            &schema(),
            &json!({"voice_phrase_id": "${pingone_verify_voice_phrase.main.id}", "locale": "en"}),
        );
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(config.get("voice_phrase_id").as_str(), Some("abc"));
        assert!(config.get("locale").is_known());
    }

    #[test]
    fn test_reference_to_pending_block_is_unknown() {
        let mut scope = Scope::new();
        scope.set_pending(phrase());

        let (config, diags) = scope.type_config(
            &schema(),
            &json!({"voice_phrase_id": "${pingone_verify_voice_phrase.main.id}"}),
        );
        assert!(!diags.has_error());
        assert!(config.get("voice_phrase_id").is_unknown());
        assert!(config.get("locale").is_null());
    }

    #[test]
    fn test_missing_attribute_is_reported() {
        let mut scope = Scope::new();
        scope.set_known(phrase(), Tree::new());

        let (_, diags) = scope.type_config(
            &schema(),
            &json!({"voice_phrase_id": "${pingone_verify_voice_phrase.main.nope}"}),
        );
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.errors().next().map(|d| d.summary.as_str()), Some("Invalid Reference"));
    }

    #[test]
    fn test_validation_runs_after_typing() {
        let (_, diags) = Scope::new().type_config(&schema(), &json!({"locale": "en"}));
        assert_eq!(
            diags.errors().next().map(|d| d.summary.as_str()),
            Some("Missing Configuration for Required Attribute")
        );
    }
}
