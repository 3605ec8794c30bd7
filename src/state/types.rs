//! Persisted state document.
//!
//! Attributes are stored as JSON objects and typed against the resource
//! schema again when loaded, so the document carries no schema of its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::framework::{AttributePath, Diagnostics, Schema, Tree};

/// Current version of the state format.
pub const STATE_VERSION: u32 = 1;

/// The complete state document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    /// State format version.
    pub version: u32,
    /// Identifies one lineage of state; never changes once created.
    pub lineage: String,
    /// Incremented on every save.
    pub serial: u64,
    /// When the state was last updated.
    pub last_updated: DateTime<Utc>,
    /// Stored resources keyed by address (`<type>.<name>`).
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceState>,
}

/// Stored state of one managed resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource type name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Local name.
    pub name: String,
    /// Attribute values as a JSON object.
    pub attributes: serde_json::Value,
    /// SHA-256 of the config the resource was last applied with.
    #[serde(default)]
    pub config_hash: String,
    /// When the entry was last written.
    pub updated_at: DateTime<Utc>,
}

impl Default for StateDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl StateDocument {
    /// Creates an empty state with a fresh lineage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION,
            lineage: Uuid::new_v4().to_string(),
            serial: 0,
            last_updated: Utc::now(),
            resources: BTreeMap::new(),
        }
    }

    /// Gets a resource by address.
    #[must_use]
    pub fn get(&self, address: &str) -> Option<&ResourceState> {
        self.resources.get(address)
    }

    /// Adds or replaces a resource.
    pub fn set(&mut self, address: impl Into<String>, resource: ResourceState) {
        self.resources.insert(address.into(), resource);
        self.last_updated = Utc::now();
    }

    /// Removes a resource by address.
    pub fn remove(&mut self, address: &str) -> Option<ResourceState> {
        let result = self.resources.remove(address);
        if result.is_some() {
            self.last_updated = Utc::now();
        }
        result
    }

    /// Returns all resource addresses.
    #[must_use]
    pub fn addresses(&self) -> Vec<&str> {
        self.resources.keys().map(String::as_str).collect()
    }

    /// Advances the serial before a save.
    pub fn bump_serial(&mut self) {
        self.serial += 1;
        self.last_updated = Utc::now();
    }
}

impl ResourceState {
    /// Creates an entry from a stored tree.
    ///
    /// Returns `None` when the tree still holds Unknown values, which never
    /// belong in state.
    #[must_use]
    pub fn from_tree(type_name: &str, name: &str, tree: &Tree, config_hash: &str) -> Option<Self> {
        Some(Self {
            type_name: type_name.to_string(),
            name: name.to_string(),
            attributes: tree.to_json()?,
            config_hash: config_hash.to_string(),
            updated_at: Utc::now(),
        })
    }

    /// Types the stored attributes against `schema`.
    #[must_use]
    pub fn tree(&self, schema: &Schema, diags: &mut Diagnostics) -> Tree {
        Tree::from_json(&self.attributes, &schema.attr_types(), &AttributePath::empty(), diags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::{Attribute, AttributeMode, AttrValue};

    #[test]
    fn test_serial_and_lineage() {
        let mut state = StateDocument::new();
        let lineage = state.lineage.clone();
        state.bump_serial();
        state.bump_serial();
        assert_eq!(state.serial, 2);
        assert_eq!(state.lineage, lineage);
        assert_ne!(StateDocument::new().lineage, lineage);
    }

    #[test]
    fn test_resource_tree_round_trip() {
        let schema = Schema::new("Test.")
            .with_attribute("id", Attribute::string(AttributeMode::Computed))
            .with_attribute("count", Attribute::int64(AttributeMode::Optional));
        let mut tree = Tree::new();
        tree.insert("id", "abc");
        tree.insert("count", AttrValue::Null);

        let entry = ResourceState::from_tree("t", "n", &tree, "h").expect("known");
        let mut diags = Diagnostics::new();
        assert_eq!(entry.tree(&schema, &mut diags), tree);
        assert!(diags.is_empty());

        tree.insert("id", AttrValue::Unknown);
        assert!(ResourceState::from_tree("t", "n", &tree, "h").is_none());
    }

    #[test]
    fn test_set_and_remove() {
        let mut state = StateDocument::new();
        let entry = ResourceState {
            type_name: "t".to_string(),
            name: "n".to_string(),
            attributes: serde_json::json!({}),
            config_hash: String::new(),
            updated_at: Utc::now(),
        };
        state.set("t.n", entry);
        assert_eq!(state.addresses(), vec!["t.n"]);
        assert!(state.remove("t.n").is_some());
        assert!(state.remove("t.n").is_none());
    }
}
