//! Attribute-level differences between two attribute trees.
//!
//! Used to show what a planned change does and what drifted between the
//! stored state and the platform.

use serde::Serialize;
use std::fmt;

use crate::framework::{AttrValue, AttributePath, Tree};

/// Type of difference for one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffType {
    /// Null before, set after.
    Added,
    /// Set before, Null after.
    Removed,
    /// Set on both sides with different values.
    Changed,
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "+"),
            Self::Removed => write!(f, "-"),
            Self::Changed => write!(f, "~"),
        }
    }
}

/// One differing attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeChange {
    /// Path of the attribute.
    pub path: AttributePath,
    /// Value before.
    pub before: AttrValue,
    /// Value after.
    pub after: AttrValue,
}

impl AttributeChange {
    /// Classifies the change.
    #[must_use]
    pub const fn diff_type(&self) -> DiffType {
        match (&self.before, &self.after) {
            (AttrValue::Null, _) => DiffType::Added,
            (_, AttrValue::Null) => DiffType::Removed,
            _ => DiffType::Changed,
        }
    }
}

impl fmt::Display for AttributeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.diff_type() {
            DiffType::Added => write!(f, "+ {} = {}", self.path, render_value(&self.after)),
            DiffType::Removed => write!(f, "- {} = {}", self.path, render_value(&self.before)),
            DiffType::Changed => write!(
                f,
                "~ {}: {} -> {}",
                self.path,
                render_value(&self.before),
                render_value(&self.after)
            ),
        }
    }
}

/// Engine for computing attribute differences.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiffEngine;

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Every attribute that differs between `before` and `after`. A missing
    /// side counts as all-Null. Nested objects are compared attribute by
    /// attribute; sets and lists are compared whole.
    #[must_use]
    pub fn compute(&self, before: Option<&Tree>, after: Option<&Tree>) -> Vec<AttributeChange> {
        let empty = Tree::new();
        let mut changes = Vec::new();
        diff_level(
            before.unwrap_or(&empty),
            after.unwrap_or(&empty),
            &AttributePath::empty(),
            &mut changes,
        );
        changes
    }
}

fn diff_level(before: &Tree, after: &Tree, parent: &AttributePath, changes: &mut Vec<AttributeChange>) {
    let mut names: Vec<&String> = before.iter().map(|(name, _)| name).collect();
    for (name, _) in after.iter() {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names.sort();

    for name in names {
        let old = before.get(name);
        let new = after.get(name);
        if old == new {
            continue;
        }
        let path = parent.at_name(name.clone());
        match (old, new) {
            (AttrValue::Object(old_tree), AttrValue::Object(new_tree)) => {
                diff_level(old_tree, new_tree, &path, changes);
            }
            _ => changes.push(AttributeChange {
                path,
                before: old.clone(),
                after: new.clone(),
            }),
        }
    }
}

/// Renders a value for plan and drift output.
#[must_use]
pub fn render_value(value: &AttrValue) -> String {
    match value {
        AttrValue::Null => String::from("null"),
        AttrValue::Unknown => String::from("(known after apply)"),
        AttrValue::Bool(b) => b.to_string(),
        AttrValue::Int(i) => i.to_string(),
        AttrValue::Float(v) => v.to_string(),
        AttrValue::String(s) => format!("{s:?}"),
        AttrValue::List(items) | AttrValue::Set(items) => format!(
            "[{}]",
            items.iter().map(render_value).collect::<Vec<_>>().join(", ")
        ),
        AttrValue::Object(tree) => format!(
            "{{ {} }}",
            tree.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| format!("{k} = {}", render_value(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(pairs: &[(&str, AttrValue)]) -> Tree {
        let mut tree = Tree::new();
        for (name, value) in pairs {
            tree.insert(*name, value.clone());
        }
        tree
    }

    #[test]
    fn test_identical_trees_have_no_changes() {
        let a = tree(&[("name", "x".into()), ("weight", AttrValue::Int(5))]);
        assert!(DiffEngine::new().compute(Some(&a), Some(&a.clone())).is_empty());
    }

    #[test]
    fn test_nested_objects_diff_by_attribute() {
        let before = tree(&[
            ("name", "x".into()),
            ("thresholds", AttrValue::Object(tree(&[("high", AttrValue::Int(80)), ("medium", AttrValue::Int(40))]))),
        ]);
        let after = tree(&[
            ("name", "x".into()),
            ("thresholds", AttrValue::Object(tree(&[("high", AttrValue::Int(90)), ("medium", AttrValue::Int(40))]))),
        ]);

        let changes = DiffEngine::new().compute(Some(&before), Some(&after));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path.to_string(), "thresholds.high");
        assert_eq!(changes[0].diff_type(), DiffType::Changed);
        assert_eq!(changes[0].to_string(), "~ thresholds.high: 80 -> 90");
    }

    #[test]
    fn test_sets_compare_unordered() {
        let before = tree(&[("ids", AttrValue::Set(vec!["a".into(), "b".into()]))]);
        let after = tree(&[("ids", AttrValue::Set(vec!["b".into(), "a".into()]))]);
        assert!(DiffEngine::new().compute(Some(&before), Some(&after)).is_empty());
    }

    #[test]
    fn test_create_shows_additions_and_unknowns() {
        let after = tree(&[("id", AttrValue::Unknown), ("name", "x".into()), ("description", AttrValue::Null)]);
        let changes = DiffEngine::new().compute(None, Some(&after));
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.diff_type() == DiffType::Added));
        assert_eq!(changes[0].to_string(), "+ id = (known after apply)");
    }

    #[test]
    fn test_removed_attribute() {
        let before = tree(&[("description", "old".into())]);
        let after = tree(&[("description", AttrValue::Null)]);
        let changes = DiffEngine::new().compute(Some(&before), Some(&after));
        assert_eq!(changes[0].diff_type(), DiffType::Removed);
        assert_eq!(changes[0].to_string(), "- description = \"old\"");
    }
}
