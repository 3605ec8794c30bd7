//! Attribute paths and path expressions.
//!
//! An [`AttributePath`] addresses exactly one value inside a [`Tree`]. A
//! [`PathExpression`] is a pattern, possibly relative to the attribute being
//! validated, that resolves to zero or more concrete paths.

use serde::{Serialize, Serializer};
use std::fmt;

use super::tree::{AttrValue, Tree};

/// One step of a concrete attribute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathStep {
    /// Object attribute by name.
    Name(String),
    /// List or set element by position.
    Index(usize),
}

/// A concrete path such as `policy_weights.predictors[0].weight`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributePath(Vec<PathStep>);

impl AttributePath {
    /// The empty path, addressing the whole tree.
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// A path with a single top-level attribute.
    #[must_use]
    pub fn root(name: impl Into<String>) -> Self {
        Self(vec![PathStep::Name(name.into())])
    }

    /// Returns a new path with an attribute name appended.
    #[must_use]
    pub fn at_name(&self, name: impl Into<String>) -> Self {
        let mut steps = self.0.clone();
        steps.push(PathStep::Name(name.into()));
        Self(steps)
    }

    /// Returns a new path with an element index appended.
    #[must_use]
    pub fn at_index(&self, index: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(PathStep::Index(index));
        Self(steps)
    }

    /// Returns the parent path, or `None` for the empty path.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// The steps of this path.
    #[must_use]
    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    /// Returns true for the empty path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Name of the last step when it is an attribute name.
    #[must_use]
    pub fn last_name(&self) -> Option<&str> {
        match self.0.last() {
            Some(PathStep::Name(name)) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            match step {
                PathStep::Name(name) if i == 0 => write!(f, "{name}")?,
                PathStep::Name(name) => write!(f, ".{name}")?,
                PathStep::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl Serialize for AttributePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One step of a path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionStep {
    /// Object attribute by name.
    Name(String),
    /// A fixed element position.
    Index(usize),
    /// Every element of a list or set.
    AnyElement,
    /// Step back to the enclosing value.
    Parent,
}

/// A path pattern, either rooted at the top of the tree or relative to the
/// attribute currently being validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpression {
    relative: bool,
    steps: Vec<ExpressionStep>,
}

impl PathExpression {
    /// An expression rooted at a top-level attribute.
    #[must_use]
    pub fn match_root(name: impl Into<String>) -> Self {
        Self {
            relative: false,
            steps: vec![ExpressionStep::Name(name.into())],
        }
    }

    /// An expression starting at the current attribute.
    #[must_use]
    pub const fn match_relative() -> Self {
        Self {
            relative: true,
            steps: Vec::new(),
        }
    }

    /// Appends an attribute name.
    #[must_use]
    pub fn at_name(mut self, name: impl Into<String>) -> Self {
        self.steps.push(ExpressionStep::Name(name.into()));
        self
    }

    /// Appends a step to the parent value.
    #[must_use]
    pub fn at_parent(mut self) -> Self {
        self.steps.push(ExpressionStep::Parent);
        self
    }

    /// Appends a wildcard over list or set elements.
    #[must_use]
    pub fn at_any_element(mut self) -> Self {
        self.steps.push(ExpressionStep::AnyElement);
        self
    }

    /// Returns true when the expression is relative.
    #[must_use]
    pub const fn is_relative(&self) -> bool {
        self.relative
    }

    /// Folds `Parent` steps and, for relative expressions, prefixes the
    /// current path.
    #[must_use]
    pub fn resolve(&self, current: &AttributePath) -> Vec<ExpressionStep> {
        let mut resolved: Vec<ExpressionStep> = if self.relative {
            current
                .steps()
                .iter()
                .map(|step| match step {
                    PathStep::Name(name) => ExpressionStep::Name(name.clone()),
                    PathStep::Index(index) => ExpressionStep::Index(*index),
                })
                .collect()
        } else {
            Vec::new()
        };

        for step in &self.steps {
            if *step == ExpressionStep::Parent {
                resolved.pop();
            } else {
                resolved.push(step.clone());
            }
        }
        resolved
    }

    /// Expands the expression into every concrete path it matches in `tree`.
    ///
    /// Named steps always yield a path even when the attribute is absent, so
    /// that callers can observe the attribute as Null.
    #[must_use]
    pub fn matching_paths(&self, tree: &Tree, current: &AttributePath) -> Vec<AttributePath> {
        let steps = self.resolve(current);
        let mut out = Vec::new();
        walk(Node::Tree(tree), &steps, AttributePath::empty(), &mut out);
        out
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for step in &self.steps {
            match step {
                ExpressionStep::Name(name) if first && !self.relative => write!(f, "{name}")?,
                ExpressionStep::Name(name) => write!(f, ".{name}")?,
                ExpressionStep::Index(index) => write!(f, "[{index}]")?,
                ExpressionStep::AnyElement => write!(f, "[*]")?,
                ExpressionStep::Parent => write!(f, ".<")?,
            }
            first = false;
        }
        Ok(())
    }
}

enum Node<'a> {
    Tree(&'a Tree),
    Value(&'a AttrValue),
    Missing,
}

fn walk(node: Node<'_>, steps: &[ExpressionStep], prefix: AttributePath, out: &mut Vec<AttributePath>) {
    let Some((step, rest)) = steps.split_first() else {
        out.push(prefix);
        return;
    };

    match step {
        ExpressionStep::Name(name) => {
            let next = match node {
                Node::Tree(tree) => tree.get_opt(name).map_or(Node::Missing, Node::Value),
                Node::Value(AttrValue::Object(tree)) => {
                    tree.get_opt(name).map_or(Node::Missing, Node::Value)
                }
                _ => Node::Missing,
            };
            walk(next, rest, prefix.at_name(name.clone()), out);
        }
        ExpressionStep::Index(index) => {
            let next = match node {
                Node::Value(AttrValue::List(items) | AttrValue::Set(items)) => {
                    items.get(*index).map_or(Node::Missing, Node::Value)
                }
                _ => Node::Missing,
            };
            walk(next, rest, prefix.at_index(*index), out);
        }
        ExpressionStep::AnyElement => {
            if let Node::Value(AttrValue::List(items) | AttrValue::Set(items)) = node {
                for (index, item) in items.iter().enumerate() {
                    walk(Node::Value(item), rest, prefix.at_index(index), out);
                }
            }
        }
        // Folded away by `resolve`.
        ExpressionStep::Parent => walk(node, rest, prefix, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Tree {
        let mut medium = Tree::new();
        medium.insert("min_score", AttrValue::Int(40));
        let mut high = Tree::new();
        high.insert("min_score", AttrValue::Int(75));
        let mut weights = Tree::new();
        weights.insert("policy_threshold_medium", AttrValue::Object(medium));
        weights.insert("policy_threshold_high", AttrValue::Object(high));

        let mut tree = Tree::new();
        tree.insert("policy_weights", AttrValue::Object(weights));
        tree.insert(
            "tags",
            AttrValue::List(vec![AttrValue::from("a"), AttrValue::from("b")]),
        );
        tree
    }

    #[test]
    fn test_display() {
        let path = AttributePath::root("predictors").at_index(2).at_name("weight");
        assert_eq!(path.to_string(), "predictors[2].weight");
    }

    #[test]
    fn test_relative_expression_resolves_sibling() {
        let current = AttributePath::root("policy_weights")
            .at_name("policy_threshold_medium")
            .at_name("min_score");
        let expr = PathExpression::match_relative()
            .at_parent()
            .at_parent()
            .at_name("policy_threshold_high")
            .at_name("min_score");

        let paths = expr.matching_paths(&sample_tree(), &current);
        assert_eq!(
            paths,
            vec![AttributePath::root("policy_weights")
                .at_name("policy_threshold_high")
                .at_name("min_score")]
        );
    }

    #[test]
    fn test_absent_attribute_still_matches() {
        let paths = PathExpression::match_root("policy_scores")
            .matching_paths(&sample_tree(), &AttributePath::empty());
        assert_eq!(paths, vec![AttributePath::root("policy_scores")]);
    }

    #[test]
    fn test_any_element_expands() {
        let paths = PathExpression::match_root("tags")
            .at_any_element()
            .matching_paths(&sample_tree(), &AttributePath::empty());
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[1].to_string(), "tags[1]");
    }

    #[test]
    fn test_parent_of_root_is_empty() {
        let path = AttributePath::root("name");
        assert_eq!(path.parent(), Some(AttributePath::empty()));
        assert_eq!(AttributePath::empty().parent(), None);
    }
}
