//! `${...}` references between blocks and the resulting dependency order.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use tracing::debug;

use crate::error::{ConfigError, ProviderError, Result};

use super::document::{Address, DeployDocument};

#[allow(clippy::expect_used)]
static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$\{(data\.)?([A-Za-z0-9_]+)\.([A-Za-z_][A-Za-z0-9_-]*)\.([a-z0-9_]+)\}$")
        .expect("static regex is valid")
});

/// A whole-string reference to another block's attribute.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Reference {
    /// Referenced block.
    pub target: Address,
    /// Top-level attribute of the target.
    pub attribute: String,
}

impl Reference {
    /// Parses `${<type>.<name>.<attr>}` or `${data.<type>.<name>.<attr>}`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let captures = REFERENCE.captures(text)?;
        let type_name = captures.get(2)?.as_str();
        let name = captures.get(3)?.as_str();
        let target = if captures.get(1).is_some() {
            Address::data(type_name, name)
        } else {
            Address::resource(type_name, name)
        };
        Some(Self {
            target,
            attribute: captures.get(4)?.as_str().to_string(),
        })
    }
}

/// Every reference inside a JSON value.
#[must_use]
pub fn references_in(value: &serde_json::Value) -> Vec<Reference> {
    let mut found = Vec::new();
    collect(value, &mut found);
    found
}

fn collect(value: &serde_json::Value, found: &mut Vec<Reference>) {
    match value {
        serde_json::Value::String(s) => found.extend(Reference::parse(s)),
        serde_json::Value::Array(items) => items.iter().for_each(|v| collect(v, found)),
        serde_json::Value::Object(map) => map.values().for_each(|v| collect(v, found)),
        _ => {}
    }
}

/// Blocks ordered so that every block follows the blocks it references.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    order: Vec<Address>,
    dependencies: BTreeMap<Address, BTreeSet<Address>>,
}

impl DependencyGraph {
    /// Builds the graph of `document`.
    ///
    /// Ties keep document order, resources before data sources.
    ///
    /// # Errors
    ///
    /// Returns an error if a reference names a block that does not exist or
    /// the references form a cycle.
    pub fn build(document: &DeployDocument) -> Result<Self> {
        let declared: Vec<Address> = document.blocks().map(|(address, _)| address).collect();
        let known: BTreeSet<&Address> = declared.iter().collect();

        let mut dependencies = BTreeMap::new();
        for (address, block) in document.blocks() {
            let mut targets = BTreeSet::new();
            for reference in references_in(&block.config) {
                if !known.contains(&reference.target) {
                    return Err(ProviderError::Config(ConfigError::UnresolvedReference {
                        reference: format!("{}.{}", reference.target, reference.attribute),
                        address: address.to_string(),
                    }));
                }
                targets.insert(reference.target);
            }
            dependencies.insert(address, targets);
        }

        let mut order: Vec<Address> = Vec::with_capacity(declared.len());
        let mut placed: BTreeSet<&Address> = BTreeSet::new();
        while order.len() < declared.len() {
            let next = declared.iter().find(|address| {
                !placed.contains(address)
                    && dependencies
                        .get(*address)
                        .is_none_or(|deps| deps.iter().all(|d| placed.contains(d)))
            });
            let Some(next) = next else {
                let remaining: Vec<&Address> = declared.iter().filter(|a| !placed.contains(a)).collect();
                return Err(ProviderError::Config(ConfigError::CircularDependency {
                    cycle: describe_cycle(&remaining, &dependencies),
                }));
            };
            placed.insert(next);
            order.push(next.clone());
        }

        debug!(
            "Dependency order: {}",
            order.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        );
        Ok(Self { order, dependencies })
    }

    /// Blocks in dependency order.
    #[must_use]
    pub fn order(&self) -> &[Address] {
        &self.order
    }

    /// Blocks referenced by `address`.
    pub fn dependencies_of(&self, address: &Address) -> impl Iterator<Item = &Address> {
        self.dependencies.get(address).into_iter().flatten()
    }

    /// Blocks that reference `address`, directly or transitively.
    #[must_use]
    pub fn dependents_of(&self, address: &Address) -> BTreeSet<Address> {
        let mut found = BTreeSet::new();
        let mut frontier = vec![address.clone()];
        while let Some(current) = frontier.pop() {
            for (candidate, deps) in &self.dependencies {
                if deps.contains(&current) && found.insert(candidate.clone()) {
                    frontier.push(candidate.clone());
                }
            }
        }
        found
    }
}

/// Every remaining block has an unplaced dependency, so following the first
/// one from any block must revisit a block.
fn describe_cycle(remaining: &[&Address], dependencies: &BTreeMap<Address, BTreeSet<Address>>) -> String {
    let Some(start) = remaining.first() else {
        return String::new();
    };
    let mut path: Vec<&Address> = vec![start];
    let mut current = *start;
    loop {
        let next = dependencies
            .get(current)
            .and_then(|deps| deps.iter().find(|d| remaining.contains(d)));
        let Some(next) = next else {
            break;
        };
        if let Some(pos) = path.iter().position(|a| *a == next) {
            let mut cycle: Vec<String> = path[pos..].iter().map(ToString::to_string).collect();
            cycle.push(next.to_string());
            return cycle.join(" -> ");
        }
        path.push(next);
        current = next;
    }
    path.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::document::Block;
    use serde_json::json;

    #[test]
    fn test_parse_reference() {
        let reference = Reference::parse("${pingone_verify_voice_phrase.main.id}").expect("reference");
        assert_eq!(reference.target, Address::resource("pingone_verify_voice_phrase", "main"));
        assert_eq!(reference.attribute, "id");

        let data = Reference::parse("${data.pingone_risk_predictor.anon.compact_name}").expect("reference");
        assert_eq!(data.target, Address::data("pingone_risk_predictor", "anon"));

        assert!(Reference::parse("prefix ${pingone_verify_voice_phrase.main.id}").is_none());
        assert!(Reference::parse("${pingone_risk_policy.main}").is_none());
    }

    #[test]
    fn test_order_follows_references() {
        let document = DeployDocument {
            resources: vec![
                Block::new(
                    "pingone_verify_voice_phrase_content",
                    "en",
                    json!({"voice_phrase_id": "${pingone_verify_voice_phrase.main.id}"}),
                ),
                Block::new("pingone_verify_voice_phrase", "main", json!({"display_name": "x"})),
            ],
            ..DeployDocument::default()
        };
        let graph = DependencyGraph::build(&document).expect("graph");
        let order: Vec<String> = graph.order().iter().map(ToString::to_string).collect();
        assert_eq!(
            order,
            vec!["pingone_verify_voice_phrase.main", "pingone_verify_voice_phrase_content.en"]
        );
        let dependents = graph.dependents_of(&Address::resource("pingone_verify_voice_phrase", "main"));
        assert_eq!(dependents.len(), 1);
    }

    #[test]
    fn test_unresolved_reference() {
        let document = DeployDocument {
            resources: vec![Block::new(
                "pingone_verify_voice_phrase_content",
                "en",
                json!({"voice_phrase_id": "${pingone_verify_voice_phrase.missing.id}"}),
            )],
            ..DeployDocument::default()
        };
        assert!(matches!(
            DependencyGraph::build(&document),
            Err(ProviderError::Config(ConfigError::UnresolvedReference { .. }))
        ));
    }

    #[test]
    fn test_cycle_detected() {
        let document = DeployDocument {
            resources: vec![
                Block::new("t", "a", json!({"x": "${t.b.id}"})),
                Block::new("t", "b", json!({"nested": {"x": ["${t.a.id}"]}})),
            ],
            ..DeployDocument::default()
        };
        let err = DependencyGraph::build(&document).expect_err("cycle");
        let ProviderError::Config(ConfigError::CircularDependency { cycle }) = err else {
            panic!("expected a cycle, got {err:?}");
        };
        assert_eq!(cycle, "t.a -> t.b -> t.a");
    }
}
