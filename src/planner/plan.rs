//! Deployment plan types and per-resource planning.
//!
//! Planning one resource starts from its typed config, carries computed
//! values over from the prior state (or marks them Unknown), runs the
//! attribute plan modifiers and the resource's own plan hook, then picks
//! the action by comparing the result with the prior state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::config::Address;
use crate::framework::planmodifier::run_chain;
use crate::framework::{
    AttrValue, Attribute, AttributePath, Diagnostics, Nesting, PlanModifierRequest, Tree,
};
use crate::resource::Resource;

use super::diff::{AttributeChange, DiffEngine, render_value};

// ============================================================================
// Plan types
// ============================================================================

/// Types of actions in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource.
    Create,
    /// Update a resource in place.
    Update,
    /// Delete the resource, then create it again.
    Replace,
    /// Delete a resource.
    Delete,
    /// Read a data source whose config was only known after apply.
    Read,
    /// Nothing to do.
    NoOp,
}

impl ActionType {
    /// Marker shown before the address in plan output.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Create => "+",
            Self::Update => "~",
            Self::Replace => "-/+",
            Self::Delete => "-",
            Self::Read => "<=",
            Self::NoOp => " ",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Replace => write!(f, "replace"),
            Self::Delete => write!(f, "delete"),
            Self::Read => write!(f, "read"),
            Self::NoOp => write!(f, "no-op"),
        }
    }
}

/// A single planned resource change.
#[derive(Debug, Clone)]
pub struct PlannedChange {
    /// Address of the resource.
    pub address: Address,
    /// Action to take.
    pub action: ActionType,
    /// Stored state before the change.
    pub prior: Option<Tree>,
    /// Planned state; `None` for deletes.
    pub planned: Option<Tree>,
    /// Attributes that force the replacement.
    pub replace_paths: Vec<AttributePath>,
    /// Hash of the block config the plan was made from.
    pub config_hash: Option<String>,
}

impl PlannedChange {
    /// Attribute differences between the prior and planned state.
    #[must_use]
    pub fn changes(&self) -> Vec<AttributeChange> {
        DiffEngine::new().compute(self.prior.as_ref(), self.planned.as_ref())
    }
}

impl fmt::Display for PlannedChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.action.symbol(), self.address, self.action)?;
        if !self.replace_paths.is_empty() {
            let paths: Vec<String> = self.replace_paths.iter().map(ToString::to_string).collect();
            write!(f, " forced by {}", paths.join(", "))?;
        }
        Ok(())
    }
}

/// A data source read made during planning.
#[derive(Debug, Clone)]
pub struct DataRead {
    /// Address of the data source.
    pub address: Address,
    /// Resulting state; `None` when the config depends on values only known
    /// after apply, so the read happens during apply.
    pub state: Option<Tree>,
}

/// Diagnostics raised while planning one block.
#[derive(Debug, Clone, Serialize)]
pub struct BlockDiagnostics {
    /// Address of the block.
    #[serde(serialize_with = "serialize_address")]
    pub address: Address,
    /// Errors and warnings.
    pub diagnostics: Diagnostics,
}

pub(super) fn serialize_address<S: serde::Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(address)
}

/// A complete deployment plan.
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Blocks in dependency order.
    pub order: Vec<Address>,
    /// Resource changes, in dependency order; deletes of undeclared
    /// resources come last.
    pub changes: Vec<PlannedChange>,
    /// Data source reads.
    pub reads: Vec<DataRead>,
    /// Diagnostics per block.
    pub diagnostics: Vec<BlockDiagnostics>,
}

impl DeploymentPlan {
    /// Creates an empty plan over `order`.
    #[must_use]
    pub fn new(order: Vec<Address>) -> Self {
        Self {
            created_at: Utc::now(),
            order,
            changes: Vec::new(),
            reads: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Records diagnostics for `address`, if there are any.
    pub fn add_diagnostics(&mut self, address: &Address, diagnostics: Diagnostics) {
        if !diagnostics.is_empty() {
            self.diagnostics.push(BlockDiagnostics {
                address: address.clone(),
                diagnostics,
            });
        }
    }

    /// The change planned for `address`.
    #[must_use]
    pub fn change(&self, address: &Address) -> Option<&PlannedChange> {
        self.changes.iter().find(|c| &c.address == address)
    }

    /// The read made for `address`.
    #[must_use]
    pub fn read(&self, address: &Address) -> Option<&DataRead> {
        self.reads.iter().find(|r| &r.address == address)
    }

    /// Number of changes with `action`.
    #[must_use]
    pub fn count(&self, action: ActionType) -> usize {
        self.changes.iter().filter(|c| c.action == action).count()
    }

    /// Returns true if anything besides no-ops is planned.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.changes.iter().any(|c| c.action != ActionType::NoOp)
    }

    /// Number of error diagnostics across all blocks.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().map(|d| d.diagnostics.error_count()).sum()
    }

    /// Returns true if any block failed to plan.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// One-line summary of the planned actions.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Plan: {} to add, {} to change, {} to replace, {} to destroy.",
            self.count(ActionType::Create),
            self.count(ActionType::Update),
            self.count(ActionType::Replace),
            self.count(ActionType::Delete)
        )
    }

    /// JSON rendering for machine-readable output.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let changes: Vec<serde_json::Value> = self
            .changes
            .iter()
            .filter(|c| c.action != ActionType::NoOp)
            .map(|c| {
                serde_json::json!({
                    "address": c.address.to_string(),
                    "action": c.action,
                    "replace_paths": c.replace_paths,
                    "attributes": c.changes().iter().map(|a| serde_json::json!({
                        "path": a.path,
                        "type": a.diff_type(),
                        "before": render_value(&a.before),
                        "after": render_value(&a.after),
                    })).collect::<Vec<_>>(),
                })
            })
            .collect();
        serde_json::json!({
            "created_at": self.created_at,
            "changes": changes,
            "deferred_reads": self.reads.iter().filter(|r| r.state.is_none()).map(|r| r.address.to_string()).collect::<Vec<_>>(),
            "diagnostics": self.diagnostics,
        })
    }
}

impl fmt::Display for DeploymentPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_changes() {
            return writeln!(f, "No changes. The platform matches the configuration.");
        }
        for change in self.changes.iter().filter(|c| c.action != ActionType::NoOp) {
            writeln!(f, "{change}")?;
            for attribute in change.changes() {
                writeln!(f, "    {attribute}")?;
            }
        }
        for read in self.reads.iter().filter(|r| r.state.is_none()) {
            writeln!(f, "{} {} (read during apply)", ActionType::Read.symbol(), read.address)?;
        }
        write!(f, "\n{}", self.summary())
    }
}

// ============================================================================
// Planning one resource
// ============================================================================

/// Outcome of planning one resource.
#[derive(Debug, Clone)]
pub struct ResourcePlan {
    /// Action to take.
    pub action: ActionType,
    /// Planned state.
    pub planned: Tree,
    /// Attributes that force a replacement.
    pub replace_paths: Vec<AttributePath>,
    /// Diagnostics raised by plan modifiers and the resource.
    pub diagnostics: Diagnostics,
}

/// Plans `resource` from its typed `config` and the `prior` stored state.
///
/// A replacement is planned as a create, so computed values become Unknown
/// rather than being carried over from the state being replaced.
#[must_use]
pub fn plan_resource(resource: &dyn Resource, config: &Tree, prior: Option<&Tree>) -> ResourcePlan {
    let (planned, replace_paths, diagnostics) = propose(resource, config, prior);

    let action = match prior {
        None => ActionType::Create,
        Some(_) if !replace_paths.is_empty() => ActionType::Replace,
        Some(prior) if planned.is_fully_known() && planned == *prior => ActionType::NoOp,
        Some(_) => ActionType::Update,
    };
    debug!("Planned {} for {}", action, resource.type_name());

    let planned = if action == ActionType::Replace {
        propose(resource, config, None).0
    } else {
        planned
    };

    ResourcePlan {
        action,
        planned,
        replace_paths,
        diagnostics,
    }
}

fn propose(resource: &dyn Resource, config: &Tree, prior: Option<&Tree>) -> (Tree, Vec<AttributePath>, Diagnostics) {
    let schema = resource.schema();
    let mut planned = config.clone();
    fill_computed(&schema.attributes, &mut planned, prior);

    let mut replace_paths = Vec::new();
    let mut diags = Diagnostics::new();
    apply_modifiers(
        &schema.attributes,
        &AttributePath::empty(),
        config,
        prior,
        &mut planned,
        &mut replace_paths,
        &mut diags,
    );
    resource.modify_plan(config, prior, &mut planned, &mut diags);
    (planned, replace_paths, diags)
}

/// Computed attributes left Null by the config take the prior value, or
/// Unknown when there is no prior value to carry.
fn fill_computed(attributes: &BTreeMap<String, Attribute>, planned: &mut Tree, prior: Option<&Tree>) {
    for (name, attr) in attributes {
        let value = planned.get(name).clone();
        if value.is_null() && attr.mode.is_computed() {
            let carried = prior.map_or(AttrValue::Unknown, |p| p.get(name).clone());
            planned.insert(name.clone(), carried);
            continue;
        }

        let Some((nesting, children)) = &attr.nested else {
            continue;
        };
        let prior_value = prior.map_or(AttrValue::Null, |p| p.get(name).clone());
        let filled = match (nesting, value) {
            (Nesting::Single, AttrValue::Object(mut tree)) => {
                fill_computed(children, &mut tree, prior_value.as_object());
                AttrValue::Object(tree)
            }
            (Nesting::Set, AttrValue::Set(items)) => {
                AttrValue::Set(fill_elements(children, items, prior_value.as_elements().unwrap_or_default()))
            }
            (Nesting::List, AttrValue::List(items)) => {
                AttrValue::List(fill_elements(children, items, prior_value.as_elements().unwrap_or_default()))
            }
            _ => continue,
        };
        planned.insert(name.clone(), filled);
    }
}

/// Each element is filled from the prior element with the same configured
/// values, if there is one.
fn fill_elements(children: &BTreeMap<String, Attribute>, items: Vec<AttrValue>, prior: &[AttrValue]) -> Vec<AttrValue> {
    items
        .into_iter()
        .map(|item| {
            let AttrValue::Object(mut tree) = item else {
                return item;
            };
            let matching = prior
                .iter()
                .filter_map(AttrValue::as_object)
                .find(|p| same_configuration(children, &tree, p));
            fill_computed(children, &mut tree, matching);
            AttrValue::Object(tree)
        })
        .collect()
}

fn same_configuration(children: &BTreeMap<String, Attribute>, config: &Tree, prior: &Tree) -> bool {
    children
        .iter()
        .filter(|(_, attr)| attr.mode.is_configurable())
        .all(|(name, attr)| {
            let value = config.get(name);
            (value.is_null() && attr.mode.is_computed()) || value == prior.get(name)
        })
}

/// Runs the plan modifiers of one level, then of its nested levels.
fn apply_modifiers(
    attributes: &BTreeMap<String, Attribute>,
    parent: &AttributePath,
    config: &Tree,
    prior: Option<&Tree>,
    planned: &mut Tree,
    replace_paths: &mut Vec<AttributePath>,
    diags: &mut Diagnostics,
) {
    for (name, attr) in attributes {
        if attr.plan_modifiers.is_empty() {
            continue;
        }
        let path = parent.at_name(name.clone());
        let config_value = config.value_at(&path);
        let state_value = prior.map_or(AttrValue::Null, |p| p.value_at(&path));
        let plan_value = planned.value_at(&path);
        let snapshot = planned.clone();

        let response = run_chain(
            &attr.plan_modifiers,
            &PlanModifierRequest {
                path: &path,
                config,
                state: prior,
                plan: Some(&snapshot),
                config_value: &config_value,
                state_value: &state_value,
                plan_value: &plan_value,
            },
        );
        if response.plan_value != plan_value && !planned.set_at(&path, response.plan_value) {
            debug!("No place for the modified value of {path} in the plan");
        }
        if response.requires_replace {
            replace_paths.push(path);
        }
        diags.append(response.diagnostics);
    }

    for (name, attr) in attributes {
        let Some((nesting, children)) = &attr.nested else {
            continue;
        };
        let path = parent.at_name(name.clone());
        match (nesting, planned.value_at(&path)) {
            (Nesting::Single, AttrValue::Object(_)) => {
                apply_modifiers(children, &path, config, prior, planned, replace_paths, diags);
            }
            (Nesting::Set | Nesting::List, AttrValue::Set(items) | AttrValue::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    if matches!(item, AttrValue::Object(_)) {
                        apply_modifiers(children, &path.at_index(i), config, prior, planned, replace_paths, diags);
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
    use crate::resource::testing::{ENV, ID, offline, tree};
    use crate::resource::{Dispatcher, VerifyVoicePhrase};
    use serde_json::json;

    fn phrase() -> Dispatcher<VerifyVoicePhrase> {
        Dispatcher::new(offline())
    }

    fn stored(resource: &dyn Resource) -> Tree {
        tree(
            resource.schema(),
            json!({
                "id": ID,
                "environment_id": ENV,
                "display_name": "Main",
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": null,
            }),
        )
    }

    #[test]
    fn test_create_marks_computed_unknown() {
        let resource = phrase();
        let config = tree(resource.schema(), json!({"environment_id": ENV, "display_name": "Main"}));

        let plan = plan_resource(&resource, &config, None);
        assert_eq!(plan.action, ActionType::Create);
        assert!(plan.planned.get("id").is_unknown());
        assert!(plan.planned.get("created_at").is_unknown());
        assert_eq!(plan.planned.get("display_name").as_str(), Some("Main"));
    }

    #[test]
    fn test_unchanged_config_is_noop() {
        let resource = phrase();
        let prior = stored(&resource);
        let config = tree(resource.schema(), json!({"environment_id": ENV, "display_name": "Main"}));

        let plan = plan_resource(&resource, &config, Some(&prior));
        assert_eq!(plan.action, ActionType::NoOp);
        assert_eq!(plan.planned, prior);
    }

    #[test]
    fn test_changed_attribute_is_update() {
        let resource = phrase();
        let prior = stored(&resource);
        let config = tree(resource.schema(), json!({"environment_id": ENV, "display_name": "Renamed"}));

        let plan = plan_resource(&resource, &config, Some(&prior));
        assert_eq!(plan.action, ActionType::Update);
        assert_eq!(plan.planned.get("id").as_str(), Some(ID));
    }

    #[test]
    fn test_requires_replace_plans_as_create() {
        let resource = phrase();
        let prior = stored(&resource);
        let config = tree(
            resource.schema(),
            json!({"environment_id": "1f2e3d4c-5b6a-4789-8a9b-0c1d2e3f4a5b", "display_name": "Main"}),
        );

        let plan = plan_resource(&resource, &config, Some(&prior));
        assert_eq!(plan.action, ActionType::Replace);
        assert_eq!(plan.replace_paths, vec![AttributePath::root("environment_id")]);
        assert!(plan.planned.get("id").is_unknown());
    }

    #[test]
    fn test_plan_display_and_counts() {
        let resource = phrase();
        let config = tree(resource.schema(), json!({"environment_id": ENV, "display_name": "Main"}));
        let result = plan_resource(&resource, &config, None);

        let address = Address::resource("pingone_verify_voice_phrase", "main");
        let mut plan = DeploymentPlan::new(vec![address.clone()]);
        plan.changes.push(PlannedChange {
            address,
            action: result.action,
            prior: None,
            planned: Some(result.planned),
            replace_paths: Vec::new(),
            config_hash: None,
        });

        assert!(plan.has_changes());
        assert_eq!(plan.count(ActionType::Create), 1);
        let text = plan.to_string();
        assert!(text.contains("+ pingone_verify_voice_phrase.main (create)"));
        assert!(text.contains("+ display_name = \"Main\""));
        assert!(text.ends_with("Plan: 1 to add, 0 to change, 0 to replace, 0 to destroy."));
        assert_eq!(plan.to_json()["changes"][0]["action"], "create");
    }
}
