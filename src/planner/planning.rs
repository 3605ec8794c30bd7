//! Building a deployment plan from a document and the stored state.

use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::config::{Address, Block, BlockKind, ConfigHasher, DependencyGraph, DeployDocument};
use crate::error::{ConfigError, ProviderError, Result};
use crate::framework::Diagnostics;
use crate::resource::{DataSource, Provider, Resource, StateChange};
use crate::sdk::OpContext;
use crate::state::{ResourceState, StateDocument};

use super::plan::{ActionType, BlockDiagnostics, DataRead, DeploymentPlan, PlannedChange, plan_resource};
use super::resolve::Scope;

/// Plans documents against one provider.
#[derive(Debug)]
pub struct Planner<'a> {
    provider: &'a Provider,
    hasher: ConfigHasher,
}

pub(crate) fn unknown_type(kind: &str, type_name: &str) -> ProviderError {
    ProviderError::Config(ConfigError::UnknownType {
        kind: kind.to_string(),
        type_name: type_name.to_string(),
    })
}

pub(crate) fn resource_for<'p>(provider: &'p Provider, type_name: &str) -> Result<&'p dyn Resource> {
    provider
        .resource(type_name)
        .ok_or_else(|| unknown_type("resource", type_name))
}

impl<'a> Planner<'a> {
    /// Creates a planner.
    #[must_use]
    pub const fn new(provider: &'a Provider) -> Self {
        Self {
            provider,
            hasher: ConfigHasher::new(),
        }
    }

    /// Plans every block of `document` in dependency order.
    ///
    /// Data sources whose config is fully known are read now; the others are
    /// read during apply. Stored resources no longer declared are deleted.
    /// Block-level problems are recorded as plan diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error if a block or a stored resource has a type the
    /// provider does not serve.
    pub async fn plan(
        &self,
        ctx: &OpContext,
        document: &DeployDocument,
        graph: &DependencyGraph,
        state: &StateDocument,
    ) -> Result<DeploymentPlan> {
        info!("Planning {} block(s)", graph.order().len());
        let mut plan = DeploymentPlan::new(graph.order().to_vec());
        let mut scope = Scope::new();

        for address in graph.order() {
            let Some(block) = document.block(address) else {
                continue;
            };
            match address.kind {
                BlockKind::Data => self.plan_read(ctx, address, block, &mut scope, &mut plan).await?,
                BlockKind::Resource => self.plan_change(address, block, state, &mut scope, &mut plan)?,
            }
        }

        let declared: BTreeSet<String> = document
            .resources
            .iter()
            .map(|b| Address::resource(&b.type_name, &b.name).to_string())
            .collect();
        for (key, stored) in &state.resources {
            if !declared.contains(key) {
                debug!("{key} is no longer declared");
                let change = self.plan_delete(stored, &mut plan)?;
                plan.changes.push(change);
            }
        }

        info!("{}", plan.summary());
        Ok(plan)
    }

    /// Types and validates every block without reading anything. References
    /// resolve to Unknown, so only their targets and attributes are checked
    /// later, at plan time.
    ///
    /// # Errors
    ///
    /// Returns an error if a block has a type the provider does not serve.
    pub fn validate(&self, document: &DeployDocument, graph: &DependencyGraph) -> Result<Vec<BlockDiagnostics>> {
        let mut scope = Scope::new();
        for address in graph.order() {
            scope.set_pending(address.clone());
        }

        let mut found = Vec::new();
        for address in graph.order() {
            let Some(block) = document.block(address) else {
                continue;
            };
            let schema = match address.kind {
                BlockKind::Resource => resource_for(self.provider, &address.type_name)?.schema(),
                BlockKind::Data => self
                    .provider
                    .data_source(&address.type_name)
                    .ok_or_else(|| unknown_type("data source", &address.type_name))?
                    .schema(),
            };
            let (_, diagnostics) = scope.type_config(schema, &block.config);
            debug!("{address}: {} diagnostic(s)", diagnostics.len());
            if !diagnostics.is_empty() {
                found.push(BlockDiagnostics {
                    address: address.clone(),
                    diagnostics,
                });
            }
        }
        Ok(found)
    }

    /// Plans the deletion of every stored resource. Dependents are listed
    /// after their dependencies, so deleting in reverse order is safe.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored resource has a type the provider does
    /// not serve.
    pub fn plan_destroy(&self, graph: &DependencyGraph, state: &StateDocument) -> Result<DeploymentPlan> {
        let mut plan = DeploymentPlan::new(graph.order().to_vec());
        let mut keys: Vec<&String> = Vec::new();
        for address in graph.order() {
            if let Some((key, _)) = state.resources.get_key_value(&address.to_string()) {
                keys.push(key);
            }
        }
        for key in state.resources.keys() {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        for key in keys {
            if let Some(stored) = state.get(key) {
                let change = self.plan_delete(stored, &mut plan)?;
                plan.changes.push(change);
            }
        }
        info!("{}", plan.summary());
        Ok(plan)
    }

    async fn plan_read(
        &self,
        ctx: &OpContext,
        address: &Address,
        block: &Block,
        scope: &mut Scope,
        plan: &mut DeploymentPlan,
    ) -> Result<()> {
        let data_source: &dyn DataSource = self
            .provider
            .data_source(&address.type_name)
            .ok_or_else(|| unknown_type("data source", &address.type_name))?;

        let (config, mut diags) = scope.type_config(data_source.schema(), &block.config);
        if diags.has_error() {
            scope.set_pending(address.clone());
        } else if !config.is_fully_known() {
            debug!("Deferring read of {address} until apply");
            scope.set_pending(address.clone());
            plan.reads.push(DataRead {
                address: address.clone(),
                state: None,
            });
        } else {
            debug!("Reading {address}");
            let result = data_source.read(ctx, &config).await;
            diags.append(result.diagnostics);
            if let StateChange::Set(tree) = result.state {
                scope.set_known(address.clone(), tree.clone());
                plan.reads.push(DataRead {
                    address: address.clone(),
                    state: Some(tree),
                });
            } else {
                scope.set_pending(address.clone());
            }
        }
        plan.add_diagnostics(address, diags);
        Ok(())
    }

    fn plan_change(
        &self,
        address: &Address,
        block: &Block,
        state: &StateDocument,
        scope: &mut Scope,
        plan: &mut DeploymentPlan,
    ) -> Result<()> {
        let resource = resource_for(self.provider, &address.type_name)?;
        let mut diags = Diagnostics::new();
        let prior = state
            .get(&address.to_string())
            .map(|stored| stored.tree(resource.schema(), &mut diags));

        let (config, config_diags) = scope.type_config(resource.schema(), &block.config);
        diags.append(config_diags);
        if diags.has_error() {
            scope.set_pending(address.clone());
            plan.add_diagnostics(address, diags);
            return Ok(());
        }

        let result = plan_resource(resource, &config, prior.as_ref());
        diags.append(result.diagnostics);
        if diags.has_error() {
            scope.set_pending(address.clone());
            plan.add_diagnostics(address, diags);
            return Ok(());
        }

        scope.set_known(address.clone(), result.planned.clone());
        plan.changes.push(PlannedChange {
            address: address.clone(),
            action: result.action,
            prior,
            planned: Some(result.planned),
            replace_paths: result.replace_paths,
            config_hash: Some(self.hasher.hash_config(&block.config)),
        });
        plan.add_diagnostics(address, diags);
        Ok(())
    }

    fn plan_delete(&self, stored: &ResourceState, plan: &mut DeploymentPlan) -> Result<PlannedChange> {
        let resource = resource_for(self.provider, &stored.type_name)?;
        let address = Address::resource(&stored.type_name, &stored.name);
        let mut diags = Diagnostics::new();
        let prior = stored.tree(resource.schema(), &mut diags);
        if diags.has_error() {
            warn!("Stored state of {address} does not match the schema");
        }
        plan.add_diagnostics(&address, diags);
        Ok(PlannedChange {
            address,
            action: ActionType::Delete,
            prior: Some(prior),
            planned: None,
            replace_paths: Vec::new(),
            config_hash: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::{ENV, ID, offline, provider};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn document() -> DeployDocument {
        DeployDocument {
            resources: vec![
                Block::new(
                    "pingone_verify_voice_phrase_content",
                    "en",
                    json!({
                        "environment_id": ENV,
                        "voice_phrase_id": "${pingone_verify_voice_phrase.main.id}",
                        "locale": "en",
                        "content": "My voice is my password",
                    }),
                ),
                Block::new(
                    "pingone_verify_voice_phrase",
                    "main",
                    json!({"environment_id": ENV, "display_name": "Main"}),
                ),
            ],
            ..DeployDocument::default()
        }
    }

    fn stored_phrase() -> ResourceState {
        ResourceState {
            type_name: "pingone_verify_voice_phrase".to_string(),
            name: "main".to_string(),
            attributes: json!({
                "id": ID,
                "environment_id": ENV,
                "display_name": "Main",
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": null,
            }),
            config_hash: String::new(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_fresh_state_creates_in_dependency_order() {
        let provider = Provider::new(offline());
        let document = document();
        let graph = DependencyGraph::build(&document).expect("graph");

        let plan = Planner::new(&provider)
            .plan(&OpContext::new(), &document, &graph, &StateDocument::new())
            .await
            .expect("plan");

        assert!(!plan.has_errors(), "{:?}", plan.diagnostics);
        assert_eq!(plan.count(ActionType::Create), 2);
        assert_eq!(plan.changes[0].address.name, "main");
        let content = plan.changes[1].planned.as_ref().expect("planned");
        assert!(content.get("voice_phrase_id").is_unknown());
    }

    #[tokio::test]
    async fn test_stored_resource_resolves_references() {
        let provider = Provider::new(offline());
        let document = document();
        let graph = DependencyGraph::build(&document).expect("graph");
        let mut state = StateDocument::new();
        state.set("pingone_verify_voice_phrase.main", stored_phrase());

        let plan = Planner::new(&provider)
            .plan(&OpContext::new(), &document, &graph, &state)
            .await
            .expect("plan");

        assert_eq!(plan.changes[0].action, ActionType::NoOp);
        let content = plan.changes[1].planned.as_ref().expect("planned");
        assert_eq!(content.get("voice_phrase_id").as_str(), Some(ID));
        assert_eq!(plan.summary(), "Plan: 1 to add, 0 to change, 0 to replace, 0 to destroy.");
    }

    #[tokio::test]
    async fn test_undeclared_resource_is_deleted() {
        let provider = Provider::new(offline());
        let document = DeployDocument::default();
        let graph = DependencyGraph::build(&document).expect("graph");
        let mut state = StateDocument::new();
        state.set("pingone_verify_voice_phrase.main", stored_phrase());

        let plan = Planner::new(&provider)
            .plan(&OpContext::new(), &document, &graph, &state)
            .await
            .expect("plan");
        assert_eq!(plan.count(ActionType::Delete), 1);
        assert!(plan.changes[0].planned.is_none());
    }

    #[tokio::test]
    async fn test_invalid_config_is_a_plan_diagnostic() {
        let provider = Provider::new(offline());
        let document = DeployDocument {
            resources: vec![Block::new(
                "pingone_verify_voice_phrase",
                "main",
                json!({"environment_id": "not-a-uuid", "display_name": "Main"}),
            )],
            ..DeployDocument::default()
        };
        let graph = DependencyGraph::build(&document).expect("graph");

        let plan = Planner::new(&provider)
            .plan(&OpContext::new(), &document, &graph, &StateDocument::new())
            .await
            .expect("plan");
        assert!(plan.has_errors());
        assert!(plan.changes.is_empty());
        assert_eq!(plan.diagnostics[0].address.name, "main");
    }

    #[test]
    fn test_validate_treats_references_as_unknown() {
        let provider = Provider::new(offline());
        let mut document = document();
        document.resources[1].config = json!({"environment_id": ENV, "display_name": ""});
        let graph = DependencyGraph::build(&document).expect("graph");

        let found = Planner::new(&provider).validate(&document, &graph).expect("validate");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].address.name, "main");
        assert!(found[0].diagnostics.has_error());
    }

    #[tokio::test]
    async fn test_known_data_source_is_read_during_plan() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/environments/{ENV}/voicePhrases/{ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": ID, "displayName": "Main", "createdAt": "2024-01-01T00:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = Provider::new(provider(&server));
        let document = DeployDocument {
            data: vec![
                Block::new(
                    "pingone_verify_voice_phrase",
                    "existing",
                    json!({"environment_id": ENV, "voice_phrase_id": ID}),
                ),
                Block::new(
                    "pingone_verify_voice_phrase",
                    "later",
                    json!({"environment_id": ENV, "voice_phrase_id": "${pingone_verify_voice_phrase.main.id}"}),
                ),
            ],
            resources: vec![Block::new(
                "pingone_verify_voice_phrase",
                "main",
                json!({"environment_id": ENV, "display_name": "Main"}),
            )],
            ..DeployDocument::default()
        };
        let graph = DependencyGraph::build(&document).expect("graph");

        let plan = Planner::new(&provider)
            .plan(&OpContext::new(), &document, &graph, &StateDocument::new())
            .await
            .expect("plan");

        assert!(!plan.has_errors(), "{:?}", plan.diagnostics);
        let existing = plan
            .read(&Address::data("pingone_verify_voice_phrase", "existing"))
            .and_then(|r| r.state.as_ref())
            .expect("read during plan");
        assert_eq!(existing.get("display_name").as_str(), Some("Main"));
        let later = plan
            .read(&Address::data("pingone_verify_voice_phrase", "later"))
            .expect("deferred");
        assert!(later.state.is_none());
    }

    #[test]
    fn test_destroy_orders_dependencies_first() {
        let provider = Provider::new(offline());
        let document = document();
        let graph = DependencyGraph::build(&document).expect("graph");
        let mut state = StateDocument::new();
        state.set("pingone_verify_voice_phrase.main", stored_phrase());
        let mut content = stored_phrase();
        content.type_name = "pingone_verify_voice_phrase_content".to_string();
        content.name = "en".to_string();
        content.attributes = json!({
            "id": "c1", "environment_id": ENV, "voice_phrase_id": ID, "locale": "en", "content": "x",
        });
        state.set("pingone_verify_voice_phrase_content.en", content);

        let plan = Planner::new(&provider).plan_destroy(&graph, &state).expect("plan");
        let names: Vec<&str> = plan.changes.iter().map(|c| c.address.name.as_str()).collect();
        assert_eq!(names, vec!["main", "en"]);
        assert!(plan.changes.iter().all(|c| c.action == ActionType::Delete));
    }
}
