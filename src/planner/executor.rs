//! Plan executor for applying deployment plans.
//!
//! Deletes run first, dependents before their dependencies. Then every
//! other block runs in dependency order; each resource's config is resolved
//! again against what has been applied so far and re-planned, so values
//! that were Unknown at plan time are filled in. State is saved after every
//! operation that changes it.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{Address, BlockKind, ConfigHasher, DeployDocument};
use crate::error::{PlanError, Result};
use crate::framework::{Diagnostics, REPORT_TO_MAINTAINERS, Tree};
use crate::resource::{OperationResult, Provider, StateChange};
use crate::sdk::OpContext;
use crate::state::{ResourceState, StateDocument, StateStore};

use super::plan::{ActionType, DataRead, DeploymentPlan, PlannedChange, plan_resource};
use super::planning::{resource_for, unknown_type};
use super::resolve::Scope;

const SKIPPED_AFTER_FAILURE: &str = "Skipped because an earlier action failed";
const SKIPPED_DEPENDENCY: &str = "Skipped because a block it references was not applied";

/// Executor for deployment plans.
pub struct PlanExecutor<'a> {
    /// Resource and data source types.
    provider: &'a Provider,
    /// Where state is saved after every change.
    store: &'a dyn StateStore,
    /// Document the plan was made from.
    document: &'a DeployDocument,
    /// Configuration hasher.
    hasher: ConfigHasher,
    /// Whether to continue on errors.
    continue_on_error: bool,
}

/// Outcome of one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// The action completed.
    Succeeded,
    /// The action raised an error.
    Failed,
    /// The action was not attempted.
    Skipped,
}

/// Result of executing a single action.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    /// Address of the block.
    #[serde(serialize_with = "super::plan::serialize_address")]
    pub address: Address,
    /// Action that was executed.
    pub action: ActionType,
    /// Outcome.
    pub status: ActionStatus,
    /// Diagnostics raised by the action.
    pub diagnostics: Diagnostics,
    /// Why the action was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ActionResult {
    fn finished(address: &Address, action: ActionType, diagnostics: Diagnostics) -> Self {
        let status = if diagnostics.has_error() {
            ActionStatus::Failed
        } else {
            ActionStatus::Succeeded
        };
        Self {
            address: address.clone(),
            action,
            status,
            diagnostics,
            reason: None,
        }
    }

    fn skipped(address: &Address, action: ActionType, reason: &str) -> Self {
        Self {
            address: address.clone(),
            action,
            status: ActionStatus::Skipped,
            diagnostics: Diagnostics::new(),
            reason: Some(reason.to_string()),
        }
    }

    /// Returns true if the action completed.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == ActionStatus::Succeeded
    }
}

/// Result of executing the entire plan.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Individual action results.
    pub results: Vec<ActionResult>,
    /// Total actions executed.
    pub total_executed: usize,
    /// Number of successful actions.
    pub successful: usize,
    /// Number of failed actions.
    pub failed: usize,
    /// Number of skipped actions.
    pub skipped: usize,
    /// Whether the entire plan succeeded.
    pub success: bool,
}

impl ExecutionResult {
    fn from_results(results: Vec<ActionResult>) -> Self {
        let count = |status| results.iter().filter(|r| r.status == status).count();
        let successful = count(ActionStatus::Succeeded);
        let failed = count(ActionStatus::Failed);
        let skipped = count(ActionStatus::Skipped);
        Self {
            total_executed: successful + failed,
            successful,
            failed,
            skipped,
            success: failed == 0 && skipped == 0,
            results,
        }
    }

    /// Number of error diagnostics across all actions.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.results.iter().map(|r| r.diagnostics.error_count()).sum()
    }
}

impl<'a> PlanExecutor<'a> {
    /// Creates a new plan executor.
    #[must_use]
    pub fn new(provider: &'a Provider, store: &'a dyn StateStore, document: &'a DeployDocument) -> Self {
        Self {
            provider,
            store,
            document,
            hasher: ConfigHasher::new(),
            continue_on_error: false,
        }
    }

    /// Sets whether to continue on errors.
    #[must_use]
    pub const fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Executes a deployment plan, updating `state` as it goes.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan has errors, a block's type is unknown,
    /// or state cannot be saved. Failed resource operations are reported in
    /// the result instead.
    pub async fn execute(
        &self,
        ctx: &OpContext,
        plan: &DeploymentPlan,
        state: &mut StateDocument,
    ) -> Result<ExecutionResult> {
        if plan.has_errors() {
            error!("Plan has {} error(s); nothing was applied", plan.error_count());
            return Err(PlanError::Diagnostics {
                count: plan.error_count(),
            }
            .into());
        }
        info!("Executing deployment plan. {}", plan.summary());

        let mut results = Vec::new();
        let mut halted = false;

        for change in plan.changes.iter().rev().filter(|c| c.action == ActionType::Delete) {
            if halted {
                results.push(ActionResult::skipped(&change.address, change.action, SKIPPED_AFTER_FAILURE));
                continue;
            }
            let result = self.execute_delete(ctx, change, state).await?;
            halted |= !result.success() && !self.continue_on_error;
            results.push(result);
        }

        let mut scope = Scope::new();
        for address in &plan.order {
            let result = match address.kind {
                BlockKind::Data => self.execute_read(ctx, plan.read(address), address, halted, &mut scope).await?,
                BlockKind::Resource => match plan.change(address) {
                    None => {
                        scope.set_pending(address.clone());
                        None
                    }
                    Some(change) if change.action == ActionType::NoOp => {
                        if let Some(prior) = &change.prior {
                            scope.set_known(address.clone(), prior.clone());
                        }
                        None
                    }
                    Some(change) if change.action == ActionType::Delete => None,
                    Some(change) if halted => {
                        scope.set_pending(address.clone());
                        Some(ActionResult::skipped(address, change.action, SKIPPED_AFTER_FAILURE))
                    }
                    Some(change) => Some(self.execute_change(ctx, change, &mut scope, state).await?),
                },
            };
            if let Some(result) = result {
                halted |= result.status == ActionStatus::Failed && !self.continue_on_error;
                results.push(result);
            }
        }

        let result = ExecutionResult::from_results(results);
        if result.success {
            info!("Apply complete: {} action(s) succeeded", result.successful);
        } else {
            warn!(
                "Apply finished with {} failed and {} skipped action(s)",
                result.failed, result.skipped
            );
        }
        Ok(result)
    }

    /// Reads a data source deferred to apply; reads made during planning are
    /// reused.
    async fn execute_read(
        &self,
        ctx: &OpContext,
        read: Option<&DataRead>,
        address: &Address,
        halted: bool,
        scope: &mut Scope,
    ) -> Result<Option<ActionResult>> {
        match read {
            Some(DataRead { state: Some(tree), .. }) => {
                scope.set_known(address.clone(), tree.clone());
                return Ok(None);
            }
            Some(_) if !halted => {}
            Some(_) => {
                scope.set_pending(address.clone());
                return Ok(Some(ActionResult::skipped(address, ActionType::Read, SKIPPED_AFTER_FAILURE)));
            }
            None => {
                scope.set_pending(address.clone());
                return Ok(None);
            }
        }

        let data_source = self
            .provider
            .data_source(&address.type_name)
            .ok_or_else(|| unknown_type("data source", &address.type_name))?;
        let block = self.block(address)?;

        let (config, mut diags) = scope.type_config(data_source.schema(), &block.config);
        if !diags.has_error() && !config.is_fully_known() {
            scope.set_pending(address.clone());
            return Ok(Some(ActionResult::skipped(address, ActionType::Read, SKIPPED_DEPENDENCY)));
        }
        if !diags.has_error() {
            info!("Reading {address}");
            let result = data_source.read(ctx, &config).await;
            diags.append(result.diagnostics);
            if let StateChange::Set(tree) = result.state {
                scope.set_known(address.clone(), tree);
            }
        }
        if diags.has_error() {
            scope.set_pending(address.clone());
        }
        Ok(Some(ActionResult::finished(address, ActionType::Read, diags)))
    }

    async fn execute_delete(
        &self,
        ctx: &OpContext,
        change: &PlannedChange,
        state: &mut StateDocument,
    ) -> Result<ActionResult> {
        let address = &change.address;
        let resource = resource_for(self.provider, &address.type_name)?;
        let mut diags = Diagnostics::new();
        let Some(prior) = &change.prior else {
            diags.add_error(
                "Missing prior state",
                format!("A delete of {address} was planned without its stored state.  {REPORT_TO_MAINTAINERS}"),
            );
            return Ok(ActionResult::finished(address, change.action, diags));
        };

        info!("Deleting {address}");
        let result = resource.delete(ctx, prior).await;
        self.persist(address, result, "", state, &mut diags).await?;
        Ok(ActionResult::finished(address, change.action, diags))
    }

    async fn execute_change(
        &self,
        ctx: &OpContext,
        change: &PlannedChange,
        scope: &mut Scope,
        state: &mut StateDocument,
    ) -> Result<ActionResult> {
        let address = &change.address;
        let resource = resource_for(self.provider, &address.type_name)?;
        let block = self.block(address)?;

        let (config, mut diags) = scope.type_config(resource.schema(), &block.config);
        if diags.has_error() {
            scope.set_pending(address.clone());
            return Ok(ActionResult::finished(address, change.action, diags));
        }
        if !config.is_fully_known() {
            scope.set_pending(address.clone());
            return Ok(ActionResult::skipped(address, change.action, SKIPPED_DEPENDENCY));
        }

        let key = address.to_string();
        let prior = state.get(&key).map(|stored| stored.tree(resource.schema(), &mut diags));
        let planned = plan_resource(resource, &config, prior.as_ref());
        diags.append(planned.diagnostics);
        if diags.has_error() {
            scope.set_pending(address.clone());
            return Ok(ActionResult::finished(address, planned.action, diags));
        }
        if planned.action != change.action {
            debug!("{address}: planned {} but applying {}", change.action, planned.action);
        }

        let hash = self.hasher.hash_config(&block.config);
        let outcome = match (planned.action, prior) {
            (ActionType::NoOp, Some(prior)) => {
                scope.set_known(address.clone(), prior);
                return Ok(ActionResult::finished(address, ActionType::NoOp, diags));
            }
            (ActionType::Update, Some(prior)) => {
                info!("Updating {address}");
                resource.update(ctx, &planned.planned, &prior).await
            }
            (ActionType::Replace, Some(prior)) => {
                info!("Replacing {address}");
                let deleted = resource.delete(ctx, &prior).await;
                self.persist(address, deleted, &hash, state, &mut diags).await?;
                if diags.has_error() {
                    scope.set_pending(address.clone());
                    return Ok(ActionResult::finished(address, ActionType::Replace, diags));
                }
                resource.create(ctx, &planned.planned).await
            }
            _ => {
                info!("Creating {address}");
                resource.create(ctx, &planned.planned).await
            }
        };

        match self.persist(address, outcome, &hash, state, &mut diags).await? {
            Some(tree) if !diags.has_error() => scope.set_known(address.clone(), tree),
            _ => scope.set_pending(address.clone()),
        }
        Ok(ActionResult::finished(address, planned.action, diags))
    }

    /// Applies the state change of `result` and saves. Returns the stored
    /// tree, if one was stored.
    async fn persist(
        &self,
        address: &Address,
        result: OperationResult,
        config_hash: &str,
        state: &mut StateDocument,
        diags: &mut Diagnostics,
    ) -> Result<Option<Tree>> {
        diags.append(result.diagnostics);
        let key = address.to_string();
        match result.state {
            StateChange::Set(tree) => {
                let Some(entry) = ResourceState::from_tree(&address.type_name, &address.name, &tree, config_hash)
                else {
                    diags.add_error(
                        "Provider produced invalid object",
                        format!("The state returned for {address} still contains unknown values.  {REPORT_TO_MAINTAINERS}"),
                    );
                    return Ok(None);
                };
                state.set(key, entry);
                self.save(state).await?;
                Ok(Some(tree))
            }
            StateChange::Remove => {
                if state.remove(&key).is_some() {
                    self.save(state).await?;
                }
                Ok(None)
            }
            StateChange::Unchanged => Ok(None),
        }
    }

    async fn save(&self, state: &mut StateDocument) -> Result<()> {
        state.bump_serial();
        self.store.save(state).await?;
        debug!("State saved at serial {}", state.serial);
        Ok(())
    }

    fn block(&self, address: &Address) -> Result<&'a crate::config::Block> {
        self.document.block(address).ok_or_else(|| {
            PlanError::NotApplicable {
                address: address.to_string(),
                message: String::from("the block is no longer declared in the document"),
            }
            .into()
        })
    }
}
