//! Reconciler for maintaining desired state.
//!
//! This module ties the document, the stored state and the provider
//! together: it plans and applies changes under the state lock, refreshes
//! stored state from the platform, reports drift, and imports existing
//! objects.

use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{Address, BlockKind, ConfigHasher, DependencyGraph, DeployDocument};
use crate::error::{PlanError, ProviderError, Result, StateError};
use crate::framework::{Diagnostics, Tree};
use crate::planner::{
    DeploymentPlan, DiffEngine, ExecutionResult, PlanExecutor, Planner, resource_for,
};
use crate::resource::{Provider, StateChange};
use crate::sdk::OpContext;
use crate::state::{
    LOCK_REFRESH_INTERVAL_SECS, LockInfo, ResourceState, StateDocument, StateStore, generate_holder_id,
};

/// Reconciler for maintaining desired state.
pub struct Reconciler<'a, S: StateStore> {
    /// Resource and data source types.
    provider: &'a Provider,
    /// Desired state.
    document: &'a DeployDocument,
    /// State store.
    state_store: &'a S,
    /// Context shared by every operation.
    ctx: OpContext,
    /// Whether to continue on errors.
    continue_on_error: bool,
}

impl<'a, S: StateStore> Reconciler<'a, S> {
    /// Creates a new reconciler.
    #[must_use]
    pub fn new(provider: &'a Provider, document: &'a DeployDocument, state_store: &'a S) -> Self {
        Self {
            provider,
            document,
            state_store,
            ctx: OpContext::new(),
            continue_on_error: false,
        }
    }

    /// Uses `ctx` for every operation, so cancelling it stops retries.
    #[must_use]
    pub fn with_context(mut self, ctx: OpContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// Sets whether apply continues past failed actions.
    #[must_use]
    pub const fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Loads the stored state, or an empty one.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be read.
    pub async fn load_state(&self) -> Result<StateDocument> {
        Ok(self.state_store.load().await?.unwrap_or_default())
    }

    /// Plans the document against the stored state.
    ///
    /// # Errors
    ///
    /// Returns an error if the document's references are broken or the
    /// state cannot be read.
    pub async fn plan(&self) -> Result<(DeploymentPlan, StateDocument)> {
        let state = self.load_state().await?;
        let graph = DependencyGraph::build(self.document)?;
        let plan = Planner::new(self.provider)
            .plan(&self.ctx, self.document, &graph, &state)
            .await?;
        Ok((plan, state))
    }

    /// Plans the deletion of every stored resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be read.
    pub async fn plan_destroy(&self) -> Result<(DeploymentPlan, StateDocument)> {
        let state = self.load_state().await?;
        let graph = DependencyGraph::build(self.document)?;
        let plan = Planner::new(self.provider).plan_destroy(&graph, &state)?;
        Ok((plan, state))
    }

    /// Applies `plan`, made from `state`, under the state lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is held, the state changed since the
    /// plan was made, or the plan has errors.
    pub async fn apply(&self, plan: &DeploymentPlan, state: &StateDocument) -> Result<ExecutionResult> {
        self.locked("apply", self.apply_locked(plan, state)).await
    }

    async fn apply_locked(&self, plan: &DeploymentPlan, planned_from: &StateDocument) -> Result<ExecutionResult> {
        let mut state = self.load_state().await?;
        if state.serial != planned_from.serial {
            return Err(PlanError::Aborted {
                reason: format!(
                    "state changed since the plan was made (serial {} is now {})",
                    planned_from.serial, state.serial
                ),
            }
            .into());
        }

        PlanExecutor::new(self.provider, self.state_store, self.document)
            .with_continue_on_error(self.continue_on_error)
            .execute(&self.ctx, plan, &mut state)
            .await
    }

    /// Reads every stored resource from the platform and writes the result
    /// to state. Resources that no longer exist are removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is held or state cannot be saved.
    pub async fn refresh(&self) -> Result<DriftReport> {
        self.locked("refresh", self.refresh_locked()).await
    }

    async fn refresh_locked(&self) -> Result<DriftReport> {
        let mut state = self.load_state().await?;
        let observed = self.observe(&state).await?;

        let mut changed = false;
        for (entry, tree) in &observed.entries {
            let Some(stored) = state.get(&entry.address).cloned() else {
                continue;
            };
            match (entry.status, tree) {
                (DriftStatus::Changed, Some(tree)) => {
                    if let Some(updated) =
                        ResourceState::from_tree(&stored.type_name, &stored.name, tree, &stored.config_hash)
                    {
                        state.set(entry.address.clone(), updated);
                        changed = true;
                    }
                }
                (DriftStatus::Removed, _) => {
                    info!("{} no longer exists; removing it from state", entry.address);
                    state.remove(&entry.address);
                    changed = true;
                }
                _ => {}
            }
        }

        if changed {
            state.bump_serial();
            self.state_store.save(&state).await?;
        }
        Ok(observed.report())
    }

    /// Compares stored state with the platform without writing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be read.
    pub async fn check_drift(&self) -> Result<DriftReport> {
        let state = self.load_state().await?;
        Ok(self.observe(&state).await?.report())
    }

    async fn observe(&self, state: &StateDocument) -> Result<Observed> {
        info!("Reading {} stored resource(s)", state.resources.len());
        let engine = DiffEngine::new();
        let mut observed = Observed::default();

        for (key, stored) in &state.resources {
            let resource = resource_for(self.provider, &stored.type_name)?;

            let mut diagnostics = Diagnostics::new();
            let prior = stored.tree(resource.schema(), &mut diagnostics);
            let result = resource.read(&self.ctx, &prior).await;
            diagnostics.append(result.diagnostics);

            let (status, changes, tree) = match result.state {
                _ if diagnostics.has_error() => (DriftStatus::Failed, Vec::new(), None),
                StateChange::Set(tree) => {
                    let changes: Vec<String> = engine
                        .compute(Some(&prior), Some(&tree))
                        .iter()
                        .map(ToString::to_string)
                        .collect();
                    if changes.is_empty() {
                        (DriftStatus::InSync, changes, None)
                    } else {
                        (DriftStatus::Changed, changes, Some(tree))
                    }
                }
                StateChange::Remove => (DriftStatus::Removed, Vec::new(), None),
                StateChange::Unchanged => (DriftStatus::InSync, Vec::new(), None),
            };
            debug!("{key}: {status}");
            observed.entries.push((
                DriftEntry {
                    address: key.clone(),
                    status,
                    changes,
                    diagnostics,
                },
                tree,
            ));
        }
        Ok(observed)
    }

    /// Imports an existing platform object into state at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if `address` is not a managed resource address, is
    /// already in state, or the lock is held.
    pub async fn import(&self, address: &Address, id: &str) -> Result<Diagnostics> {
        if address.kind != BlockKind::Resource {
            return Err(PlanError::NotApplicable {
                address: address.to_string(),
                message: String::from("data sources cannot be imported"),
            }
            .into());
        }
        self.locked("import", self.import_locked(address, id)).await
    }

    async fn import_locked(&self, address: &Address, id: &str) -> Result<Diagnostics> {
        let key = address.to_string();
        let mut state = self.load_state().await?;
        if state.get(&key).is_some() {
            return Err(PlanError::NotApplicable {
                address: key,
                message: String::from("the resource is already managed; remove it from state first"),
            }
            .into());
        }
        let resource = resource_for(self.provider, &address.type_name)?;

        let imported = resource.import_state(id);
        let mut diagnostics = imported.diagnostics;
        let StateChange::Set(partial) = imported.state else {
            return Ok(diagnostics);
        };
        if diagnostics.has_error() {
            return Ok(diagnostics);
        }

        info!("Importing {key} from {id}");
        let read = resource.read(&self.ctx, &partial).await;
        diagnostics.append(read.diagnostics);
        match read.state {
            StateChange::Set(tree) if !diagnostics.has_error() => {
                let hash = self
                    .document
                    .block(address)
                    .map(|block| ConfigHasher::new().hash_config(&block.config))
                    .unwrap_or_default();
                self.store_tree(&mut state, address, &tree, &hash, &mut diagnostics).await?;
            }
            StateChange::Remove => diagnostics.add_error(
                "Cannot import non-existent remote object",
                format!("While attempting to import an existing object to \"{key}\", the provider detected that no object exists with the given id. Only pre-existing objects can be imported."),
            ),
            _ => {}
        }
        Ok(diagnostics)
    }

    async fn store_tree(
        &self,
        state: &mut StateDocument,
        address: &Address,
        tree: &Tree,
        config_hash: &str,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        match ResourceState::from_tree(&address.type_name, &address.name, tree, config_hash) {
            Some(entry) => {
                state.set(address.to_string(), entry);
                state.bump_serial();
                self.state_store.save(state).await
            }
            None => {
                diagnostics.add_error(
                    "Provider produced invalid object",
                    format!("The state read for {address} still contains unknown values."),
                );
                Ok(())
            }
        }
    }

    /// Removes `address` from state without touching the platform.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not in state or the lock is held.
    pub async fn forget(&self, address: &str) -> Result<ResourceState> {
        let work = async {
            let mut state = self.load_state().await?;
            let removed = state.remove(address).ok_or_else(|| StateError::ResourceNotFound {
                address: address.to_string(),
            })?;
            state.bump_serial();
            self.state_store.save(&state).await?;
            Ok::<_, ProviderError>(removed)
        };
        self.locked("state rm", work).await
    }

    /// Runs `work` while holding the state lock.
    async fn locked<T>(&self, operation: &str, work: impl Future<Output = Result<T>>) -> Result<T> {
        self.locked_with_refresh(operation, Duration::from_secs(LOCK_REFRESH_INTERVAL_SECS), work)
            .await
    }

    /// Runs `work` while holding the state lock, extending the lock every
    /// `every` so long API retries cannot outlive it.
    ///
    /// If the lock is lost, `work` is dropped and a lock error is returned.
    async fn locked_with_refresh<T>(
        &self,
        operation: &str,
        every: Duration,
        work: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let lock = self.acquire(operation).await?;
        let result = tokio::select! {
            result = work => result,
            error = self.keep_alive(&lock, every) => Err(error),
        };
        self.release(&lock).await;
        result
    }

    /// Refreshes `lock` every `every` until a refresh fails.
    async fn keep_alive(&self, lock: &LockInfo, every: Duration) -> ProviderError {
        let mut current = lock.clone();
        loop {
            tokio::time::sleep(every).await;
            match self.state_store.refresh_lock(&current).await {
                Ok(refreshed) => current = refreshed,
                Err(e) => {
                    warn!("Lost state lock {}: {e}", lock.lock_id);
                    return e;
                }
            }
        }
    }

    async fn acquire(&self, operation: &str) -> Result<LockInfo> {
        let lock = self
            .state_store
            .acquire_lock(&generate_holder_id(), operation)
            .await?;
        debug!("Acquired state lock {} for {operation}", lock.lock_id);
        Ok(lock)
    }

    async fn release(&self, lock: &LockInfo) {
        if let Err(e) = self.state_store.release_lock(&lock.lock_id).await {
            warn!("Failed to release state lock {}: {e}", lock.lock_id);
        }
    }
}

#[derive(Default)]
struct Observed {
    entries: Vec<(DriftEntry, Option<Tree>)>,
}

impl Observed {
    fn report(self) -> DriftReport {
        DriftReport {
            entries: self.entries.into_iter().map(|(entry, _)| entry).collect(),
        }
    }
}

/// How a stored resource compares with the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    /// The platform matches state.
    InSync,
    /// Attributes differ.
    Changed,
    /// The object no longer exists.
    Removed,
    /// The read failed.
    Failed,
}

impl fmt::Display for DriftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InSync => write!(f, "in sync"),
            Self::Changed => write!(f, "changed"),
            Self::Removed => write!(f, "removed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Drift of one stored resource.
#[derive(Debug, Clone, Serialize)]
pub struct DriftEntry {
    /// Resource address.
    pub address: String,
    /// Comparison result.
    pub status: DriftStatus,
    /// Rendered attribute changes.
    pub changes: Vec<String>,
    /// Diagnostics raised by the read.
    pub diagnostics: Diagnostics,
}

/// Report of drift detection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DriftReport {
    /// One entry per stored resource.
    pub entries: Vec<DriftEntry>,
}

impl DriftReport {
    /// Whether any resource drifted.
    #[must_use]
    pub fn has_drift(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e.status, DriftStatus::Changed | DriftStatus::Removed))
    }

    /// Returns true if the state is converged (no drift).
    #[must_use]
    pub fn is_converged(&self) -> bool {
        !self.has_drift()
    }

    /// Number of error diagnostics across all reads.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.entries.iter().map(|e| e.diagnostics.error_count()).sum()
    }
}

impl fmt::Display for DriftReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_drift() {
            return write!(f, "No drift detected - state is converged");
        }
        writeln!(f, "Drift detected:")?;
        for entry in self.entries.iter().filter(|e| e.status != DriftStatus::InSync) {
            writeln!(f, "  {} ({})", entry.address, entry.status)?;
            for change in &entry.changes {
                writeln!(f, "      {change}")?;
            }
        }
        Ok(())
    }
}
