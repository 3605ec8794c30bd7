//! Planning module for deployment operations.
//!
//! This module compares the desired state (the document) with the stored
//! state, produces a plan of resource changes, and executes it.

mod diff;
mod executor;
mod plan;
mod planning;
mod resolve;

pub use diff::{AttributeChange, DiffEngine, DiffType, render_value};
pub use executor::{ActionResult, ActionStatus, ExecutionResult, PlanExecutor};
pub use plan::{
    ActionType, BlockDiagnostics, DataRead, DeploymentPlan, PlannedChange, ResourcePlan, plan_resource,
};
pub use planning::Planner;
pub(crate) use planning::resource_for;
pub use resolve::Scope;
