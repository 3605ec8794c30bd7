// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // Public items should be documented
#![warn(dead_code)]                   // Unused code is flagged
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![warn(unused_imports)]              // Unused imports are flagged
#![warn(unused_variables)]            // Unused variables are flagged
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # `PingOne` Provider
//!
//! A reconciliation and transport engine for `PingOne` configuration:
//! risk predictors and policies, MFA device and FIDO2 policies, and
//! identity verification policies and voice phrases.
//!
//! ## Overview
//!
//! The engine sits between a declarative plan/apply host and the `PingOne`
//! management API:
//!
//! - Tri-state schema values (null, unknown, known) are bridged to typed
//!   API payloads in both directions
//! - Validators and plan modifiers run over configuration during planning
//! - Every API call runs through one retry, classification and diagnostics
//!   pipeline, with a probe that turns permission errors for deleted
//!   environments into "not found"
//! - A shared dispatcher runs the create/read/update/delete lifecycle for
//!   every resource kind
//!
//! A local host drives the engine from a YAML document, keeping state in a
//! JSON file under `.pingone/`.
//!
//! ## Modules
//!
//! - [`framework`]: Values, trees, paths, diagnostics, validators, plan modifiers, schemas
//! - [`pingone`]: API client, authentication, pagination and DTOs
//! - [`sdk`]: Retry, classification, response parsing and the environment probe
//! - [`resource`]: Resource kinds, the lifecycle dispatcher and data sources
//! - [`config`]: Document parsing, references and provider settings
//! - [`state`]: State storage and locking
//! - [`planner`]: Plan computation and execution
//! - [`reconciler`]: Refresh, drift, import and apply under lock
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! provider:
//!   region_code: EU
//!
//! resources:
//!   - type: pingone_verify_voice_phrase
//!     name: main
//!     config:
//!       environment_id: "9c9ba6a1-3c43-4d70-9d45-9a59e1f6a0b1"
//!       display_name: "Main phrase"
//!
//!   - type: pingone_verify_voice_phrase_content
//!     name: english
//!     config:
//!       environment_id: "9c9ba6a1-3c43-4d70-9d45-9a59e1f6a0b1"
//!       voice_phrase_id: "${pingone_verify_voice_phrase.main.id}"
//!       locale: en
//!       content: "My voice is my password"
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod framework;
pub mod pingone;
pub mod planner;
pub mod reconciler;
pub mod resource;
pub mod sdk;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigHasher, ConfigParser, ConfigValidator, DeployDocument, ProviderConfig};
pub use error::{ProviderError, Result};
pub use framework::{AttrValue, Diagnostic, Diagnostics, Schema, Tree};
pub use planner::{DeploymentPlan, DiffEngine, PlanExecutor, Planner};
pub use reconciler::{DriftReport, Reconciler};
pub use resource::{DataSource, Provider, Resource};
pub use state::{LocalStateStore, StateDocument, StateStore};
