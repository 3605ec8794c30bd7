//! Schema-typed values and the pure functions that run during planning.
//!
//! This module provides:
//! - Tri-state values and the bridge to native types
//! - Attribute trees, paths and path expressions
//! - Diagnostics
//! - Validators and plan modifiers
//! - Schemas and composite import IDs

mod diag;
mod import;
mod model;
mod path;
pub mod planmodifier;
mod schema;
mod tree;
pub mod validator;
mod value;

pub use diag::{Diagnostic, Diagnostics, REPORT_TO_MAINTAINERS, Severity};
pub(crate) use model::tree_model;
pub use import::{ImportComponent, ImportError, PRIMARY_ID_KEY, parse_import_id};
pub use path::{AttributePath, ExpressionStep, PathExpression, PathStep};
pub use planmodifier::{PlanModifier, PlanModifierRequest, PlanModifierResponse};
pub use schema::{Attribute, AttributeMode, Description, Nesting, Schema};
pub use tree::{Attr, AttrType, AttrValue, Tree, TreeModel};
pub use validator::{Validator, ValidatorRequest};
pub use value::{
    Value, bool_ok_to_tf, enum_ok_to_tf, float64_ok_to_tf, int32_ok_to_tf, int64_ok_to_tf,
    resource_id_ok_to_tf, string_list_ok_to_tf, string_ok_to_tf, string_set_ok_to_tf,
    string_to_tf, tf_string_set_to_vec, time_ok_to_tf,
};
