//! Managed resources and the shared lifecycle dispatcher.
//!
//! Each resource kind supplies its schema, its model, `expand`/`flatten`
//! between the model and the API DTO, and the four API calls. The
//! [`Dispatcher`] turns a kind into a [`Resource`] by running every call
//! through the response parser and writing state only on success.

mod data_source;
mod lookup;
mod mfa_device_policy;
mod mfa_fido2_policy;
mod provider;
mod risk_policy;
mod risk_predictor;
mod verify_policy;
mod verify_voice_phrase;
mod verify_voice_phrase_content;

pub use data_source::{DataSource, LookupDataSource, LookupKind};
pub use lookup::find_first;
pub use mfa_device_policy::MfaDevicePolicy;
pub use mfa_fido2_policy::MfaFido2Policy;
pub use provider::Provider;
pub use risk_policy::RiskPolicy;
pub use risk_predictor::RiskPredictor;
pub use verify_policy::VerifyPolicy;
pub use verify_voice_phrase::VerifyVoicePhrase;
pub use verify_voice_phrase_content::VerifyVoicePhraseContent;

use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info};

use crate::framework::planmodifier::{RequiresReplace, UseStateForUnknown};
use crate::framework::validator::resource_id;
use crate::framework::{
    Attribute, AttributeMode, AttributePath, AttrValue, Description, Diagnostics, ImportComponent,
    REPORT_TO_MAINTAINERS, Schema, Tree, TreeModel, Value, parse_import_id,
};
use crate::pingone::{ApiClient, ClientBundle, SdkResponse};
use crate::sdk::{
    CallOptions, CustomError, OpContext, RetrySettings, Retryable,
    check_environment_exists_on_permissions_error, custom_error_resource_not_found_warning,
    default_create_read_retryable, default_custom_error, default_retryable, parse_response,
};

// ============================================================================
// Provider data
// ============================================================================

/// Clients and retry policy shared by every resource and data source.
#[derive(Debug, Clone)]
pub struct ProviderData {
    /// Platform clients.
    pub clients: ClientBundle,
    /// Retry policy applied to every call.
    pub retry: RetrySettings,
}

impl ProviderData {
    /// Creates provider data.
    #[must_use]
    pub const fn new(clients: ClientBundle, retry: RetrySettings) -> Self {
        Self { clients, retry }
    }

    /// The platform API client.
    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.clients.api
    }

    /// Call options for the named operation under the provider's retry policy.
    #[must_use]
    pub fn call(&self, label: impl Into<String>) -> CallOptions {
        CallOptions::new(label).retry_settings(self.retry)
    }
}

// ============================================================================
// Erased resource interface
// ============================================================================

/// How an operation changes the stored state of a resource.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    /// Store this tree.
    Set(Tree),
    /// Remove the resource from state.
    Remove,
    /// Leave state as it was.
    Unchanged,
}

/// Result of one resource operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    /// State change to persist.
    pub state: StateChange,
    /// Diagnostics raised by the operation.
    pub diagnostics: Diagnostics,
}

impl OperationResult {
    /// A failed operation that leaves state untouched.
    #[must_use]
    pub const fn unchanged(diagnostics: Diagnostics) -> Self {
        Self {
            state: StateChange::Unchanged,
            diagnostics,
        }
    }

    /// Returns true when the diagnostics contain an error.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.diagnostics.has_error()
    }
}

/// A managed resource type, as seen by the host.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Type name, e.g. `pingone_risk_predictor`.
    fn type_name(&self) -> &'static str;

    /// The resource schema.
    fn schema(&self) -> &Schema;

    /// Resource-level plan adjustments run after attribute plan modifiers.
    fn modify_plan(&self, config: &Tree, state: Option<&Tree>, plan: &mut Tree, diags: &mut Diagnostics);

    /// Creates the resource from a fully known plan.
    async fn create(&self, ctx: &OpContext, plan: &Tree) -> OperationResult;

    /// Refreshes the resource from prior state.
    async fn read(&self, ctx: &OpContext, state: &Tree) -> OperationResult;

    /// Updates the resource in place.
    async fn update(&self, ctx: &OpContext, plan: &Tree, state: &Tree) -> OperationResult;

    /// Deletes the resource.
    async fn delete(&self, ctx: &OpContext, state: &Tree) -> OperationResult;

    /// Builds the minimal state for an import ID. The host follows up with
    /// [`Resource::read`].
    fn import_state(&self, id: &str) -> OperationResult;
}

// ============================================================================
// Typed resource kinds
// ============================================================================

/// Per-kind behaviour plugged into the [`Dispatcher`].
#[async_trait]
pub trait ResourceKind: Send + Sync + 'static {
    /// Typed model of the resource's attribute tree.
    type Model: TreeModel + Send + Sync;
    /// API representation.
    type Dto: Send + Sync;

    /// Type name, e.g. `pingone_risk_predictor`.
    const TYPE_NAME: &'static str;
    /// Human-readable kind, e.g. `Risk predictor`.
    const DISPLAY_NAME: &'static str;
    /// Operation suffix of API labels, e.g. `RiskPredictor`.
    const API_NAME: &'static str;

    /// The resource schema.
    fn schema() -> Schema;

    /// Components of the import ID.
    fn import_components() -> Vec<ImportComponent>;

    /// The model's `environment_id`.
    fn environment_id(model: &Self::Model) -> &Value<String>;

    /// The model's `id`.
    fn id(model: &Self::Model) -> &Value<String>;

    /// Builds the request DTO from a plan.
    fn expand(model: &Self::Model, diags: &mut Diagnostics) -> Option<Self::Dto>;

    /// Writes a response DTO into the model.
    fn flatten(model: &mut Self::Model, dto: &Self::Dto, diags: &mut Diagnostics);

    /// Creates the object.
    async fn create_call(api: &ApiClient, model: &Self::Model, dto: &Self::Dto) -> SdkResponse<Self::Dto>;

    /// Reads the object identified by the model.
    async fn read_call(api: &ApiClient, model: &Self::Model) -> SdkResponse<Self::Dto>;

    /// Replaces the object identified by the model.
    async fn update_call(api: &ApiClient, model: &Self::Model, dto: &Self::Dto) -> SdkResponse<Self::Dto>;

    /// Deletes the object identified by the model.
    async fn delete_call(api: &ApiClient, model: &Self::Model) -> SdkResponse<()>;

    /// Whether create and update return a thin DTO that must be read back.
    #[must_use]
    fn needs_read_back() -> bool {
        false
    }

    /// Custom error hook for create and update.
    #[must_use]
    fn write_custom_error() -> CustomError {
        default_custom_error
    }

    /// Extra retry condition for create and read.
    #[must_use]
    fn create_read_retryable() -> Retryable {
        default_create_read_retryable
    }

    /// Resource-level plan adjustments.
    fn modify_plan(_config: &Tree, _state: Option<&Tree>, _plan: &mut Tree, _diags: &mut Diagnostics) {}
}

/// `environment_id`: required, validated, forces replacement.
#[must_use]
pub fn environment_id_attribute(display_name: &str) -> Attribute {
    Attribute::string(AttributeMode::Required)
        .describe(
            Description::from_markdown(format!(
                "The ID of the environment to configure the {display_name} in.  Must be a valid PingOne resource ID."
            ))
            .requires_replace(),
        )
        .with_validator(resource_id())
        .with_plan_modifier(RequiresReplace)
}

/// A required parent ID that forces replacement.
#[must_use]
pub fn parent_id_attribute(markdown: &str) -> Attribute {
    Attribute::string(AttributeMode::Required)
        .describe(Description::from_markdown(markdown).requires_replace())
        .with_validator(resource_id())
        .with_plan_modifier(RequiresReplace)
}

/// `id`: computed and stable across plans.
#[must_use]
pub fn id_attribute() -> Attribute {
    Attribute::string(AttributeMode::Computed)
        .with_description("The ID of the resource.")
        .with_plan_modifier(UseStateForUnknown)
}

/// The value of a known string, or empty.
pub(crate) fn text(value: &Value<String>) -> &str {
    value.as_str().unwrap_or_default()
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Lifecycle dispatcher for one resource kind.
pub struct Dispatcher<K: ResourceKind> {
    provider: Arc<ProviderData>,
    schema: Schema,
    kind: PhantomData<fn() -> K>,
}

impl<K: ResourceKind> std::fmt::Debug for Dispatcher<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("type_name", &K::TYPE_NAME)
            .finish_non_exhaustive()
    }
}

impl<K: ResourceKind> Dispatcher<K> {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(provider: Arc<ProviderData>) -> Self {
        Self {
            provider,
            schema: K::schema(),
            kind: PhantomData,
        }
    }

    fn decode(&self, tree: &Tree, diags: &mut Diagnostics) -> K::Model {
        K::Model::from_tree(tree, &AttributePath::empty(), diags)
    }

    /// Checks that the identifying attributes are known.
    fn require_ids(model: &K::Model, diags: &mut Diagnostics) {
        K::environment_id(model).expand_required(&AttributePath::root("environment_id"), diags);
        K::id(model).expand_required(&AttributePath::root("id"), diags);
    }

    /// Encodes the model and checks it against the schema.
    fn encode(&self, ctx: &OpContext, model: &K::Model, mut diags: Diagnostics) -> OperationResult {
        if ctx.is_cancelled() {
            diags.add_error(
                "Operation cancelled",
                format!("The {} operation was cancelled before state could be written.", K::DISPLAY_NAME),
            );
            return OperationResult::unchanged(diags);
        }

        let tree = model.to_tree();
        tree.check_types(&self.schema.attr_types(), &AttributePath::empty(), &mut diags);
        if diags.has_error() {
            return OperationResult::unchanged(diags);
        }

        OperationResult {
            state: StateChange::Set(tree),
            diagnostics: diags,
        }
    }

    fn data_object_missing(diags: &mut Diagnostics) {
        diags.add_error(
            "Data object missing",
            format!("Cannot convert the data object to state as the data object is nil.  {REPORT_TO_MAINTAINERS}"),
        );
    }

    /// Reads the object back after a thin create or update response.
    async fn read_back(&self, ctx: &OpContext, model: &K::Model, diags: &mut Diagnostics) -> Option<K::Dto> {
        let api = self.provider.api();
        let opts = self
            .provider
            .call(format!("ReadOne{}", K::API_NAME))
            .retryable(K::create_read_retryable());
        let (dto, d) = parse_response(ctx, &opts, move || K::read_call(api, model)).await;
        diags.append(d);
        dto
    }
}

#[async_trait]
impl<K: ResourceKind> Resource for Dispatcher<K> {
    fn type_name(&self) -> &'static str {
        K::TYPE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn modify_plan(&self, config: &Tree, state: Option<&Tree>, plan: &mut Tree, diags: &mut Diagnostics) {
        K::modify_plan(config, state, plan, diags);
    }

    async fn create(&self, ctx: &OpContext, plan: &Tree) -> OperationResult {
        let mut diags = Diagnostics::new();
        let mut model = self.decode(plan, &mut diags);
        if diags.has_error() {
            return OperationResult::unchanged(diags);
        }

        let Some(dto) = K::expand(&model, &mut diags) else {
            return OperationResult::unchanged(diags);
        };
        if diags.has_error() {
            return OperationResult::unchanged(diags);
        }

        debug!("Creating {} in environment {}", K::DISPLAY_NAME, text(K::environment_id(&model)));
        let api = self.provider.api();
        let opts = self
            .provider
            .call(format!("Create{}", K::API_NAME))
            .custom_error(K::write_custom_error())
            .retryable(K::create_read_retryable());
        let (current, request) = (&model, &dto);
        let (created, d) = parse_response(ctx, &opts, move || K::create_call(api, current, request)).await;
        diags.append(d);
        if diags.has_error() {
            return OperationResult::unchanged(diags);
        }

        let Some(mut created) = created else {
            Self::data_object_missing(&mut diags);
            return OperationResult::unchanged(diags);
        };

        if K::needs_read_back() {
            K::flatten(&mut model, &created, &mut diags);
            match self.read_back(ctx, &model, &mut diags).await {
                Some(full) => created = full,
                None => {
                    if !diags.has_error() {
                        Self::data_object_missing(&mut diags);
                    }
                    return OperationResult::unchanged(diags);
                }
            }
        }

        K::flatten(&mut model, &created, &mut diags);
        info!("Created {} {}", K::DISPLAY_NAME, text(K::id(&model)));
        self.encode(ctx, &model, diags)
    }

    async fn read(&self, ctx: &OpContext, state: &Tree) -> OperationResult {
        let mut diags = Diagnostics::new();
        let mut model = self.decode(state, &mut diags);
        Self::require_ids(&model, &mut diags);
        if diags.has_error() {
            return OperationResult::unchanged(diags);
        }

        let api = self.provider.api();
        let current = &model;
        let environment_id = text(K::environment_id(current));
        let opts = self
            .provider
            .call(format!("ReadOne{}", K::API_NAME))
            .custom_error(custom_error_resource_not_found_warning)
            .retryable(K::create_read_retryable());
        let (read, d) = parse_response(ctx, &opts, move || async move {
            let resp = K::read_call(api, current).await;
            check_environment_exists_on_permissions_error(api, environment_id, resp).await
        })
        .await;
        diags.append(d);
        if diags.has_error() {
            return OperationResult::unchanged(diags);
        }

        let Some(read) = read else {
            info!("{} {} no longer exists; removing from state", K::DISPLAY_NAME, text(K::id(&model)));
            return OperationResult {
                state: StateChange::Remove,
                diagnostics: diags,
            };
        };

        K::flatten(&mut model, &read, &mut diags);
        self.encode(ctx, &model, diags)
    }

    async fn update(&self, ctx: &OpContext, plan: &Tree, state: &Tree) -> OperationResult {
        let mut diags = Diagnostics::new();
        let mut model = self.decode(plan, &mut diags);
        let prior = self.decode(state, &mut diags);
        if diags.has_error() {
            return OperationResult::unchanged(diags);
        }

        // Plans carry the id from state; fall back to state when they do not.
        if !K::id(&model).is_known() {
            let mut tree = model.to_tree();
            tree.insert("id", K::id(&prior).clone().into_attr_value());
            model = self.decode(&tree, &mut diags);
        }
        Self::require_ids(&model, &mut diags);

        let Some(dto) = K::expand(&model, &mut diags) else {
            return OperationResult::unchanged(diags);
        };
        if diags.has_error() {
            return OperationResult::unchanged(diags);
        }

        let api = self.provider.api();
        let opts = self
            .provider
            .call(format!("Update{}", K::API_NAME))
            .custom_error(K::write_custom_error())
            .retryable(default_retryable);
        let (current, request) = (&model, &dto);
        let (updated, d) = parse_response(ctx, &opts, move || K::update_call(api, current, request)).await;
        diags.append(d);
        if diags.has_error() {
            return OperationResult::unchanged(diags);
        }

        let updated = if K::needs_read_back() {
            self.read_back(ctx, &model, &mut diags).await
        } else {
            updated
        };
        let Some(updated) = updated else {
            if !diags.has_error() {
                Self::data_object_missing(&mut diags);
            }
            return OperationResult::unchanged(diags);
        };

        K::flatten(&mut model, &updated, &mut diags);
        info!("Updated {} {}", K::DISPLAY_NAME, text(K::id(&model)));
        self.encode(ctx, &model, diags)
    }

    async fn delete(&self, ctx: &OpContext, state: &Tree) -> OperationResult {
        let mut diags = Diagnostics::new();
        let model = self.decode(state, &mut diags);
        Self::require_ids(&model, &mut diags);
        if diags.has_error() {
            return OperationResult::unchanged(diags);
        }

        let api = self.provider.api();
        let opts = self
            .provider
            .call(format!("Delete{}", K::API_NAME))
            .custom_error(custom_error_resource_not_found_warning);
        let current = &model;
        let (_, d) = parse_response(ctx, &opts, move || K::delete_call(api, current)).await;
        diags.append(d);
        if diags.has_error() {
            return OperationResult::unchanged(diags);
        }

        info!("Deleted {} {}", K::DISPLAY_NAME, text(K::id(&model)));
        OperationResult {
            state: StateChange::Remove,
            diagnostics: diags,
        }
    }

    fn import_state(&self, id: &str) -> OperationResult {
        let mut diags = Diagnostics::new();
        match parse_import_id(id, &K::import_components()) {
            Ok(parts) => {
                let mut tree = Tree::new();
                for name in self.schema.attributes.keys() {
                    tree.insert(name.clone(), AttrValue::Null);
                }
                for (key, value) in parts {
                    tree.insert(key, value);
                }
                OperationResult {
                    state: StateChange::Set(tree),
                    diagnostics: diags,
                }
            }
            Err(e) => {
                diags.add_error("Unexpected Import Identifier", e.to_string());
                OperationResult::unchanged(diags)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for resource tests.

    use super::*;
    use crate::pingone::{Region, TokenSource};
    use crate::sdk::Backoff;
    use std::time::Duration;
    use wiremock::MockServer;

    pub const ENV: &str = "9c9ba6a1-3c43-4d70-9d45-9a59e1f6a0b1";
    pub const ID: &str = "0b4e0a59-5a5c-4b3c-8d9f-2f7f2b8c1a11";
    pub const PARENT: &str = "5d2c8f1e-7a6b-4c3d-9e8f-1a2b3c4d5e6f";

    /// Provider data pointing at a mock server with fast retries.
    pub fn provider(server: &MockServer) -> Arc<ProviderData> {
        let api = ApiClient::new(&server.uri(), Arc::new(TokenSource::fixed("t")), Duration::from_secs(5))
            .expect("client");
        Arc::new(ProviderData::new(
            ClientBundle::with_api(api, Region::Eu),
            RetrySettings {
                timeout: Duration::from_millis(200),
                backoff: Backoff::new(Duration::from_millis(1), Duration::from_millis(5)),
            },
        ))
    }

    /// Provider data for tests that never reach the network.
    pub fn offline() -> Arc<ProviderData> {
        let api = ApiClient::new("http://127.0.0.1:9", Arc::new(TokenSource::fixed("t")), Duration::from_secs(1))
            .expect("client");
        Arc::new(ProviderData::new(ClientBundle::with_api(api, Region::Na), RetrySettings::default()))
    }

    /// Builds a tree from JSON, typed by `schema`.
    pub fn tree(schema: &Schema, json: serde_json::Value) -> Tree {
        let mut diags = Diagnostics::new();
        let tree = Tree::from_json(&json, &schema.attr_types(), &AttributePath::empty(), &mut diags);
        assert!(diags.is_empty(), "{diags:?}");
        tree
    }

    /// The stored tree of a successful operation.
    pub fn stored(result: &OperationResult) -> &Tree {
        match &result.state {
            StateChange::Set(tree) => tree,
            other => panic!("expected stored state, got {other:?}: {:?}", result.diagnostics),
        }
    }
}
