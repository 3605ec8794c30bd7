//! Read-only data sources that find one object by ID, by name or as the
//! environment's default.
//!
//! A data source reuses its resource kind's model and `flatten`; its schema
//! is the resource schema turned read-only, plus the selector attributes.
//! Exactly one selector must be configured.

use async_trait::async_trait;
use futures::Stream;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

use crate::framework::validator::{ExactlyOneOf, LengthAtLeast, resource_id};
use crate::framework::{
    Attribute, AttributeMode, AttributePath, Description, Diagnostics, PathExpression, Schema,
    Tree, TreeModel,
};
use crate::pingone::risk::RiskPredictor as RiskPredictorDto;
use crate::pingone::verify::{VerifyPolicy as VerifyPolicyDto, VoicePhrase};
use crate::pingone::{ApiClient, PageCursor};
use crate::sdk::{
    OpContext, check_environment_exists_on_permissions_error, custom_error_resource_not_found_warning,
    default_create_read_retryable, parse_response,
};

use super::lookup::find_first;
use super::{
    OperationResult, ProviderData, ResourceKind, RiskPredictor, StateChange,
    VerifyPolicy, VerifyVoicePhrase,
};

/// A data source type, as seen by the host.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Type name, e.g. `pingone_risk_predictor`.
    fn type_name(&self) -> &'static str;

    /// The data source schema.
    fn schema(&self) -> &Schema;

    /// Resolves the configured selector and returns the object's state.
    async fn read(&self, ctx: &OpContext, config: &Tree) -> OperationResult;
}

/// A resource kind that can also be looked up.
pub trait LookupKind: ResourceKind {
    /// Attribute selecting by ID, e.g. `risk_predictor_id`.
    const ID_SELECTOR: &'static str;
    /// Attribute selecting by name.
    const NAME_SELECTOR: &'static str;
    /// Operation suffix of the listing call, e.g. `RiskPredictors`.
    const LIST_API_NAME: &'static str;
    /// Whether `default = true` selects the environment's default object.
    const SELECTS_DEFAULT: bool = false;

    /// Streams every object of the environment.
    fn read_all<'a>(
        api: &'a ApiClient,
        environment_id: &'a str,
    ) -> impl Stream<Item = PageCursor<Self::Dto>> + Send + 'a;

    /// The object's name.
    fn name_of(dto: &Self::Dto) -> &str;

    /// Whether a listed name matches the configured one.
    #[must_use]
    fn name_matches(listed: &str, wanted: &str) -> bool {
        listed == wanted
    }

    /// Whether the object is the environment's default.
    #[must_use]
    fn is_default(_dto: &Self::Dto) -> bool {
        false
    }
}

/// How a lookup identifies its object.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Selector {
    Id(String),
    Name(String),
    Default,
}

/// Turns a resource attribute into a read-only one.
fn read_only(attribute: &Attribute) -> Attribute {
    let mut copy = attribute.clone();
    copy.mode = AttributeMode::Computed;
    copy.validators.clear();
    copy.plan_modifiers.clear();
    if let Some((_, children)) = copy.nested.as_mut() {
        for child in children.values_mut() {
            *child = read_only(child);
        }
    }
    copy
}

/// Data source backed by a [`LookupKind`].
pub struct LookupDataSource<K: LookupKind> {
    provider: Arc<ProviderData>,
    schema: Schema,
    kind: PhantomData<fn() -> K>,
}

impl<K: LookupKind> std::fmt::Debug for LookupDataSource<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupDataSource")
            .field("type_name", &K::TYPE_NAME)
            .finish_non_exhaustive()
    }
}

impl<K: LookupKind> LookupDataSource<K> {
    /// Creates the data source.
    #[must_use]
    pub fn new(provider: Arc<ProviderData>) -> Self {
        Self {
            provider,
            schema: Self::build_schema(),
            kind: PhantomData,
        }
    }

    fn selectors() -> Vec<&'static str> {
        let mut selectors = vec![K::ID_SELECTOR, K::NAME_SELECTOR];
        if K::SELECTS_DEFAULT {
            selectors.push("default");
        }
        selectors
    }

    fn exactly_one_selector() -> ExactlyOneOf {
        ExactlyOneOf::new(
            Self::selectors()
                .into_iter()
                .map(|name| PathExpression::match_relative().at_parent().at_name(name))
                .collect(),
        )
    }

    fn build_schema() -> Schema {
        let resource = K::schema();
        let selectors = Self::selectors();
        let kind = K::DISPLAY_NAME.to_lowercase();

        let mut schema = Schema::new(&format!("Data source to retrieve a {kind} in a PingOne environment."));
        for (name, attribute) in &resource.attributes {
            if name == "id" || name == "environment_id" {
                continue;
            }
            schema = schema.with_attribute(name, read_only(attribute));
        }

        schema = schema
            .with_attribute(
                "id",
                Attribute::string(AttributeMode::Computed).with_description(&format!("The ID of the {kind}.")),
            )
            .with_attribute(
                "environment_id",
                Attribute::string(AttributeMode::Required)
                    .with_description(&format!("The ID of the environment that contains the {kind}."))
                    .with_validator(resource_id()),
            )
            .with_attribute(
                K::ID_SELECTOR,
                Attribute::string(AttributeMode::OptionalComputed)
                    .describe(
                        Description::from_markdown(format!("The identifier (UUID) of the {kind} to retrieve."))
                            .exactly_one_of(&selectors),
                    )
                    .with_validator(resource_id())
                    .with_validator(Self::exactly_one_selector()),
            )
            .with_attribute(
                K::NAME_SELECTOR,
                Attribute::string(AttributeMode::OptionalComputed)
                    .describe(
                        Description::from_markdown(format!("The name of the {kind} to retrieve."))
                            .exactly_one_of(&selectors),
                    )
                    .with_validator(LengthAtLeast(1))
                    .with_validator(Self::exactly_one_selector()),
            );

        if K::SELECTS_DEFAULT {
            schema = schema.with_attribute(
                "default",
                Attribute::bool(AttributeMode::OptionalComputed)
                    .describe(
                        Description::from_markdown(format!(
                            "Set to `true` to retrieve the environment's default {kind}."
                        ))
                        .exactly_one_of(&selectors),
                    )
                    .with_validator(Self::exactly_one_selector()),
            );
        }
        schema
    }

    fn selector(config: &Tree, diags: &mut Diagnostics) -> Option<Selector> {
        if let Some(id) = config.get(K::ID_SELECTOR).as_str() {
            return Some(Selector::Id(id.to_string()));
        }
        if let Some(name) = config.get(K::NAME_SELECTOR).as_str() {
            return Some(Selector::Name(name.to_string()));
        }
        if K::SELECTS_DEFAULT && config.get("default").as_bool() == Some(true) {
            return Some(Selector::Default);
        }

        diags.add_error(
            "Missing parameter",
            format!(
                "Cannot find the requested {}: one of {} must be set.",
                K::DISPLAY_NAME,
                Self::selectors().join(", ")
            ),
        );
        None
    }

    async fn read_one(&self, ctx: &OpContext, environment_id: &str, id: &str, diags: &mut Diagnostics) -> Option<K::Dto> {
        let mut keys = Tree::new();
        keys.insert("environment_id", environment_id);
        keys.insert("id", id);
        let model = K::Model::from_tree(&keys, &AttributePath::empty(), diags);

        let api = self.provider.api();
        let current = &model;
        let opts = self
            .provider
            .call(format!("ReadOne{}", K::API_NAME))
            .custom_error(custom_error_resource_not_found_warning)
            .retryable(default_create_read_retryable);
        let (found, d) = parse_response(ctx, &opts, move || async move {
            let resp = K::read_call(api, current).await;
            check_environment_exists_on_permissions_error(api, environment_id, resp).await
        })
        .await;

        // A missing object reads as a lookup failure, not a removed resource.
        if found.is_none() && !d.has_error() {
            diags.add_error("Resource Failure", format!("{} with ID {id} not found.", K::DISPLAY_NAME));
            return None;
        }
        diags.append(d);
        found
    }

    async fn read_listed(
        &self,
        ctx: &OpContext,
        environment_id: &str,
        selector: &Selector,
        diags: &mut Diagnostics,
    ) -> Option<K::Dto> {
        let api = self.provider.api();
        let opts = self
            .provider
            .call(format!("ReadAll{}", K::LIST_API_NAME))
            .retryable(default_create_read_retryable);
        let matches = move |dto: &K::Dto| match selector {
            Selector::Name(name) => K::name_matches(K::name_of(dto), name),
            Selector::Default => K::is_default(dto),
            Selector::Id(_) => false,
        };
        let matches = &matches;

        let (found, d) = parse_response(ctx, &opts, move || async move {
            let resp = find_first(K::read_all(api, environment_id), matches).await;
            check_environment_exists_on_permissions_error(api, environment_id, resp).await
        })
        .await;
        diags.append(d);
        if diags.has_error() {
            return None;
        }

        match found.flatten() {
            Some(dto) => Some(dto),
            None => {
                let detail = match selector {
                    Selector::Name(name) => format!("{} with name {name} not found.", K::DISPLAY_NAME),
                    _ => format!("The default {} cannot be found.", K::DISPLAY_NAME.to_lowercase()),
                };
                diags.add_error("Resource Failure", detail);
                None
            }
        }
    }
}

#[async_trait]
impl<K: LookupKind> DataSource for LookupDataSource<K> {
    fn type_name(&self) -> &'static str {
        K::TYPE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    async fn read(&self, ctx: &OpContext, config: &Tree) -> OperationResult {
        let mut diags = Diagnostics::new();
        let Some(environment_id) = config.get("environment_id").as_str() else {
            diags.add_attribute_error(
                &AttributePath::root("environment_id"),
                "Missing Configuration for Required Attribute",
                "Must set a configuration value for the environment_id attribute.",
            );
            return OperationResult::unchanged(diags);
        };
        let Some(selector) = Self::selector(config, &mut diags) else {
            return OperationResult::unchanged(diags);
        };

        debug!("Looking up {} by {selector:?} in environment {environment_id}", K::DISPLAY_NAME);
        let found = match &selector {
            Selector::Id(id) => self.read_one(ctx, environment_id, id, &mut diags).await,
            other => self.read_listed(ctx, environment_id, other, &mut diags).await,
        };
        let Some(dto) = found else {
            return OperationResult::unchanged(diags);
        };

        let mut model = K::Model::from_tree(&Tree::new(), &AttributePath::empty(), &mut diags);
        K::flatten(&mut model, &dto, &mut diags);
        let mut tree = model.to_tree();
        tree.insert("environment_id", environment_id);
        let id = tree.get("id").clone();
        tree.insert(K::ID_SELECTOR, id);

        if ctx.is_cancelled() {
            diags.add_error(
                "Operation cancelled",
                format!("The {} lookup was cancelled before state could be written.", K::DISPLAY_NAME),
            );
            return OperationResult::unchanged(diags);
        }
        tree.check_types(&self.schema.attr_types(), &AttributePath::empty(), &mut diags);
        if diags.has_error() {
            return OperationResult::unchanged(diags);
        }
        OperationResult {
            state: StateChange::Set(tree),
            diagnostics: diags,
        }
    }
}

// ============================================================================
// Lookup kinds
// ============================================================================

impl LookupKind for RiskPredictor {
    const ID_SELECTOR: &'static str = "risk_predictor_id";
    const NAME_SELECTOR: &'static str = "name";
    const LIST_API_NAME: &'static str = "RiskPredictors";

    fn read_all<'a>(
        api: &'a ApiClient,
        environment_id: &'a str,
    ) -> impl Stream<Item = PageCursor<Self::Dto>> + Send + 'a {
        api.read_all_risk_predictors(environment_id)
    }

    fn name_of(dto: &RiskPredictorDto) -> &str {
        &dto.name
    }
}

impl LookupKind for VerifyVoicePhrase {
    const ID_SELECTOR: &'static str = "voice_phrase_id";
    const NAME_SELECTOR: &'static str = "display_name";
    const LIST_API_NAME: &'static str = "VoicePhrases";

    fn read_all<'a>(
        api: &'a ApiClient,
        environment_id: &'a str,
    ) -> impl Stream<Item = PageCursor<Self::Dto>> + Send + 'a {
        api.read_all_voice_phrases(environment_id)
    }

    fn name_of(dto: &VoicePhrase) -> &str {
        &dto.display_name
    }
}

impl LookupKind for VerifyPolicy {
    const ID_SELECTOR: &'static str = "verify_policy_id";
    const NAME_SELECTOR: &'static str = "name";
    const LIST_API_NAME: &'static str = "VerifyPolicies";
    const SELECTS_DEFAULT: bool = true;

    fn read_all<'a>(
        api: &'a ApiClient,
        environment_id: &'a str,
    ) -> impl Stream<Item = PageCursor<Self::Dto>> + Send + 'a {
        api.read_all_verify_policies(environment_id)
    }

    fn name_of(dto: &VerifyPolicyDto) -> &str {
        &dto.name
    }

    fn name_matches(listed: &str, wanted: &str) -> bool {
        listed.eq_ignore_ascii_case(wanted)
    }

    fn is_default(dto: &VerifyPolicyDto) -> bool {
        dto.default == Some(true)
    }
}
