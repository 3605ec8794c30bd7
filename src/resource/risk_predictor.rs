//! `pingone_risk_predictor`: a risk predictor evaluated by risk policies.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use crate::framework::planmodifier::{RequiresReplace, UseStateForUnknown, unmodifiable_data_loss_protection};
use crate::framework::validator::{LengthAtLeast, LengthAtMost, OneOf, RegexMatches};
use crate::framework::{
    Attribute, AttributeMode, AttributePath, Description, Diagnostics, ImportComponent, Schema,
    Value, bool_ok_to_tf, enum_ok_to_tf, resource_id_ok_to_tf, string_ok_to_tf, string_to_tf,
    tree_model,
};
use crate::pingone::risk::{LevelResult, PredictorDefault, PredictorType, RiskLevel, RiskPredictor as RiskPredictorDto};
use crate::pingone::{ApiClient, SdkResponse};
use crate::sdk::{CustomError, custom_error_invalid_value};

use super::{ResourceKind, environment_id_attribute, id_attribute, text};

#[allow(clippy::expect_used)]
static COMPACT_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]+$").expect("valid compact name regex"));

tree_model! {
    /// State of a risk predictor.
    pub struct RiskPredictorModel {
        id: value String,
        environment_id: value String,
        name: value String,
        compact_name: value String,
        predictor_type as "type": value String,
        description: value String,
        default_decision_value: value String,
        licensed: value bool,
        deletable: value bool,
    }
}

/// Risk predictor resource kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskPredictor;

fn computed_flag(markdown: &str) -> Attribute {
    Attribute::bool(AttributeMode::Computed)
        .with_description(markdown)
        .with_plan_modifier(UseStateForUnknown)
}

#[async_trait]
impl ResourceKind for RiskPredictor {
    type Model = RiskPredictorModel;
    type Dto = RiskPredictorDto;

    const TYPE_NAME: &'static str = "pingone_risk_predictor";
    const DISPLAY_NAME: &'static str = "Risk predictor";
    const API_NAME: &'static str = "RiskPredictor";

    fn schema() -> Schema {
        Schema::new("Resource to create and manage Risk predictors in a PingOne environment.")
            .with_attribute("id", id_attribute())
            .with_attribute("environment_id", environment_id_attribute("risk predictor"))
            .with_attribute(
                "name",
                Attribute::string(AttributeMode::Required)
                    .with_description("A string that specifies the unique name of the risk predictor.")
                    .with_validator(LengthAtLeast(1)),
            )
            .with_attribute(
                "compact_name",
                Attribute::string(AttributeMode::Required)
                    .describe(
                        Description::from_markdown(
                            "A string that specifies the unique name for the predictor for use in risk evaluation request/response payloads.  The value must be alpha-numeric, with no special characters or spaces.",
                        )
                        .data_loss_protection(),
                    )
                    .with_validator(RegexMatches::new(
                        COMPACT_NAME_REGEX.clone(),
                        "The `compact_name` must contain only alphanumeric characters.",
                    ))
                    .with_plan_modifier(unmodifiable_data_loss_protection()),
            )
            .with_attribute(
                "type",
                Attribute::string(AttributeMode::Required)
                    .describe(
                        Description::from_markdown("A string that specifies the type of the risk predictor.")
                            .allowed_values(&PredictorType::ALL)
                            .requires_replace(),
                    )
                    .with_validator(OneOf::new(PredictorType::ALL))
                    .with_plan_modifier(RequiresReplace),
            )
            .with_attribute(
                "description",
                Attribute::string(AttributeMode::Optional)
                    .with_description("A string that specifies the description of the risk predictor. Maximum length is 1024 characters.")
                    .with_validator(LengthAtMost(1024)),
            )
            .with_attribute(
                "default_decision_value",
                Attribute::string(AttributeMode::Optional)
                    .describe(
                        Description::from_markdown(
                            "The default risk level returned when the predictor cannot determine a result.",
                        )
                        .allowed_values(&RiskLevel::ALL),
                    )
                    .with_validator(OneOf::new(RiskLevel::ALL)),
            )
            .with_attribute(
                "licensed",
                computed_flag("A boolean that indicates whether the environment is licensed to use this predictor."),
            )
            .with_attribute(
                "deletable",
                computed_flag("A boolean that indicates the PingOne Risk predictor can be deleted or not."),
            )
    }

    fn import_components() -> Vec<ImportComponent> {
        vec![
            ImportComponent::resource_id("environment_id"),
            ImportComponent::primary("risk_predictor_id"),
        ]
    }

    fn environment_id(model: &Self::Model) -> &Value<String> {
        &model.environment_id
    }

    fn id(model: &Self::Model) -> &Value<String> {
        &model.id
    }

    fn expand(model: &Self::Model, diags: &mut Diagnostics) -> Option<Self::Dto> {
        let name = model.name.expand_required(&AttributePath::root("name"), diags);
        let compact_name = model
            .compact_name
            .expand_required(&AttributePath::root("compact_name"), diags);
        let type_path = AttributePath::root("type");
        let predictor_type = model
            .predictor_type
            .expand_required(&type_path, diags)
            .and_then(|t| {
                let parsed = PredictorType::parse(t);
                if parsed.is_none() {
                    diags.add_attribute_error(&type_path, "Invalid predictor type", format!("Unsupported risk predictor type \"{t}\"."));
                }
                parsed
            });

        let default = model
            .default_decision_value
            .expand_optional()
            .and_then(|level| RiskLevel::parse(level))
            .map(|level| PredictorDefault {
                result: LevelResult::value(level),
            });

        Some(RiskPredictorDto {
            id: None,
            name: name?.clone(),
            compact_name: compact_name?.clone(),
            predictor_type: predictor_type?,
            description: model.description.expand_optional().cloned(),
            default,
            licensed: None,
            deletable: None,
            created_at: None,
        })
    }

    fn flatten(model: &mut Self::Model, dto: &Self::Dto, _diags: &mut Diagnostics) {
        model.id = resource_id_ok_to_tf(dto.id.as_deref());
        model.name = string_to_tf(&dto.name);
        model.compact_name = string_to_tf(&dto.compact_name);
        model.predictor_type = enum_ok_to_tf(Some(&dto.predictor_type));
        model.description = string_ok_to_tf(dto.description.as_deref());
        model.default_decision_value = enum_ok_to_tf(dto.default.as_ref().map(|d| &d.result.level));
        model.licensed = bool_ok_to_tf(dto.licensed);
        model.deletable = bool_ok_to_tf(dto.deletable);
    }

    fn write_custom_error() -> CustomError {
        custom_error_invalid_value
    }

    async fn create_call(api: &ApiClient, model: &Self::Model, dto: &Self::Dto) -> SdkResponse<Self::Dto> {
        api.create_risk_predictor(text(&model.environment_id), dto).await
    }

    async fn read_call(api: &ApiClient, model: &Self::Model) -> SdkResponse<Self::Dto> {
        api.read_one_risk_predictor(text(&model.environment_id), text(&model.id))
            .await
    }

    async fn update_call(api: &ApiClient, model: &Self::Model, dto: &Self::Dto) -> SdkResponse<Self::Dto> {
        api.update_risk_predictor(text(&model.environment_id), text(&model.id), dto)
            .await
    }

    async fn delete_call(api: &ApiClient, model: &Self::Model) -> SdkResponse<()> {
        api.delete_risk_predictor(text(&model.environment_id), text(&model.id))
            .await
    }
}
