//! `pingone_verify_policy`: identity verification requirements.

use async_trait::async_trait;

use crate::framework::planmodifier::UseStateForUnknown;
use crate::framework::validator::{LengthAtLeast, OneOf};
use crate::framework::{
    Attribute, AttributeMode, AttributePath, Description, Diagnostics, ImportComponent, Schema,
    Value, bool_ok_to_tf, resource_id_ok_to_tf, string_ok_to_tf, string_to_tf, time_ok_to_tf,
    tree_model,
};
use crate::pingone::verify::{ThresholdSetting, VerifyPolicy as VerifyPolicyDto, VerifySetting};
use crate::pingone::{ApiClient, SdkResponse};

use super::verify_voice_phrase::timestamp_attribute;
use super::{ResourceKind, environment_id_attribute, id_attribute, text};

pub(crate) const VERIFY_LEVELS: [&str; 3] = ["DISABLED", "OPTIONAL", "REQUIRED"];
pub(crate) const THRESHOLDS: [&str; 3] = ["LOW", "MEDIUM", "HIGH"];

tree_model! {
    /// Government ID requirement.
    pub struct GovernmentIdModel {
        verify: value String,
    }
}

tree_model! {
    /// Requirement with a match threshold.
    pub struct ThresholdModel {
        verify: value String,
        threshold: value String,
    }
}

tree_model! {
    /// State of a verify policy.
    pub struct VerifyPolicyModel {
        id: value String,
        environment_id: value String,
        name: value String,
        description: value String,
        default: value bool,
        government_id: object GovernmentIdModel,
        facial_comparison: object ThresholdModel,
        liveness: object ThresholdModel,
        created_at: value String,
        updated_at: value String,
    }
}

/// Verify policy resource kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyPolicy;

fn verify_attribute(markdown: &str) -> Attribute {
    Attribute::string(AttributeMode::Required)
        .describe(Description::from_markdown(markdown).allowed_values(&VERIFY_LEVELS))
        .with_validator(OneOf::new(VERIFY_LEVELS))
}

fn threshold_block(subject: &str) -> Attribute {
    Attribute::single_nested(
        AttributeMode::OptionalComputed,
        vec![
            (
                "verify",
                verify_attribute(&format!("Controls {subject} requirements.")),
            ),
            (
                "threshold",
                Attribute::string(AttributeMode::Optional)
                    .describe(
                        Description::from_markdown(format!(
                            "Threshold for successful {subject}. Higher thresholds require a closer match."
                        ))
                        .allowed_values(&THRESHOLDS),
                    )
                    .with_validator(OneOf::new(THRESHOLDS)),
            ),
        ],
    )
    .with_description(&format!("Defines the verification requirements for {subject}."))
    .with_plan_modifier(UseStateForUnknown)
}

fn expand_threshold(setting: &Value<ThresholdModel>) -> Option<ThresholdSetting> {
    let setting = setting.expand_optional()?;
    Some(ThresholdSetting {
        verify: setting.verify.expand_optional()?.clone(),
        threshold: setting.threshold.expand_optional().cloned(),
    })
}

fn flatten_threshold(setting: Option<&ThresholdSetting>) -> Value<ThresholdModel> {
    setting.map_or(Value::Null, |s| {
        Value::Known(ThresholdModel {
            verify: string_to_tf(&s.verify),
            threshold: string_ok_to_tf(s.threshold.as_deref()),
        })
    })
}

#[async_trait]
impl ResourceKind for VerifyPolicy {
    type Model = VerifyPolicyModel;
    type Dto = VerifyPolicyDto;

    const TYPE_NAME: &'static str = "pingone_verify_policy";
    const DISPLAY_NAME: &'static str = "Verify policy";
    const API_NAME: &'static str = "VerifyPolicy";

    fn schema() -> Schema {
        Schema::new("Resource to configure the requirements to verify a user, including the parameters for verification.")
            .with_attribute("id", id_attribute())
            .with_attribute("environment_id", environment_id_attribute("verify policy"))
            .with_attribute(
                "name",
                Attribute::string(AttributeMode::Required)
                    .with_description("Name of the verification policy displayed in PingOne Admin UI.")
                    .with_validator(LengthAtLeast(1)),
            )
            .with_attribute(
                "description",
                Attribute::string(AttributeMode::Optional)
                    .with_description("Description of the verification policy displayed in PingOne Admin UI, 1-1024 characters."),
            )
            .with_attribute(
                "default",
                Attribute::bool(AttributeMode::Computed)
                    .with_description("Required as `true` to set this verify policy as the default policy for the environment; otherwise optional and defaults to `false`.")
                    .with_plan_modifier(UseStateForUnknown),
            )
            .with_attribute(
                "government_id",
                Attribute::single_nested(
                    AttributeMode::OptionalComputed,
                    vec![(
                        "verify",
                        verify_attribute("Controls Government ID verification requirements."),
                    )],
                )
                .with_description("Defines the verification requirements for a government-issued identity document.")
                .with_plan_modifier(UseStateForUnknown),
            )
            .with_attribute("facial_comparison", threshold_block("facial comparison"))
            .with_attribute("liveness", threshold_block("liveness"))
            .with_attribute("created_at", timestamp_attribute("Date and time the verify policy was created."))
            .with_attribute("updated_at", timestamp_attribute("Date and time the verify policy was updated. Can be null."))
    }

    fn import_components() -> Vec<ImportComponent> {
        vec![
            ImportComponent::resource_id("environment_id"),
            ImportComponent::primary("verify_policy_id"),
        ]
    }

    fn environment_id(model: &Self::Model) -> &Value<String> {
        &model.environment_id
    }

    fn id(model: &Self::Model) -> &Value<String> {
        &model.id
    }

    fn expand(model: &Self::Model, diags: &mut Diagnostics) -> Option<Self::Dto> {
        let name = model.name.expand_required(&AttributePath::root("name"), diags)?;

        let government_id = model
            .government_id
            .expand_optional()
            .and_then(|g| g.verify.expand_optional())
            .map(|verify| VerifySetting { verify: verify.clone() });

        Some(VerifyPolicyDto {
            name: name.clone(),
            description: model.description.expand_optional().cloned(),
            government_id,
            facial_comparison: expand_threshold(&model.facial_comparison),
            liveness: expand_threshold(&model.liveness),
            ..VerifyPolicyDto::default()
        })
    }

    fn flatten(model: &mut Self::Model, dto: &Self::Dto, _diags: &mut Diagnostics) {
        model.id = resource_id_ok_to_tf(dto.id.as_deref());
        model.name = string_to_tf(&dto.name);
        model.description = string_ok_to_tf(dto.description.as_deref());
        model.default = bool_ok_to_tf(dto.default);
        model.government_id = dto.government_id.as_ref().map_or(Value::Null, |g| {
            Value::Known(GovernmentIdModel {
                verify: string_to_tf(&g.verify),
            })
        });
        model.facial_comparison = flatten_threshold(dto.facial_comparison.as_ref());
        model.liveness = flatten_threshold(dto.liveness.as_ref());
        model.created_at = time_ok_to_tf(dto.created_at.as_ref());
        model.updated_at = time_ok_to_tf(dto.updated_at.as_ref());
    }

    async fn create_call(api: &ApiClient, model: &Self::Model, dto: &Self::Dto) -> SdkResponse<Self::Dto> {
        api.create_verify_policy(text(&model.environment_id), dto).await
    }

    async fn read_call(api: &ApiClient, model: &Self::Model) -> SdkResponse<Self::Dto> {
        api.read_one_verify_policy(text(&model.environment_id), text(&model.id))
            .await
    }

    async fn update_call(api: &ApiClient, model: &Self::Model, dto: &Self::Dto) -> SdkResponse<Self::Dto> {
        api.update_verify_policy(text(&model.environment_id), text(&model.id), dto)
            .await
    }

    async fn delete_call(api: &ApiClient, model: &Self::Model) -> SdkResponse<()> {
        api.delete_verify_policy(text(&model.environment_id), text(&model.id))
            .await
    }
}
