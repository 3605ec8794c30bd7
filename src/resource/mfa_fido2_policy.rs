//! `pingone_mfa_fido2_policy`: passkey and security key registration rules.

use async_trait::async_trait;

use crate::framework::planmodifier::{RequiresReplaceIfNowNull, UseStateForUnknown};
use crate::framework::validator::{LengthAtLeast, OneOf};
use crate::framework::{
    Attribute, AttributeMode, AttributePath, Description, Diagnostics, ImportComponent, Schema,
    Value, bool_ok_to_tf, resource_id_ok_to_tf, string_ok_to_tf, string_to_tf, tree_model,
};
use crate::pingone::mfa::{Fido2Policy, UserVerification};
use crate::pingone::{ApiClient, SdkResponse};

use super::{ResourceKind, environment_id_attribute, id_attribute, text};

const ATTESTATION_REQUIREMENTS: [&str; 4] = ["NONE", "AUDIT_ONLY", "GLOBAL", "SPECIFIC"];
const AUTHENTICATOR_ATTACHMENTS: [&str; 3] = ["PLATFORM", "CROSS_PLATFORM", "BOTH"];
const PREFERENCES: [&str; 3] = ["DISCOURAGED", "PREFERRED", "REQUIRED"];

tree_model! {
    /// User verification requirement.
    pub struct UserVerificationModel {
        option: value String,
    }
}

tree_model! {
    /// State of a FIDO2 policy.
    pub struct Fido2PolicyModel {
        id: value String,
        environment_id: value String,
        name: value String,
        description: value String,
        attestation_requirements: value String,
        authenticator_attachment: value String,
        discoverable_credentials: value String,
        relying_party_id: value String,
        user_verification: object UserVerificationModel,
        default: value bool,
    }
}

/// FIDO2 policy resource kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct MfaFido2Policy;

fn enum_attribute(markdown: &str, values: &[&'static str]) -> Attribute {
    Attribute::string(AttributeMode::Required)
        .describe(Description::from_markdown(markdown).allowed_values(values))
        .with_validator(OneOf::new(values.iter().copied()))
}

#[async_trait]
impl ResourceKind for MfaFido2Policy {
    type Model = Fido2PolicyModel;
    type Dto = Fido2Policy;

    const TYPE_NAME: &'static str = "pingone_mfa_fido2_policy";
    const DISPLAY_NAME: &'static str = "FIDO2 policy";
    const API_NAME: &'static str = "Fido2Policy";

    fn schema() -> Schema {
        Schema::new("Resource to create and manage FIDO2 policies in PingOne.")
            .with_attribute("id", id_attribute())
            .with_attribute("environment_id", environment_id_attribute("FIDO2 policy"))
            .with_attribute(
                "name",
                Attribute::string(AttributeMode::Required)
                    .with_description("A string that specifies the name of the FIDO2 policy.")
                    .with_validator(LengthAtLeast(1)),
            )
            .with_attribute(
                "description",
                Attribute::string(AttributeMode::Optional)
                    .with_description("A string that specifies a description of the FIDO2 policy.")
                    .with_validator(LengthAtLeast(1)),
            )
            .with_attribute(
                "attestation_requirements",
                enum_attribute(
                    "A string that specifies the attestation requirements of FIDO2 devices that can be registered.",
                    &ATTESTATION_REQUIREMENTS,
                ),
            )
            .with_attribute(
                "authenticator_attachment",
                enum_attribute(
                    "A string that specifies the authenticator attachment requirement.",
                    &AUTHENTICATOR_ATTACHMENTS,
                ),
            )
            .with_attribute(
                "discoverable_credentials",
                enum_attribute(
                    "A string that specifies whether discoverable credentials are required, preferred or discouraged.",
                    &PREFERENCES,
                ),
            )
            .with_attribute(
                "relying_party_id",
                Attribute::string(AttributeMode::Optional)
                    .describe(
                        Description::from_markdown(
                            "A string that specifies the relying party ID of the policy.  When not set, the environment's domain is used.",
                        )
                        .append("Removing the value forces the policy to be replaced."),
                    )
                    .with_validator(LengthAtLeast(1))
                    .with_plan_modifier(RequiresReplaceIfNowNull),
            )
            .with_attribute(
                "user_verification",
                Attribute::single_nested(
                    AttributeMode::Required,
                    vec![(
                        "option",
                        enum_attribute(
                            "A string that specifies whether user verification is required, preferred or discouraged.",
                            &PREFERENCES,
                        ),
                    )],
                )
                .with_description("A single object that specifies the user verification settings."),
            )
            .with_attribute(
                "default",
                Attribute::bool(AttributeMode::Computed)
                    .with_description("A boolean that specifies whether this is the environment's default FIDO2 policy.")
                    .with_plan_modifier(UseStateForUnknown),
            )
    }

    fn import_components() -> Vec<ImportComponent> {
        vec![
            ImportComponent::resource_id("environment_id"),
            ImportComponent::primary("fido2_policy_id"),
        ]
    }

    fn environment_id(model: &Self::Model) -> &Value<String> {
        &model.environment_id
    }

    fn id(model: &Self::Model) -> &Value<String> {
        &model.id
    }

    fn expand(model: &Self::Model, diags: &mut Diagnostics) -> Option<Self::Dto> {
        let required = |value: &Value<String>, name: &str, diags: &mut Diagnostics| {
            value.expand_required(&AttributePath::root(name), diags).cloned()
        };
        let name = required(&model.name, "name", diags);
        let attestation_requirements = required(&model.attestation_requirements, "attestation_requirements", diags);
        let authenticator_attachment = required(&model.authenticator_attachment, "authenticator_attachment", diags);
        let discoverable_credentials = required(&model.discoverable_credentials, "discoverable_credentials", diags);

        let user_verification = model
            .user_verification
            .expand_optional()
            .and_then(|uv| uv.option.expand_optional())
            .map(|option| UserVerification { option: option.clone() });

        Some(Fido2Policy {
            name: name?,
            description: model.description.expand_optional().cloned(),
            attestation_requirements: attestation_requirements?,
            authenticator_attachment: authenticator_attachment?,
            discoverable_credentials: discoverable_credentials?,
            relying_party_id: model.relying_party_id.expand_optional().cloned(),
            user_verification,
            ..Fido2Policy::default()
        })
    }

    fn flatten(model: &mut Self::Model, dto: &Self::Dto, _diags: &mut Diagnostics) {
        model.id = resource_id_ok_to_tf(dto.id.as_deref());
        model.name = string_to_tf(&dto.name);
        model.description = string_ok_to_tf(dto.description.as_deref());
        model.attestation_requirements = string_to_tf(&dto.attestation_requirements);
        model.authenticator_attachment = string_to_tf(&dto.authenticator_attachment);
        model.discoverable_credentials = string_to_tf(&dto.discoverable_credentials);
        model.relying_party_id = string_ok_to_tf(dto.relying_party_id.as_deref());
        model.user_verification = dto.user_verification.as_ref().map_or(Value::Null, |uv| {
            Value::Known(UserVerificationModel {
                option: string_to_tf(&uv.option),
            })
        });
        model.default = bool_ok_to_tf(dto.default);
    }

    async fn create_call(api: &ApiClient, model: &Self::Model, dto: &Self::Dto) -> SdkResponse<Self::Dto> {
        api.create_fido2_policy(text(&model.environment_id), dto).await
    }

    async fn read_call(api: &ApiClient, model: &Self::Model) -> SdkResponse<Self::Dto> {
        api.read_one_fido2_policy(text(&model.environment_id), text(&model.id))
            .await
    }

    async fn update_call(api: &ApiClient, model: &Self::Model, dto: &Self::Dto) -> SdkResponse<Self::Dto> {
        api.update_fido2_policy(text(&model.environment_id), text(&model.id), dto)
            .await
    }

    async fn delete_call(api: &ApiClient, model: &Self::Model) -> SdkResponse<()> {
        api.delete_fido2_policy(text(&model.environment_id), text(&model.id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::{AttrValue, PlanModifierRequest, planmodifier::run_chain};
    use crate::resource::testing::{ENV, ID, provider, stored, tree};
    use crate::resource::{Dispatcher, Resource, StateChange};
    use crate::sdk::OpContext;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> serde_json::Value {
        json!({
            "environment_id": ENV,
            "name": "Passkeys",
            "attestation_requirements": "NONE",
            "authenticator_attachment": "BOTH",
            "discoverable_credentials": "REQUIRED",
            "relying_party_id": "auth.example.com",
            "user_verification": {"option": "REQUIRED"}
        })
    }

    #[test]
    fn test_clearing_relying_party_forces_replacement() {
        let schema = MfaFido2Policy::schema();
        let state = tree(&schema, config());
        let mut cleared = config();
        cleared.as_object_mut().expect("object").remove("relying_party_id");
        let config = tree(&schema, cleared);

        let path = AttributePath::root("relying_party_id");
        let attribute = schema.attribute_at(&path).expect("relying_party_id");
        let state_value = state.value_at(&path);
        let request = PlanModifierRequest {
            path: &path,
            config: &config,
            state: Some(&state),
            plan: Some(&config),
            config_value: &AttrValue::Null,
            state_value: &state_value,
            plan_value: &AttrValue::Null,
        };
        assert!(run_chain(&attribute.plan_modifiers, &request).requires_replace);
    }

    #[tokio::test]
    async fn test_update_sends_full_body() {
        let server = MockServer::start().await;
        let body = json!({
            "name": "Passkeys",
            "attestationRequirements": "NONE",
            "authenticatorAttachment": "BOTH",
            "discoverableCredentials": "REQUIRED",
            "relyingPartyId": "auth.example.com",
            "userVerification": {"option": "REQUIRED"}
        });
        let mut response = body.clone();
        response["id"] = json!(ID);
        response["default"] = json!(false);
        Mock::given(method("PUT"))
            .and(path(format!("/environments/{ENV}/fido2Policies/{ID}")))
            .and(body_json(&body))
            .respond_with(ResponseTemplate::new(200).set_body_json(response))
            .expect(1)
            .mount(&server)
            .await;

        let resource = Dispatcher::<MfaFido2Policy>::new(provider(&server));
        let mut prior = tree(resource.schema(), config());
        prior.insert("id", ID);
        prior.insert("default", false);

        let result = resource.update(&OpContext::new(), &prior, &prior).await;
        assert!(matches!(result.state, StateChange::Set(_)));
        assert_eq!(stored(&result).get("relying_party_id").as_str(), Some("auth.example.com"));
    }
}
