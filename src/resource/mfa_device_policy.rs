//! `pingone_mfa_device_policy`: which MFA methods users may pair and use.

use async_trait::async_trait;

use crate::framework::planmodifier::{StaticDefault, UseStateForUnknown};
use crate::framework::validator::{LengthAtLeast, OneOf};
use crate::framework::{
    AttrValue, Attribute, AttributeMode, AttributePath, Description, Diagnostics, ImportComponent,
    Schema, Tree, Value, bool_ok_to_tf, resource_id_ok_to_tf, string_ok_to_tf, string_to_tf,
    tree_model,
};
use crate::pingone::mfa::{AuthenticationSettings, DeviceAuthenticationPolicy, MethodSettings};
use crate::pingone::{ApiClient, SdkResponse};

use super::{ResourceKind, environment_id_attribute, id_attribute, text};

const NEW_DEVICE_NOTIFICATIONS: [&str; 3] = ["NONE", "EMAIL_THEN_SMS", "SMS_THEN_EMAIL"];
const DEVICE_SELECTIONS: [&str; 3] = ["DEFAULT_TO_FIRST", "PROMPT_TO_SELECT", "ALWAYS_DISPLAY_DEVICES"];

tree_model! {
    /// Settings of one MFA method.
    pub struct MethodModel {
        enabled: value bool,
        pairing_disabled: value bool,
    }
}

tree_model! {
    /// Device selection settings.
    pub struct AuthenticationModel {
        device_selection: value String,
    }
}

tree_model! {
    /// State of a device authentication policy.
    pub struct DevicePolicyModel {
        id: value String,
        environment_id: value String,
        name: value String,
        new_device_notification: value String,
        authentication: object AuthenticationModel,
        sms: object MethodModel,
        voice: object MethodModel,
        email: object MethodModel,
        totp: object MethodModel,
        default: value bool,
    }
}

/// MFA device policy resource kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct MfaDevicePolicy;

fn method_schema(method: &str) -> Attribute {
    Attribute::single_nested(
        AttributeMode::Required,
        vec![
            (
                "enabled",
                Attribute::bool(AttributeMode::Required).with_description(&format!(
                    "A boolean that specifies whether the {method} method is enabled or disabled in the policy."
                )),
            ),
            (
                "pairing_disabled",
                Attribute::bool(AttributeMode::OptionalComputed)
                    .describe(
                        Description::from_markdown(format!(
                            "A boolean that, when set to `true`, prevents users from pairing new devices with the {method} method, though keeping it active in the policy for existing users."
                        ))
                        .default_value(false),
                    )
                    .with_plan_modifier(StaticDefault::bool(false)),
            ),
        ],
    )
    .with_description(&format!(
        "A single object that allows configuration of {method} device authentication policy settings."
    ))
}

fn default_authentication() -> AttrValue {
    let mut authentication = Tree::new();
    authentication.insert("device_selection", DEVICE_SELECTIONS[0]);
    AttrValue::Object(authentication)
}

fn expand_method(method: &Value<MethodModel>, path: &AttributePath, diags: &mut Diagnostics) -> Option<MethodSettings> {
    let method = method.expand_required(path, diags)?;
    let enabled = *method.enabled.expand_required(&path.at_name("enabled"), diags)?;
    Some(MethodSettings {
        enabled,
        pairing_disabled: method.pairing_disabled.expand_optional().copied(),
    })
}

fn flatten_method(method: &MethodSettings) -> Value<MethodModel> {
    Value::Known(MethodModel {
        enabled: Value::Known(method.enabled),
        pairing_disabled: Value::Known(method.pairing_disabled.unwrap_or(false)),
    })
}

#[async_trait]
impl ResourceKind for MfaDevicePolicy {
    type Model = DevicePolicyModel;
    type Dto = DeviceAuthenticationPolicy;

    const TYPE_NAME: &'static str = "pingone_mfa_device_policy";
    const DISPLAY_NAME: &'static str = "MFA device policy";
    const API_NAME: &'static str = "DeviceAuthenticationPolicy";

    fn schema() -> Schema {
        Schema::new("Resource to create and manage MFA device policies in a PingOne environment.")
            .with_attribute("id", id_attribute())
            .with_attribute("environment_id", environment_id_attribute("MFA device policy"))
            .with_attribute(
                "name",
                Attribute::string(AttributeMode::Required)
                    .with_description("A string that specifies the MFA policy's unique name within the environment.")
                    .with_validator(LengthAtLeast(1)),
            )
            .with_attribute(
                "new_device_notification",
                Attribute::string(AttributeMode::OptionalComputed)
                    .describe(
                        Description::from_markdown(
                            "A string that defines whether a user should be notified if a new authentication method has been added to their account.",
                        )
                        .allowed_values(&NEW_DEVICE_NOTIFICATIONS)
                        .default_value("NONE"),
                    )
                    .with_validator(OneOf::new(NEW_DEVICE_NOTIFICATIONS))
                    .with_plan_modifier(StaticDefault::string(NEW_DEVICE_NOTIFICATIONS[0])),
            )
            .with_attribute(
                "authentication",
                Attribute::single_nested(
                    AttributeMode::OptionalComputed,
                    vec![(
                        "device_selection",
                        Attribute::string(AttributeMode::OptionalComputed)
                            .describe(
                                Description::from_markdown(
                                    "A string that defines the device selection method.",
                                )
                                .allowed_values(&DEVICE_SELECTIONS)
                                .default_value(DEVICE_SELECTIONS[0]),
                            )
                            .with_validator(OneOf::new(DEVICE_SELECTIONS))
                            .with_plan_modifier(StaticDefault::string(DEVICE_SELECTIONS[0])),
                    )],
                )
                .with_description("A single object that allows configuration of authentication settings in the device policy.")
                .with_plan_modifier(StaticDefault(default_authentication())),
            )
            .with_attribute("sms", method_schema("SMS OTP"))
            .with_attribute("voice", method_schema("voice OTP"))
            .with_attribute("email", method_schema("email OTP"))
            .with_attribute("totp", method_schema("TOTP"))
            .with_attribute(
                "default",
                Attribute::bool(AttributeMode::Computed)
                    .with_description("A boolean that specifies whether this is the environment's default MFA device policy.")
                    .with_plan_modifier(UseStateForUnknown),
            )
    }

    fn import_components() -> Vec<ImportComponent> {
        vec![
            ImportComponent::resource_id("environment_id"),
            ImportComponent::primary("device_policy_id"),
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
        let sms = expand_method(&model.sms, &AttributePath::root("sms"), diags);
        let voice = expand_method(&model.voice, &AttributePath::root("voice"), diags);
        let email = expand_method(&model.email, &AttributePath::root("email"), diags);
        let totp = expand_method(&model.totp, &AttributePath::root("totp"), diags);

        let authentication = model
            .authentication
            .expand_optional()
            .and_then(|a| a.device_selection.expand_optional())
            .map(|selection| AuthenticationSettings {
                device_selection: selection.clone(),
            });

        Some(DeviceAuthenticationPolicy {
            name: name?.clone(),
            new_device_notification: model.new_device_notification.expand_optional().cloned(),
            authentication,
            sms: sms?,
            voice: voice?,
            email: email?,
            totp: totp?,
            ..DeviceAuthenticationPolicy::default()
        })
    }

    fn flatten(model: &mut Self::Model, dto: &Self::Dto, _diags: &mut Diagnostics) {
        model.id = resource_id_ok_to_tf(dto.id.as_deref());
        model.name = string_to_tf(&dto.name);
        model.new_device_notification = string_ok_to_tf(dto.new_device_notification.as_deref());
        model.authentication = dto.authentication.as_ref().map_or(Value::Null, |a| {
            Value::Known(AuthenticationModel {
                device_selection: string_to_tf(&a.device_selection),
            })
        });
        model.sms = flatten_method(&dto.sms);
        model.voice = flatten_method(&dto.voice);
        model.email = flatten_method(&dto.email);
        model.totp = flatten_method(&dto.totp);
        model.default = bool_ok_to_tf(dto.default);
    }

    async fn create_call(api: &ApiClient, model: &Self::Model, dto: &Self::Dto) -> SdkResponse<Self::Dto> {
        api.create_device_authentication_policy(text(&model.environment_id), dto)
            .await
    }

    async fn read_call(api: &ApiClient, model: &Self::Model) -> SdkResponse<Self::Dto> {
        api.read_one_device_authentication_policy(text(&model.environment_id), text(&model.id))
            .await
    }

    async fn update_call(api: &ApiClient, model: &Self::Model, dto: &Self::Dto) -> SdkResponse<Self::Dto> {
        api.update_device_authentication_policy(text(&model.environment_id), text(&model.id), dto)
            .await
    }

    async fn delete_call(api: &ApiClient, model: &Self::Model) -> SdkResponse<()> {
        api.delete_device_authentication_policy(text(&model.environment_id), text(&model.id))
            .await
    }
}
