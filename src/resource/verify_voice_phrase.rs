//! `pingone_verify_voice_phrase`: a named voice phrase used for voice verification.

use async_trait::async_trait;

use crate::framework::planmodifier::UseStateForUnknown;
use crate::framework::validator::LengthAtLeast;
use crate::framework::{
    Attribute, AttributeMode, AttributePath, Diagnostics, ImportComponent, Schema, Value,
    resource_id_ok_to_tf, string_to_tf, time_ok_to_tf, tree_model,
};
use crate::pingone::verify::VoicePhrase;
use crate::pingone::{ApiClient, SdkResponse};

use super::{ResourceKind, environment_id_attribute, id_attribute, text};

tree_model! {
    /// State of a voice phrase.
    pub struct VoicePhraseModel {
        id: value String,
        environment_id: value String,
        display_name: value String,
        created_at: value String,
        updated_at: value String,
    }
}

/// Voice phrase resource kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyVoicePhrase;

/// Computed timestamp carried across plans.
pub(crate) fn timestamp_attribute(markdown: &str) -> Attribute {
    Attribute::string(AttributeMode::Computed)
        .with_description(markdown)
        .with_plan_modifier(UseStateForUnknown)
}

#[async_trait]
impl ResourceKind for VerifyVoicePhrase {
    type Model = VoicePhraseModel;
    type Dto = VoicePhrase;

    const TYPE_NAME: &'static str = "pingone_verify_voice_phrase";
    const DISPLAY_NAME: &'static str = "Voice phrase";
    const API_NAME: &'static str = "VoicePhrase";

    fn schema() -> Schema {
        Schema::new("Resource to create and manage a voice phrase in a PingOne environment.")
            .with_attribute("id", id_attribute())
            .with_attribute("environment_id", environment_id_attribute("voice phrase"))
            .with_attribute(
                "display_name",
                Attribute::string(AttributeMode::Required)
                    .with_description("The name displayed for the phrase in the PingOne admin console.")
                    .with_validator(LengthAtLeast(1)),
            )
            .with_attribute(
                "created_at",
                timestamp_attribute("The date and time the voice phrase was created."),
            )
            .with_attribute(
                "updated_at",
                timestamp_attribute("The date and time the voice phrase was updated. Can be null."),
            )
    }

    fn import_components() -> Vec<ImportComponent> {
        vec![
            ImportComponent::resource_id("environment_id"),
            ImportComponent::primary("voice_phrase_id"),
        ]
    }

    fn environment_id(model: &Self::Model) -> &Value<String> {
        &model.environment_id
    }

    fn id(model: &Self::Model) -> &Value<String> {
        &model.id
    }

    fn expand(model: &Self::Model, diags: &mut Diagnostics) -> Option<Self::Dto> {
        let display_name = model
            .display_name
            .expand_required(&AttributePath::root("display_name"), diags)?;

        Some(VoicePhrase {
            display_name: display_name.clone(),
            ..VoicePhrase::default()
        })
    }

    fn flatten(model: &mut Self::Model, dto: &Self::Dto, _diags: &mut Diagnostics) {
        model.id = resource_id_ok_to_tf(dto.id.as_deref());
        model.display_name = string_to_tf(&dto.display_name);
        model.created_at = time_ok_to_tf(dto.created_at.as_ref());
        model.updated_at = time_ok_to_tf(dto.updated_at.as_ref());
    }

    async fn create_call(api: &ApiClient, model: &Self::Model, dto: &Self::Dto) -> SdkResponse<Self::Dto> {
        api.create_voice_phrase(text(&model.environment_id), dto).await
    }

    async fn read_call(api: &ApiClient, model: &Self::Model) -> SdkResponse<Self::Dto> {
        api.read_one_voice_phrase(text(&model.environment_id), text(&model.id))
            .await
    }

    async fn update_call(api: &ApiClient, model: &Self::Model, dto: &Self::Dto) -> SdkResponse<Self::Dto> {
        api.update_voice_phrase(text(&model.environment_id), text(&model.id), dto)
            .await
    }

    async fn delete_call(api: &ApiClient, model: &Self::Model) -> SdkResponse<()> {
        api.delete_voice_phrase(text(&model.environment_id), text(&model.id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::AttrValue;
    use crate::resource::testing::{ENV, ID, provider, stored, tree};
    use crate::resource::{Dispatcher, Resource, StateChange};
    use crate::sdk::OpContext;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn state(schema: &Schema) -> crate::framework::Tree {
        tree(
            schema,
            json!({
                "id": ID,
                "environment_id": ENV,
                "display_name": "Phrase",
                "created_at": "2024-01-02T03:04:05Z",
            }),
        )
    }

    #[tokio::test]
    async fn test_create_stores_computed_attributes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/environments/{ENV}/voicePhrases")))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": ID,
                "displayName": "Phrase",
                "createdAt": "2024-01-02T03:04:05Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resource = Dispatcher::<VerifyVoicePhrase>::new(provider(&server));
        let mut plan = tree(
            resource.schema(),
            json!({"environment_id": ENV, "display_name": "Phrase"}),
        );
        plan.insert("id", AttrValue::Unknown);
        plan.insert("created_at", AttrValue::Unknown);
        plan.insert("updated_at", AttrValue::Unknown);

        let result = resource.create(&OpContext::new(), &plan).await;
        let stored = stored(&result);
        assert_eq!(stored.get("id").as_str(), Some(ID));
        assert_eq!(stored.get("created_at").as_str(), Some("2024-01-02T03:04:05Z"));
        assert!(stored.get("updated_at").is_null());
        assert!(result.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_read_on_deleted_environment_removes_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/environments/{ENV}/voicePhrases/{ID}")))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "id": "e1", "code": "ACCESS_FAILED", "message": "The request could not be completed. You do not have access to this resource."
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/environments/{ENV}")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "id": "e2", "code": "NOT_FOUND", "message": "Unable to find environment"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resource = Dispatcher::<VerifyVoicePhrase>::new(provider(&server));
        let result = resource.read(&OpContext::new(), &state(resource.schema())).await;

        assert_eq!(result.state, StateChange::Remove);
        assert_eq!(result.diagnostics.warning_count(), 1);
        assert!(!result.has_error());
    }

    #[tokio::test]
    async fn test_read_is_stable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/environments/{ENV}/voicePhrases/{ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": ID,
                "displayName": "Phrase",
                "createdAt": "2024-01-02T03:04:05Z",
                "updatedAt": "2024-02-02T03:04:05Z"
            })))
            .mount(&server)
            .await;

        let resource = Dispatcher::<VerifyVoicePhrase>::new(provider(&server));
        let first = resource.read(&OpContext::new(), &state(resource.schema())).await;
        let second = resource.read(&OpContext::new(), stored(&first)).await;
        assert_eq!(
            serde_json::to_string(&stored(&first).to_json()).expect("json"),
            serde_json::to_string(&stored(&second).to_json()).expect("json")
        );
    }

    #[tokio::test]
    async fn test_delete_race_is_warning() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("/environments/{ENV}/voicePhrases/{ID}")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "id": "e3", "code": "NOT_FOUND", "message": "Unable to find voice phrase"
            })))
            .mount(&server)
            .await;

        let resource = Dispatcher::<VerifyVoicePhrase>::new(provider(&server));
        let result = resource.delete(&OpContext::new(), &state(resource.schema())).await;

        assert_eq!(result.state, StateChange::Remove);
        assert!(!result.has_error());
        let warning = result.diagnostics.warnings().next().expect("warning");
        assert_eq!(warning.summary, "Requested resource not found");
    }

    #[tokio::test]
    async fn test_update_not_found_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "id": "e4", "code": "NOT_FOUND", "message": "Unable to find voice phrase"
            })))
            .mount(&server)
            .await;

        let resource = Dispatcher::<VerifyVoicePhrase>::new(provider(&server));
        let prior = state(resource.schema());
        let result = resource.update(&OpContext::new(), &prior, &prior).await;

        assert_eq!(result.state, StateChange::Unchanged);
        assert_eq!(result.diagnostics.error_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_create_writes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": ID, "displayName": "Phrase"})))
            .mount(&server)
            .await;

        let resource = Dispatcher::<VerifyVoicePhrase>::new(provider(&server));
        let plan = tree(
            resource.schema(),
            json!({"environment_id": ENV, "display_name": "Phrase"}),
        );
        let ctx = OpContext::new();
        ctx.cancel.cancel();

        let result = resource.create(&ctx, &plan).await;
        assert_eq!(result.state, StateChange::Unchanged);
        assert!(result.has_error());
    }

    #[test]
    fn test_import_writes_separate_keys() {
        let resource = Dispatcher::<VerifyVoicePhrase>::new(crate::resource::testing::offline());
        let result = resource.import_state(&format!("{ENV}/{ID}"));
        let tree = stored(&result);
        assert_eq!(tree.get("environment_id").as_str(), Some(ENV));
        assert_eq!(tree.get("id").as_str(), Some(ID));
        assert!(tree.get("display_name").is_null());

        let bad = resource.import_state(ENV);
        assert_eq!(bad.state, StateChange::Unchanged);
        assert!(bad.diagnostics.iter().next().expect("error").detail.contains("environment_id/voice_phrase_id"));
    }
}
