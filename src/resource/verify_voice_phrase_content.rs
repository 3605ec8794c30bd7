//! `pingone_verify_voice_phrase_content`: the localized text of a voice phrase.
//!
//! The create endpoint answers with the new ID only, so the dispatcher reads
//! the content back before writing state.

use async_trait::async_trait;

use crate::framework::validator::LengthAtLeast;
use crate::framework::{
    Attribute, AttributeMode, AttributePath, Diagnostics, ImportComponent, Schema, Value,
    resource_id_ok_to_tf, string_ok_to_tf, time_ok_to_tf, tree_model,
};
use crate::pingone::verify::VoicePhraseContent;
use crate::pingone::{ApiClient, ObjectReference, SdkResponse};

use super::verify_voice_phrase::timestamp_attribute;
use super::{ResourceKind, environment_id_attribute, id_attribute, parent_id_attribute, text};

tree_model! {
    /// State of a voice phrase content.
    pub struct VoicePhraseContentModel {
        id: value String,
        environment_id: value String,
        voice_phrase_id: value String,
        locale: value String,
        content: value String,
        created_at: value String,
        updated_at: value String,
    }
}

/// Voice phrase content resource kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyVoicePhraseContent;

#[async_trait]
impl ResourceKind for VerifyVoicePhraseContent {
    type Model = VoicePhraseContentModel;
    type Dto = VoicePhraseContent;

    const TYPE_NAME: &'static str = "pingone_verify_voice_phrase_content";
    const DISPLAY_NAME: &'static str = "Voice phrase content";
    const API_NAME: &'static str = "VoicePhraseContent";

    fn schema() -> Schema {
        Schema::new("Resource to create and manage the localized contents of a voice phrase.")
            .with_attribute("id", id_attribute())
            .with_attribute("environment_id", environment_id_attribute("voice phrase content"))
            .with_attribute(
                "voice_phrase_id",
                parent_id_attribute(
                    "The identifier (UUID) of the `voice_phrase` associated with the `voice_phrase_content` configuration.",
                ),
            )
            .with_attribute(
                "locale",
                Attribute::string(AttributeMode::Required)
                    .with_description("Language localization requirement for the voice phrase contents.")
                    .with_validator(LengthAtLeast(1)),
            )
            .with_attribute(
                "content",
                Attribute::string(AttributeMode::Required)
                    .with_description("The phrase a user must speak as part of the voice enrollment or verification.")
                    .with_validator(LengthAtLeast(1)),
            )
            .with_attribute(
                "created_at",
                timestamp_attribute("The date and time the voice phrase content was created."),
            )
            .with_attribute(
                "updated_at",
                timestamp_attribute("The date and time the voice phrase content was updated. Can be null."),
            )
    }

    fn import_components() -> Vec<ImportComponent> {
        vec![
            ImportComponent::resource_id("environment_id"),
            ImportComponent::resource_id("voice_phrase_id"),
            ImportComponent::primary("voice_phrase_content_id"),
        ]
    }

    fn environment_id(model: &Self::Model) -> &Value<String> {
        &model.environment_id
    }

    fn id(model: &Self::Model) -> &Value<String> {
        &model.id
    }

    fn expand(model: &Self::Model, diags: &mut Diagnostics) -> Option<Self::Dto> {
        let voice_phrase_id = model
            .voice_phrase_id
            .expand_required(&AttributePath::root("voice_phrase_id"), diags);
        let locale = model.locale.expand_required(&AttributePath::root("locale"), diags);
        let content = model.content.expand_required(&AttributePath::root("content"), diags);

        Some(VoicePhraseContent {
            locale: Some(locale?.clone()),
            content: Some(content?.clone()),
            voice_phrase: Some(ObjectReference::new(voice_phrase_id?.clone())),
            ..VoicePhraseContent::default()
        })
    }

    fn flatten(model: &mut Self::Model, dto: &Self::Dto, _diags: &mut Diagnostics) {
        model.id = resource_id_ok_to_tf(dto.id.as_deref());
        if let Some(phrase) = &dto.voice_phrase {
            model.voice_phrase_id = resource_id_ok_to_tf(Some(&phrase.id));
        }
        model.locale = string_ok_to_tf(dto.locale.as_deref());
        model.content = string_ok_to_tf(dto.content.as_deref());
        model.created_at = time_ok_to_tf(dto.created_at.as_ref());
        model.updated_at = time_ok_to_tf(dto.updated_at.as_ref());
    }

    fn needs_read_back() -> bool {
        true
    }

    async fn create_call(api: &ApiClient, model: &Self::Model, dto: &Self::Dto) -> SdkResponse<Self::Dto> {
        api.create_voice_phrase_content(text(&model.environment_id), text(&model.voice_phrase_id), dto)
            .await
    }

    async fn read_call(api: &ApiClient, model: &Self::Model) -> SdkResponse<Self::Dto> {
        api.read_one_voice_phrase_content(
            text(&model.environment_id),
            text(&model.voice_phrase_id),
            text(&model.id),
        )
        .await
    }

    async fn update_call(api: &ApiClient, model: &Self::Model, dto: &Self::Dto) -> SdkResponse<Self::Dto> {
        api.update_voice_phrase_content(
            text(&model.environment_id),
            text(&model.voice_phrase_id),
            text(&model.id),
            dto,
        )
        .await
    }

    async fn delete_call(api: &ApiClient, model: &Self::Model) -> SdkResponse<()> {
        api.delete_voice_phrase_content(
            text(&model.environment_id),
            text(&model.voice_phrase_id),
            text(&model.id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::{ENV, ID, PARENT, offline, provider, stored, tree};
    use crate::resource::{Dispatcher, Resource, StateChange};
    use crate::sdk::OpContext;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn full_content() -> serde_json::Value {
        json!({
            "id": ID,
            "locale": "en",
            "content": "My voice is my password",
            "voicePhrase": {"id": PARENT},
            "createdAt": "2024-03-01T10:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_create_reads_back_thin_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/environments/{ENV}/voicePhrases/{PARENT}/contents")))
            .and(body_partial_json(json!({"locale": "en", "voicePhrase": {"id": PARENT}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": ID})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/environments/{ENV}/voicePhrases/{PARENT}/contents/{ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(full_content()))
            .expect(1)
            .mount(&server)
            .await;

        let resource = Dispatcher::<VerifyVoicePhraseContent>::new(provider(&server));
        let plan = tree(
            resource.schema(),
            json!({
                "environment_id": ENV,
                "voice_phrase_id": PARENT,
                "locale": "en",
                "content": "My voice is my password"
            }),
        );

        let result = resource.create(&OpContext::new(), &plan).await;
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        let stored = stored(&result);
        assert_eq!(stored.get("id").as_str(), Some(ID));
        assert_eq!(stored.get("content").as_str(), Some("My voice is my password"));
        assert_eq!(stored.get("created_at").as_str(), Some("2024-03-01T10:00:00Z"));
    }

    #[tokio::test]
    async fn test_create_without_body_is_internal_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let resource = Dispatcher::<VerifyVoicePhraseContent>::new(provider(&server));
        let plan = tree(
            resource.schema(),
            json!({"environment_id": ENV, "voice_phrase_id": PARENT, "locale": "en", "content": "x"}),
        );

        let result = resource.create(&OpContext::new(), &plan).await;
        assert_eq!(result.state, StateChange::Unchanged);
        let error = result.diagnostics.errors().next().expect("error");
        assert_eq!(error.summary, "Data object missing");
        assert!(error.detail.ends_with("Please report this to the provider maintainers."));
    }

    #[test]
    fn test_import_three_components() {
        let resource = Dispatcher::<VerifyVoicePhraseContent>::new(offline());
        let result = resource.import_state(&format!("{ENV}/{PARENT}/{ID}"));
        let tree = stored(&result);
        assert_eq!(tree.get("environment_id").as_str(), Some(ENV));
        assert_eq!(tree.get("voice_phrase_id").as_str(), Some(PARENT));
        assert_eq!(tree.get("id").as_str(), Some(ID));

        let short = resource.import_state(&format!("{ENV}/{ID}"));
        assert!(short.has_error());
    }
}
