//! Verify API: voice phrases, voice phrase contents and verify policies.

use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};

use super::client::{ApiClient, SdkResponse};
use super::management::ObjectReference;
use super::paging::PageCursor;

/// A voice phrase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoicePhrase {
    /// Voice phrase ID.
    #[serde(default, skip_serializing)]
    pub id: Option<String>,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
    /// Creation time.
    #[serde(default, skip_serializing)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default, skip_serializing)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Text content of a voice phrase in one locale.
///
/// Create returns only the ID; every other field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoicePhraseContent {
    /// Content ID.
    #[serde(default, skip_serializing)]
    pub id: Option<String>,
    /// Locale, e.g. `en`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Phrase text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Owning voice phrase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_phrase: Option<ObjectReference>,
    /// Creation time.
    #[serde(default, skip_serializing)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default, skip_serializing)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Verification requirement level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifySetting {
    /// `DISABLED`, `OPTIONAL` or `REQUIRED`.
    pub verify: String,
}

/// Verification requirement with a match threshold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdSetting {
    /// `DISABLED`, `OPTIONAL` or `REQUIRED`.
    pub verify: String,
    /// `LOW`, `MEDIUM` or `HIGH`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<String>,
}

/// A verify policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPolicy {
    /// Policy ID.
    #[serde(default, skip_serializing)]
    pub id: Option<String>,
    /// Policy name.
    #[serde(default)]
    pub name: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether this is the environment's default policy.
    #[serde(default, skip_serializing)]
    pub default: Option<bool>,
    /// Government ID verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub government_id: Option<VerifySetting>,
    /// Facial comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facial_comparison: Option<ThresholdSetting>,
    /// Liveness check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness: Option<ThresholdSetting>,
    /// Creation time.
    #[serde(default, skip_serializing)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default, skip_serializing)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn voice_phrases(environment_id: &str) -> String {
    format!("/environments/{environment_id}/voicePhrases")
}

fn voice_phrase_contents(environment_id: &str, voice_phrase_id: &str) -> String {
    format!("{}/{voice_phrase_id}/contents", voice_phrases(environment_id))
}

fn verify_policies(environment_id: &str) -> String {
    format!("/environments/{environment_id}/verifyPolicies")
}

impl ApiClient {
    // ------------------------------------------------------------------------
    // Voice phrases
    // ------------------------------------------------------------------------

    /// Creates a voice phrase.
    pub async fn create_voice_phrase(
        &self,
        environment_id: &str,
        body: &VoicePhrase,
    ) -> SdkResponse<VoicePhrase> {
        self.post(&voice_phrases(environment_id), body).await
    }

    /// Reads one voice phrase.
    pub async fn read_one_voice_phrase(
        &self,
        environment_id: &str,
        voice_phrase_id: &str,
    ) -> SdkResponse<VoicePhrase> {
        self.get(&format!("{}/{voice_phrase_id}", voice_phrases(environment_id)))
            .await
    }

    /// Replaces a voice phrase.
    pub async fn update_voice_phrase(
        &self,
        environment_id: &str,
        voice_phrase_id: &str,
        body: &VoicePhrase,
    ) -> SdkResponse<VoicePhrase> {
        self.put(&format!("{}/{voice_phrase_id}", voice_phrases(environment_id)), body)
            .await
    }

    /// Deletes a voice phrase.
    pub async fn delete_voice_phrase(
        &self,
        environment_id: &str,
        voice_phrase_id: &str,
    ) -> SdkResponse<()> {
        self.delete(&format!("{}/{voice_phrase_id}", voice_phrases(environment_id)))
            .await
    }

    /// Streams all voice phrases of an environment.
    pub fn read_all_voice_phrases<'a>(
        &'a self,
        environment_id: &str,
    ) -> impl Stream<Item = PageCursor<VoicePhrase>> + Send + use<'a> {
        self.paged(&voice_phrases(environment_id), "voicePhrases")
    }

    // ------------------------------------------------------------------------
    // Voice phrase contents
    // ------------------------------------------------------------------------

    /// Creates a voice phrase content. The response carries only the ID.
    pub async fn create_voice_phrase_content(
        &self,
        environment_id: &str,
        voice_phrase_id: &str,
        body: &VoicePhraseContent,
    ) -> SdkResponse<VoicePhraseContent> {
        self.post(&voice_phrase_contents(environment_id, voice_phrase_id), body)
            .await
    }

    /// Reads one voice phrase content.
    pub async fn read_one_voice_phrase_content(
        &self,
        environment_id: &str,
        voice_phrase_id: &str,
        content_id: &str,
    ) -> SdkResponse<VoicePhraseContent> {
        self.get(&format!(
            "{}/{content_id}",
            voice_phrase_contents(environment_id, voice_phrase_id)
        ))
        .await
    }

    /// Replaces a voice phrase content.
    pub async fn update_voice_phrase_content(
        &self,
        environment_id: &str,
        voice_phrase_id: &str,
        content_id: &str,
        body: &VoicePhraseContent,
    ) -> SdkResponse<VoicePhraseContent> {
        self.put(
            &format!(
                "{}/{content_id}",
                voice_phrase_contents(environment_id, voice_phrase_id)
            ),
            body,
        )
        .await
    }

    /// Deletes a voice phrase content.
    pub async fn delete_voice_phrase_content(
        &self,
        environment_id: &str,
        voice_phrase_id: &str,
        content_id: &str,
    ) -> SdkResponse<()> {
        self.delete(&format!(
            "{}/{content_id}",
            voice_phrase_contents(environment_id, voice_phrase_id)
        ))
        .await
    }

    // ------------------------------------------------------------------------
    // Verify policies
    // ------------------------------------------------------------------------

    /// Creates a verify policy.
    pub async fn create_verify_policy(
        &self,
        environment_id: &str,
        body: &VerifyPolicy,
    ) -> SdkResponse<VerifyPolicy> {
        self.post(&verify_policies(environment_id), body).await
    }

    /// Reads one verify policy.
    pub async fn read_one_verify_policy(
        &self,
        environment_id: &str,
        policy_id: &str,
    ) -> SdkResponse<VerifyPolicy> {
        self.get(&format!("{}/{policy_id}", verify_policies(environment_id)))
            .await
    }

    /// Replaces a verify policy.
    pub async fn update_verify_policy(
        &self,
        environment_id: &str,
        policy_id: &str,
        body: &VerifyPolicy,
    ) -> SdkResponse<VerifyPolicy> {
        self.put(&format!("{}/{policy_id}", verify_policies(environment_id)), body)
            .await
    }

    /// Deletes a verify policy.
    pub async fn delete_verify_policy(
        &self,
        environment_id: &str,
        policy_id: &str,
    ) -> SdkResponse<()> {
        self.delete(&format!("{}/{policy_id}", verify_policies(environment_id)))
            .await
    }

    /// Streams all verify policies of an environment.
    pub fn read_all_verify_policies<'a>(
        &'a self,
        environment_id: &str,
    ) -> impl Stream<Item = PageCursor<VerifyPolicy>> + Send + use<'a> {
        self.paged(&verify_policies(environment_id), "verifyPolicies")
    }
}
