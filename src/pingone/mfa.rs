//! MFA API: device authentication policies and FIDO2 policies.

use futures::Stream;
use serde::{Deserialize, Serialize};

use super::client::{ApiClient, SdkResponse};
use super::paging::PageCursor;

/// Settings of one MFA method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodSettings {
    /// Whether the method is enabled.
    pub enabled: bool,
    /// Whether pairing new devices is disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairing_disabled: Option<bool>,
}

/// Device selection at authentication time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationSettings {
    /// `DEFAULT_TO_FIRST`, `PROMPT_TO_SELECT` or `ALWAYS_DISPLAY_DEVICES`.
    pub device_selection: String,
}

/// An MFA device authentication policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAuthenticationPolicy {
    /// Policy ID.
    #[serde(default, skip_serializing)]
    pub id: Option<String>,
    /// Policy name.
    #[serde(default)]
    pub name: String,
    /// Whether this is the environment's default policy.
    #[serde(default, skip_serializing)]
    pub default: Option<bool>,
    /// Notification sent when a new device is paired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_device_notification: Option<String>,
    /// Device selection settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthenticationSettings>,
    /// SMS.
    #[serde(default)]
    pub sms: MethodSettings,
    /// Voice.
    #[serde(default)]
    pub voice: MethodSettings,
    /// Email.
    #[serde(default)]
    pub email: MethodSettings,
    /// TOTP authenticator apps.
    #[serde(default)]
    pub totp: MethodSettings,
}

/// User verification requirement of a FIDO2 policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserVerification {
    /// `DISCOURAGED`, `PREFERRED` or `REQUIRED`.
    pub option: String,
}

/// A FIDO2 policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fido2Policy {
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
    /// `NONE`, `AUDIT_ONLY`, `GLOBAL` or `SPECIFIC`.
    #[serde(default)]
    pub attestation_requirements: String,
    /// `PLATFORM`, `CROSS_PLATFORM` or `BOTH`.
    #[serde(default)]
    pub authenticator_attachment: String,
    /// `DISCOURAGED`, `PREFERRED` or `REQUIRED`.
    #[serde(default)]
    pub discoverable_credentials: String,
    /// Relying party ID; the environment's domain when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relying_party_id: Option<String>,
    /// User verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_verification: Option<UserVerification>,
}

fn device_policies(environment_id: &str) -> String {
    format!("/environments/{environment_id}/deviceAuthenticationPolicies")
}

fn fido2_policies(environment_id: &str) -> String {
    format!("/environments/{environment_id}/fido2Policies")
}

impl ApiClient {
    // ------------------------------------------------------------------------
    // Device authentication policies
    // ------------------------------------------------------------------------

    /// Creates a device authentication policy.
    pub async fn create_device_authentication_policy(
        &self,
        environment_id: &str,
        body: &DeviceAuthenticationPolicy,
    ) -> SdkResponse<DeviceAuthenticationPolicy> {
        self.post(&device_policies(environment_id), body).await
    }

    /// Reads one device authentication policy.
    pub async fn read_one_device_authentication_policy(
        &self,
        environment_id: &str,
        policy_id: &str,
    ) -> SdkResponse<DeviceAuthenticationPolicy> {
        self.get(&format!("{}/{policy_id}", device_policies(environment_id)))
            .await
    }

    /// Replaces a device authentication policy.
    pub async fn update_device_authentication_policy(
        &self,
        environment_id: &str,
        policy_id: &str,
        body: &DeviceAuthenticationPolicy,
    ) -> SdkResponse<DeviceAuthenticationPolicy> {
        self.put(&format!("{}/{policy_id}", device_policies(environment_id)), body)
            .await
    }

    /// Deletes a device authentication policy.
    pub async fn delete_device_authentication_policy(
        &self,
        environment_id: &str,
        policy_id: &str,
    ) -> SdkResponse<()> {
        self.delete(&format!("{}/{policy_id}", device_policies(environment_id)))
            .await
    }

    /// Streams all device authentication policies of an environment.
    pub fn read_all_device_authentication_policies<'a>(
        &'a self,
        environment_id: &str,
    ) -> impl Stream<Item = PageCursor<DeviceAuthenticationPolicy>> + Send + use<'a> {
        self.paged(
            &device_policies(environment_id),
            "deviceAuthenticationPolicies",
        )
    }

    // ------------------------------------------------------------------------
    // FIDO2 policies
    // ------------------------------------------------------------------------

    /// Creates a FIDO2 policy.
    pub async fn create_fido2_policy(
        &self,
        environment_id: &str,
        body: &Fido2Policy,
    ) -> SdkResponse<Fido2Policy> {
        self.post(&fido2_policies(environment_id), body).await
    }

    /// Reads one FIDO2 policy.
    pub async fn read_one_fido2_policy(
        &self,
        environment_id: &str,
        policy_id: &str,
    ) -> SdkResponse<Fido2Policy> {
        self.get(&format!("{}/{policy_id}", fido2_policies(environment_id)))
            .await
    }

    /// Replaces a FIDO2 policy.
    pub async fn update_fido2_policy(
        &self,
        environment_id: &str,
        policy_id: &str,
        body: &Fido2Policy,
    ) -> SdkResponse<Fido2Policy> {
        self.put(&format!("{}/{policy_id}", fido2_policies(environment_id)), body)
            .await
    }

    /// Deletes a FIDO2 policy.
    pub async fn delete_fido2_policy(
        &self,
        environment_id: &str,
        policy_id: &str,
    ) -> SdkResponse<()> {
        self.delete(&format!("{}/{policy_id}", fido2_policies(environment_id)))
            .await
    }
}
