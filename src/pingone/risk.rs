//! Risk API: predictors and risk policy sets.

use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};

use super::client::{ApiClient, SdkResponse};
use super::management::ObjectReference;
use super::paging::PageCursor;

/// Risk evaluation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// Low risk.
    Low,
    /// Medium risk.
    Medium,
    /// High risk.
    High,
}

impl RiskLevel {
    /// All levels.
    pub const ALL: [&'static str; 3] = ["LOW", "MEDIUM", "HIGH"];

    /// Parses a level.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            _ => None,
        }
    }
}

impl AsRef<str> for RiskLevel {
    fn as_ref(&self) -> &str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

/// Kind of risk predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredictorType {
    /// Anonymous network detection.
    AnonymousNetwork,
    /// Geovelocity anomaly.
    Geovelocity,
    /// IP reputation.
    IpReputation,
    /// User location anomaly.
    UserLocationAnomaly,
    /// User risk behavior.
    UserRiskBehavior,
    /// Velocity.
    Velocity,
}

impl PredictorType {
    /// All wire names.
    pub const ALL: [&'static str; 6] = [
        "ANONYMOUS_NETWORK",
        "GEOVELOCITY",
        "IP_REPUTATION",
        "USER_LOCATION_ANOMALY",
        "USER_RISK_BEHAVIOR",
        "VELOCITY",
    ];

    /// Parses a wire name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(value.to_string())).ok()
    }
}

impl AsRef<str> for PredictorType {
    fn as_ref(&self) -> &str {
        match self {
            Self::AnonymousNetwork => "ANONYMOUS_NETWORK",
            Self::Geovelocity => "GEOVELOCITY",
            Self::IpReputation => "IP_REPUTATION",
            Self::UserLocationAnomaly => "USER_LOCATION_ANOMALY",
            Self::UserRiskBehavior => "USER_RISK_BEHAVIOR",
            Self::Velocity => "VELOCITY",
        }
    }
}

/// A result carrying a fixed level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelResult {
    /// The level.
    pub level: RiskLevel,
    /// Result type; always `VALUE` for fixed levels.
    #[serde(rename = "type", default = "value_type")]
    pub result_type: String,
}

fn value_type() -> String {
    "VALUE".to_string()
}

impl LevelResult {
    /// A fixed-level result.
    #[must_use]
    pub fn value(level: RiskLevel) -> Self {
        Self {
            level,
            result_type: value_type(),
        }
    }
}

/// Predictor default decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictorDefault {
    /// Decision returned when the predictor cannot evaluate.
    pub result: LevelResult,
}

/// A risk predictor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskPredictor {
    /// Predictor ID.
    #[serde(default, skip_serializing)]
    pub id: Option<String>,
    /// Display name.
    pub name: String,
    /// Name used in policy expressions.
    pub compact_name: String,
    /// Kind of predictor.
    #[serde(rename = "type")]
    pub predictor_type: PredictorType,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Default decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<PredictorDefault>,
    /// Whether the environment is licensed for this predictor.
    #[serde(default, skip_serializing)]
    pub licensed: Option<bool>,
    /// Whether the predictor can be deleted.
    #[serde(default, skip_serializing)]
    pub deletable: Option<bool>,
    /// Creation time.
    #[serde(default, skip_serializing)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Score range of a policy condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRange {
    /// Inclusive minimum.
    pub min_score: i64,
    /// Exclusive maximum.
    pub max_score: i64,
}

/// Weight of one predictor in a weighted policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedWeight {
    /// Reference expression to the predictor result.
    pub value: String,
    /// Weight.
    pub weight: i64,
}

/// Score of one predictor in a scored policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedScore {
    /// Reference expression to the predictor result.
    pub value: String,
    /// Score.
    pub score: i64,
}

/// `AGGREGATED_WEIGHTS` condition type.
pub const CONDITION_AGGREGATED_WEIGHTS: &str = "AGGREGATED_WEIGHTS";
/// `AGGREGATED_SCORES` condition type.
pub const CONDITION_AGGREGATED_SCORES: &str = "AGGREGATED_SCORES";

/// Condition of a risk policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyCondition {
    /// `AGGREGATED_WEIGHTS` or `AGGREGATED_SCORES`.
    #[serde(rename = "type")]
    pub condition_type: String,
    /// Score range.
    pub between: ScoreRange,
    /// Predictor weights.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregated_weights: Vec<AggregatedWeight>,
    /// Predictor scores.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregated_scores: Vec<AggregatedScore>,
}

/// Name of the policy mapping to `MEDIUM`.
pub const MEDIUM_WEIGHTED_POLICY: &str = "MEDIUM_WEIGHTED_POLICY";
/// Name of the policy mapping to `HIGH`.
pub const HIGH_WEIGHTED_POLICY: &str = "HIGH_WEIGHTED_POLICY";

/// One policy within a policy set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskPolicy {
    /// Policy name.
    pub name: String,
    /// Result when the condition matches.
    pub result: LevelResult,
    /// Condition.
    pub condition: PolicyCondition,
}

/// A risk policy set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskPolicySet {
    /// Policy set ID.
    #[serde(default, skip_serializing)]
    pub id: Option<String>,
    /// Display name.
    pub name: String,
    /// Whether this is the environment's default policy set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<bool>,
    /// Result when no policy matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_result: Option<LevelResult>,
    /// Predictors evaluated by the set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evaluated_predictors: Vec<ObjectReference>,
    /// Policies.
    #[serde(default)]
    pub risk_policies: Vec<RiskPolicy>,
}

impl RiskPolicySet {
    /// The policy with the given name.
    #[must_use]
    pub fn policy(&self, name: &str) -> Option<&RiskPolicy> {
        self.risk_policies.iter().find(|p| p.name == name)
    }
}

fn predictors(environment_id: &str) -> String {
    format!("/environments/{environment_id}/riskPredictors")
}

fn policy_sets(environment_id: &str) -> String {
    format!("/environments/{environment_id}/riskPolicySets")
}

impl ApiClient {
    // ------------------------------------------------------------------------
    // Predictors
    // ------------------------------------------------------------------------

    /// Creates a risk predictor.
    pub async fn create_risk_predictor(
        &self,
        environment_id: &str,
        body: &RiskPredictor,
    ) -> SdkResponse<RiskPredictor> {
        self.post(&predictors(environment_id), body).await
    }

    /// Reads one risk predictor.
    pub async fn read_one_risk_predictor(
        &self,
        environment_id: &str,
        predictor_id: &str,
    ) -> SdkResponse<RiskPredictor> {
        self.get(&format!("{}/{predictor_id}", predictors(environment_id)))
            .await
    }

    /// Replaces a risk predictor.
    pub async fn update_risk_predictor(
        &self,
        environment_id: &str,
        predictor_id: &str,
        body: &RiskPredictor,
    ) -> SdkResponse<RiskPredictor> {
        self.put(&format!("{}/{predictor_id}", predictors(environment_id)), body)
            .await
    }

    /// Deletes a risk predictor.
    pub async fn delete_risk_predictor(
        &self,
        environment_id: &str,
        predictor_id: &str,
    ) -> SdkResponse<()> {
        self.delete(&format!("{}/{predictor_id}", predictors(environment_id)))
            .await
    }

    /// Streams all risk predictors of an environment.
    pub fn read_all_risk_predictors<'a>(
        &'a self,
        environment_id: &str,
    ) -> impl Stream<Item = PageCursor<RiskPredictor>> + Send + use<'a> {
        self.paged(&predictors(environment_id), "riskPredictors")
    }

    // ------------------------------------------------------------------------
    // Policy sets
    // ------------------------------------------------------------------------

    /// Creates a risk policy set.
    pub async fn create_risk_policy_set(
        &self,
        environment_id: &str,
        body: &RiskPolicySet,
    ) -> SdkResponse<RiskPolicySet> {
        self.post(&policy_sets(environment_id), body).await
    }

    /// Reads one risk policy set.
    pub async fn read_one_risk_policy_set(
        &self,
        environment_id: &str,
        policy_set_id: &str,
    ) -> SdkResponse<RiskPolicySet> {
        self.get(&format!("{}/{policy_set_id}", policy_sets(environment_id)))
            .await
    }

    /// Replaces a risk policy set.
    pub async fn update_risk_policy_set(
        &self,
        environment_id: &str,
        policy_set_id: &str,
        body: &RiskPolicySet,
    ) -> SdkResponse<RiskPolicySet> {
        self.put(&format!("{}/{policy_set_id}", policy_sets(environment_id)), body)
            .await
    }

    /// Deletes a risk policy set.
    pub async fn delete_risk_policy_set(
        &self,
        environment_id: &str,
        policy_set_id: &str,
    ) -> SdkResponse<()> {
        self.delete(&format!("{}/{policy_set_id}", policy_sets(environment_id)))
            .await
    }
}
