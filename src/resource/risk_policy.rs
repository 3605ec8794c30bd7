//! `pingone_risk_policy`: a risk policy set built from either weighted or
//! scored predictors.
//!
//! The platform models the set as two policies, one per outcome level, whose
//! conditions share the same aggregated predictor list. The resource exposes
//! them as a single `policy_weights` or `policy_scores` block with a medium
//! and a high threshold. Threshold upper bounds and predictor reference
//! expressions are derived at plan time.

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::framework::planmodifier::UseStateForUnknown;
use crate::framework::validator::{
    AtLeast, AtMost, ExactlyOneOf, IsDivisibleBy, IsGreaterThanPathValue, IsLessThanPathValue,
    LengthAtLeast, LengthAtMost, OneOf, SizeAtLeast,
};
use crate::framework::{
    Attribute, AttributeMode, AttributePath, Description, Diagnostics, ImportComponent,
    PathExpression, Schema, Tree, TreeModel, Value, bool_ok_to_tf, enum_ok_to_tf,
    int64_ok_to_tf, resource_id_ok_to_tf, string_to_tf, tree_model,
};
use crate::pingone::risk::{
    AggregatedScore, AggregatedWeight, CONDITION_AGGREGATED_SCORES, CONDITION_AGGREGATED_WEIGHTS,
    HIGH_WEIGHTED_POLICY, LevelResult, MEDIUM_WEIGHTED_POLICY, PolicyCondition, RiskLevel,
    RiskPolicy as RiskPolicyDto, RiskPolicySet, ScoreRange,
};
use crate::pingone::{ApiClient, HttpResponse, ObjectReference, SdkResponse, ServiceError};
use crate::sdk::CustomError;

use super::{ResourceKind, environment_id_attribute, id_attribute, text};

const WEIGHTS: &str = "policy_weights";
const SCORES: &str = "policy_scores";

/// Upper bound of a weighted policy's score.
const WEIGHTS_MAX_SCORE: i64 = 100;
/// Upper bound of a scored policy's score.
const SCORES_MAX_SCORE: i64 = 1000;

tree_model! {
    /// Lower and upper bound of one outcome.
    pub struct ThresholdModel {
        min_score: value i64,
        max_score: value i64,
    }
}

tree_model! {
    /// A predictor and its weight.
    pub struct WeightedPredictorModel {
        compact_name: value String,
        predictor_reference_value: value String,
        weight: value i64,
    }
}

tree_model! {
    /// A predictor and its score.
    pub struct ScoredPredictorModel {
        compact_name: value String,
        predictor_reference_value: value String,
        score: value i64,
    }
}

tree_model! {
    /// Weighted average policy.
    pub struct WeightsPolicyModel {
        policy_threshold_medium: object ThresholdModel,
        policy_threshold_high: object ThresholdModel,
        predictors: object_set WeightedPredictorModel,
    }
}

tree_model! {
    /// Aggregated score policy.
    pub struct ScoresPolicyModel {
        policy_threshold_medium: object ThresholdModel,
        policy_threshold_high: object ThresholdModel,
        predictors: object_set ScoredPredictorModel,
    }
}

tree_model! {
    /// Result returned when no policy matches.
    pub struct DefaultResultModel {
        level: value String,
        result_type as "type": value String,
    }
}

tree_model! {
    /// State of a risk policy set.
    pub struct RiskPolicyModel {
        id: value String,
        environment_id: value String,
        name: value String,
        default_result: object DefaultResultModel,
        default: value bool,
        evaluated_predictors: value BTreeSet<String>,
        policy_weights: object WeightsPolicyModel,
        policy_scores: object ScoresPolicyModel,
    }
}

/// Risk policy resource kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskPolicy;

/// Reference expression of a weighted predictor.
fn weight_reference(compact_name: &str) -> String {
    format!("${{details.aggregatedWeights.{compact_name}}}")
}

/// Reference expression of a scored predictor.
fn score_reference(compact_name: &str) -> String {
    format!("${{details.{compact_name}.level}}")
}

/// Recovers the compact name from a reference expression.
fn compact_name_from_reference(reference: &str, scores: bool) -> Option<&str> {
    let inner = reference.strip_prefix("${details.")?.strip_suffix('}')?;
    if scores {
        inner.strip_suffix(".level")
    } else {
        inner.strip_prefix("aggregatedWeights.")
    }
}

fn threshold_schema(root: &'static str, high: bool, markdown: &str) -> Attribute {
    let scores = root == SCORES;
    let peer = if high { "policy_threshold_medium" } else { "policy_threshold_high" };
    let peer = PathExpression::match_root(root).at_name(peer).at_name("min_score");

    let mut min_description = Description::from_markdown(
        "An integer that specifies the minimum score to use as the lower bound value of the policy threshold.",
    );
    let mut min_score = Attribute::int64(AttributeMode::Required).with_validator(AtLeast(1));
    min_score = if high {
        min_score.with_validator(IsGreaterThanPathValue::new(vec![peer]))
    } else {
        min_score.with_validator(IsLessThanPathValue::new(vec![peer]))
    };
    if scores {
        min_description = min_description.append(&format!("Maximum value allowed is `{SCORES_MAX_SCORE}`."));
        min_score = min_score.with_validator(AtMost(SCORES_MAX_SCORE));
    } else {
        min_description = min_description.append(&format!(
            "For weights policies, the score values should be 10x the desired risk value in the console. For example, a risk score of `5` in the console should be entered as `50`.  The provided score must be exactly divisible by 10.  Maximum value allowed is `{WEIGHTS_MAX_SCORE}`."
        ));
        min_score = min_score
            .with_validator(AtMost(WEIGHTS_MAX_SCORE))
            .with_validator(IsDivisibleBy::new(10));
    }

    Attribute::single_nested(
        AttributeMode::Required,
        vec![
            ("min_score", min_score.describe(min_description)),
            (
                "max_score",
                Attribute::int64(AttributeMode::Computed).with_description(
                    "An integer that specifies the maximum score to use as the upper bound value of the policy threshold.",
                ),
            ),
        ],
    )
    .with_description(markdown)
}

fn policy_schema(root: &'static str) -> Attribute {
    let (value_name, value_attr, markdown) = if root == SCORES {
        (
            "score",
            Attribute::int64(AttributeMode::Required)
                .with_description("An integer that specifies the score to apply to the High risk / true outcome of the predictor, to apply to the overall risk calculation.")
                .with_validator(AtLeast(0))
                .with_validator(AtMost(100)),
            "An object that describes settings for a risk policy calculated by aggregating score values, with a final result being the sum of score values from each of the configured predictors.",
        )
    } else {
        (
            "weight",
            Attribute::int64(AttributeMode::Required)
                .with_description("An integer that specifies the weight to apply to the predictor when calculating the overall risk score.")
                .with_validator(AtLeast(1))
                .with_validator(AtMost(10)),
            "An object that describes settings for a risk policy using a weighted average calculation, with a final result being a risk score between `0` and `10`.",
        )
    };

    Attribute::single_nested(
        AttributeMode::Optional,
        vec![
            (
                "policy_threshold_medium",
                threshold_schema(
                    root,
                    false,
                    "An object that specifies the lower and upper bound threshold values that define the medium risk outcome as a result of the policy evaluation.",
                ),
            ),
            (
                "policy_threshold_high",
                threshold_schema(
                    root,
                    true,
                    "An object that specifies the lower and upper bound threshold values that define the high risk outcome as a result of the policy evaluation.",
                ),
            ),
            (
                "predictors",
                Attribute::set_nested(
                    AttributeMode::Required,
                    vec![
                        (
                            "compact_name",
                            Attribute::string(AttributeMode::Required).with_description(
                                "A string that specifies the compact name of the predictor to apply to the risk policy.",
                            ),
                        ),
                        (
                            "predictor_reference_value",
                            Attribute::string(AttributeMode::Computed).with_description(
                                "A string that specifies the attribute reference of the level to evaluate.",
                            ),
                        ),
                        (value_name, value_attr),
                    ],
                )
                .with_description("The predictors to apply to the risk policy.")
                .with_validator(SizeAtLeast(1)),
            ),
        ],
    )
    .describe(Description::from_markdown(markdown).exactly_one_of(&[WEIGHTS, SCORES]))
    .with_validator(ExactlyOneOf::new(vec![
        PathExpression::match_relative().at_parent().at_name(WEIGHTS),
        PathExpression::match_relative().at_parent().at_name(SCORES),
    ]))
}

/// Rejects a malformed `composition.condition`.
fn custom_error_invalid_composition(_http: Option<&HttpResponse>, error: &ServiceError) -> Diagnostics {
    let mut diags = Diagnostics::new();
    if error
        .first_detail()
        .is_some_and(|d| d.target.as_deref() == Some("composition.condition"))
    {
        diags.add_error(
            "Invalid \"composition.condition\" policy JSON.",
            "Please check the \"composition.condition\" policy JSON structure and contents and try again.",
        );
    }
    diags
}

/// Plan-time view of either policy kind.
struct PlannedPolicy<'a> {
    thresholds: (&'a mut Value<ThresholdModel>, &'a mut Value<ThresholdModel>),
    compact_names: Vec<Option<String>>,
    max_score: i64,
}

impl RiskPolicy {
    /// Derives threshold upper bounds and predictor references, and decides
    /// whether `evaluated_predictors` will change.
    fn plan_model(config: &RiskPolicyModel, prior: Option<&RiskPolicyModel>, plan: &mut RiskPolicyModel) {
        let prior_names = prior.map(|p| match (&p.policy_weights, &p.policy_scores) {
            (Value::Known(w), _) => w
                .predictors
                .as_known()
                .map(|ps| ps.iter().filter_map(|p| p.compact_name.as_known().cloned()).collect::<Vec<_>>()),
            (_, Value::Known(s)) => s
                .predictors
                .as_known()
                .map(|ps| ps.iter().filter_map(|p| p.compact_name.as_known().cloned()).collect::<Vec<_>>()),
            _ => None,
        });

        let kind_changed = prior.is_some_and(|p| {
            plan.policy_weights.is_unknown()
                || plan.policy_scores.is_unknown()
                || (p.policy_scores.is_null() && !plan.policy_scores.is_null())
                || (p.policy_weights.is_null() && !plan.policy_weights.is_null())
        });

        let planned = match (&mut plan.policy_weights, &mut plan.policy_scores) {
            (Value::Known(weights), _) => {
                let compact_names = Self::plan_predictors(
                    &mut weights.predictors,
                    |p: &WeightedPredictorModel| p.compact_name.as_known().cloned(),
                    |p, name| p.predictor_reference_value = Value::Known(weight_reference(name)),
                );
                Some(PlannedPolicy {
                    thresholds: (&mut weights.policy_threshold_medium, &mut weights.policy_threshold_high),
                    compact_names,
                    max_score: WEIGHTS_MAX_SCORE,
                })
            }
            (_, Value::Known(scores)) => {
                let compact_names = Self::plan_predictors(
                    &mut scores.predictors,
                    |p: &ScoredPredictorModel| p.compact_name.as_known().cloned(),
                    |p, name| p.predictor_reference_value = Value::Known(score_reference(name)),
                );
                Some(PlannedPolicy {
                    thresholds: (&mut scores.policy_threshold_medium, &mut scores.policy_threshold_high),
                    compact_names,
                    max_score: SCORES_MAX_SCORE,
                })
            }
            _ => None,
        };

        let mut predictors_changed = kind_changed;
        if let Some(planned) = planned {
            let (medium, high) = planned.thresholds;
            let high_min = high.as_known().map_or(Value::Unknown, |h| h.min_score.clone());
            if let Value::Known(medium) = medium {
                medium.max_score = high_min;
            }
            if let Value::Known(high) = high {
                high.max_score = Value::Known(planned.max_score);
            }

            if let Some(Some(prior_names)) = prior_names {
                predictors_changed |= prior_names.len() != planned.compact_names.len()
                    || planned
                        .compact_names
                        .iter()
                        .any(|name| name.as_ref().is_none_or(|n| !prior_names.contains(n)));
            }
        }

        if prior.is_some() && config.evaluated_predictors.is_null() && predictors_changed {
            plan.evaluated_predictors = Value::Unknown;
        }

        if config.default_result.is_null() && !plan.default_result.is_known() {
            plan.default_result = Value::Known(DefaultResultModel {
                level: Value::Known(RiskLevel::Low.as_ref().to_string()),
                result_type: Value::Unknown,
            });
        }
    }

    fn plan_predictors<P>(
        predictors: &mut Value<Vec<P>>,
        compact_name: impl Fn(&P) -> Option<String>,
        set_reference: impl Fn(&mut P, &str),
    ) -> Vec<Option<String>> {
        let Value::Known(predictors) = predictors else {
            return Vec::new();
        };
        predictors
            .iter_mut()
            .map(|predictor| {
                let name = compact_name(predictor);
                if let Some(name) = &name {
                    set_reference(predictor, name);
                }
                name
            })
            .collect()
    }

    fn expand_threshold(
        threshold: &Value<ThresholdModel>,
        path: &AttributePath,
        fallback_max: Option<i64>,
        diags: &mut Diagnostics,
    ) -> Option<ScoreRange> {
        let threshold = threshold.expand_required(path, diags)?;
        let min_score = *threshold.min_score.expand_required(&path.at_name("min_score"), diags)?;
        let max_score = threshold.max_score.expand_optional().copied().or(fallback_max)?;
        Some(ScoreRange { min_score, max_score })
    }

    fn conditions(
        condition_type: &str,
        between: (ScoreRange, ScoreRange),
        weights: Vec<AggregatedWeight>,
        scores: Vec<AggregatedScore>,
    ) -> Vec<RiskPolicyDto> {
        let condition = |between: ScoreRange| PolicyCondition {
            condition_type: condition_type.to_string(),
            between,
            aggregated_weights: weights.clone(),
            aggregated_scores: scores.clone(),
        };
        vec![
            RiskPolicyDto {
                name: MEDIUM_WEIGHTED_POLICY.to_string(),
                result: LevelResult::value(RiskLevel::Medium),
                condition: condition(between.0),
            },
            RiskPolicyDto {
                name: HIGH_WEIGHTED_POLICY.to_string(),
                result: LevelResult::value(RiskLevel::High),
                condition: condition(between.1),
            },
        ]
    }

    fn flatten_threshold(condition: &PolicyCondition) -> Value<ThresholdModel> {
        Value::Known(ThresholdModel {
            min_score: int64_ok_to_tf(Some(condition.between.min_score)),
            max_score: int64_ok_to_tf(Some(condition.between.max_score)),
        })
    }
}

#[async_trait]
impl ResourceKind for RiskPolicy {
    type Model = RiskPolicyModel;
    type Dto = RiskPolicySet;

    const TYPE_NAME: &'static str = "pingone_risk_policy";
    const DISPLAY_NAME: &'static str = "Risk policy";
    const API_NAME: &'static str = "RiskPolicySet";

    fn schema() -> Schema {
        Schema::new("Resource to manage Risk policies in a PingOne environment.")
            .with_attribute("id", id_attribute())
            .with_attribute("environment_id", environment_id_attribute("risk policy"))
            .with_attribute(
                "name",
                Attribute::string(AttributeMode::Required)
                    .with_description("A string that specifies the unique, friendly name for this policy set. Maximum size is 256 characters.")
                    .with_validator(LengthAtLeast(1))
                    .with_validator(LengthAtMost(256)),
            )
            .with_attribute(
                "default_result",
                Attribute::single_nested(
                    AttributeMode::OptionalComputed,
                    vec![
                        (
                            "level",
                            Attribute::string(AttributeMode::Required)
                                .describe(
                                    Description::from_markdown("The default result level.")
                                        .allowed_values(&[RiskLevel::Low.as_ref()]),
                                )
                                .with_validator(OneOf::new(RiskLevel::ALL)),
                        ),
                        (
                            "type",
                            Attribute::string(AttributeMode::Computed)
                                .with_description("The default result type.")
                                .with_plan_modifier(UseStateForUnknown),
                        ),
                    ],
                )
                .describe(
                    Description::from_markdown(
                        "A single nested object that specifies the default result value for the risk policy.",
                    )
                    .default_value("{ level = \"LOW\" }"),
                ),
            )
            .with_attribute(
                "default",
                Attribute::bool(AttributeMode::Computed)
                    .with_description("A boolean that indicates whether this risk policy set is the environment's default risk policy set. This is used whenever an explicit policy set ID is not specified in a risk evaluation request.")
                    .with_plan_modifier(UseStateForUnknown),
            )
            .with_attribute(
                "evaluated_predictors",
                Attribute::string_set(AttributeMode::OptionalComputed)
                    .with_description("A set of IDs for the predictors to evaluate in this policy set.  If omitted, all of the licensed predictors are used.")
                    .with_plan_modifier(UseStateForUnknown),
            )
            .with_attribute(WEIGHTS, policy_schema(WEIGHTS))
            .with_attribute(SCORES, policy_schema(SCORES))
    }

    fn import_components() -> Vec<ImportComponent> {
        vec![
            ImportComponent::resource_id("environment_id"),
            ImportComponent::primary("risk_policy_id"),
        ]
    }

    fn environment_id(model: &Self::Model) -> &Value<String> {
        &model.environment_id
    }

    fn id(model: &Self::Model) -> &Value<String> {
        &model.id
    }

    fn modify_plan(config: &Tree, state: Option<&Tree>, plan: &mut Tree, diags: &mut Diagnostics) {
        let root = AttributePath::empty();
        let config = RiskPolicyModel::from_tree(config, &root, diags);
        let prior = state.map(|s| RiskPolicyModel::from_tree(s, &root, diags));
        let mut planned = RiskPolicyModel::from_tree(plan, &root, diags);
        if diags.has_error() {
            return;
        }

        Self::plan_model(&config, prior.as_ref(), &mut planned);
        *plan = planned.to_tree();
    }

    fn expand(model: &Self::Model, diags: &mut Diagnostics) -> Option<Self::Dto> {
        let name = model.name.expand_required(&AttributePath::root("name"), diags)?;

        let default_result = model
            .default_result
            .expand_optional()
            .and_then(|r| r.level.expand_optional())
            .and_then(|level| RiskLevel::parse(level))
            .map(LevelResult::value);

        let risk_policies = match (&model.policy_weights, &model.policy_scores) {
            (Value::Known(weights), _) => {
                let path = AttributePath::root(WEIGHTS);
                let high = Self::expand_threshold(
                    &weights.policy_threshold_high,
                    &path.at_name("policy_threshold_high"),
                    Some(WEIGHTS_MAX_SCORE),
                    diags,
                )?;
                let medium = Self::expand_threshold(
                    &weights.policy_threshold_medium,
                    &path.at_name("policy_threshold_medium"),
                    Some(high.min_score),
                    diags,
                )?;
                let aggregated = weights
                    .predictors
                    .expand_required(&path.at_name("predictors"), diags)?
                    .iter()
                    .filter_map(|p| {
                        Some(AggregatedWeight {
                            value: weight_reference(p.compact_name.as_known()?),
                            weight: *p.weight.as_known()?,
                        })
                    })
                    .collect();
                Self::conditions(CONDITION_AGGREGATED_WEIGHTS, (medium, high), aggregated, Vec::new())
            }
            (_, Value::Known(scores)) => {
                let path = AttributePath::root(SCORES);
                let high = Self::expand_threshold(
                    &scores.policy_threshold_high,
                    &path.at_name("policy_threshold_high"),
                    Some(SCORES_MAX_SCORE),
                    diags,
                )?;
                let medium = Self::expand_threshold(
                    &scores.policy_threshold_medium,
                    &path.at_name("policy_threshold_medium"),
                    Some(high.min_score),
                    diags,
                )?;
                let aggregated = scores
                    .predictors
                    .expand_required(&path.at_name("predictors"), diags)?
                    .iter()
                    .filter_map(|p| {
                        Some(AggregatedScore {
                            value: score_reference(p.compact_name.as_known()?),
                            score: *p.score.as_known()?,
                        })
                    })
                    .collect();
                Self::conditions(CONDITION_AGGREGATED_SCORES, (medium, high), Vec::new(), aggregated)
            }
            _ => {
                diags.add_error(
                    "Invalid Attribute Combination",
                    format!("exactly one of [{WEIGHTS}, {SCORES}] must be configured"),
                );
                return None;
            }
        };

        let evaluated_predictors = model
            .evaluated_predictors
            .expand_optional()
            .map(|ids| ids.iter().map(ObjectReference::new).collect())
            .unwrap_or_default();

        Some(RiskPolicySet {
            id: None,
            name: name.clone(),
            default: Some(model.default.expand_optional().copied().unwrap_or(false)),
            default_result,
            evaluated_predictors,
            risk_policies,
        })
    }

    fn flatten(model: &mut Self::Model, dto: &Self::Dto, _diags: &mut Diagnostics) {
        model.id = resource_id_ok_to_tf(dto.id.as_deref());
        model.name = string_to_tf(&dto.name);
        model.default = bool_ok_to_tf(dto.default);
        model.default_result = dto.default_result.as_ref().map_or(Value::Null, |r| {
            Value::Known(DefaultResultModel {
                level: enum_ok_to_tf(Some(&r.level)),
                result_type: string_to_tf(&r.result_type),
            })
        });
        model.evaluated_predictors = Value::Known(dto.evaluated_predictors.iter().map(|p| p.id.clone()).collect());

        let aggregated: Vec<&RiskPolicyDto> = dto
            .risk_policies
            .iter()
            .filter(|p| {
                p.condition.condition_type == CONDITION_AGGREGATED_WEIGHTS
                    || p.condition.condition_type == CONDITION_AGGREGATED_SCORES
            })
            .collect();
        let by_level = |level: RiskLevel| aggregated.iter().find(|p| p.result.level == level);

        model.policy_weights = Value::Null;
        model.policy_scores = Value::Null;
        let (Some(medium), Some(high)) = (by_level(RiskLevel::Medium), by_level(RiskLevel::High)) else {
            return;
        };

        let medium_threshold = Self::flatten_threshold(&medium.condition);
        let high_threshold = Self::flatten_threshold(&high.condition);
        let condition = &high.condition;

        if condition.condition_type == CONDITION_AGGREGATED_SCORES {
            model.policy_scores = Value::Known(ScoresPolicyModel {
                policy_threshold_medium: medium_threshold,
                policy_threshold_high: high_threshold,
                predictors: Value::Known(
                    condition
                        .aggregated_scores
                        .iter()
                        .map(|s| ScoredPredictorModel {
                            compact_name: Value::from_option(
                                compact_name_from_reference(&s.value, true).map(str::to_string),
                            ),
                            predictor_reference_value: string_to_tf(&s.value),
                            score: Value::Known(s.score),
                        })
                        .collect(),
                ),
            });
        } else {
            model.policy_weights = Value::Known(WeightsPolicyModel {
                policy_threshold_medium: medium_threshold,
                policy_threshold_high: high_threshold,
                predictors: Value::Known(
                    condition
                        .aggregated_weights
                        .iter()
                        .map(|w| WeightedPredictorModel {
                            compact_name: Value::from_option(
                                compact_name_from_reference(&w.value, false).map(str::to_string),
                            ),
                            predictor_reference_value: string_to_tf(&w.value),
                            weight: Value::Known(w.weight),
                        })
                        .collect(),
                ),
            });
        }
    }

    fn write_custom_error() -> CustomError {
        custom_error_invalid_composition
    }

    async fn create_call(api: &ApiClient, model: &Self::Model, dto: &Self::Dto) -> SdkResponse<Self::Dto> {
        api.create_risk_policy_set(text(&model.environment_id), dto).await
    }

    async fn read_call(api: &ApiClient, model: &Self::Model) -> SdkResponse<Self::Dto> {
        api.read_one_risk_policy_set(text(&model.environment_id), text(&model.id))
            .await
    }

    async fn update_call(api: &ApiClient, model: &Self::Model, dto: &Self::Dto) -> SdkResponse<Self::Dto> {
        api.update_risk_policy_set(text(&model.environment_id), text(&model.id), dto)
            .await
    }

    async fn delete_call(api: &ApiClient, model: &Self::Model) -> SdkResponse<()> {
        api.delete_risk_policy_set(text(&model.environment_id), text(&model.id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::AttrValue;
    use crate::resource::testing::{ENV, ID, provider, stored, tree};
    use crate::resource::{Dispatcher, Resource};
    use crate::sdk::OpContext;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn weights_config(medium: i64, high: i64) -> serde_json::Value {
        json!({
            "environment_id": ENV,
            "name": "Weighted policy",
            "policy_weights": {
                "policy_threshold_medium": {"min_score": medium},
                "policy_threshold_high": {"min_score": high},
                "predictors": [
                    {"compact_name": "anonymousNetwork", "weight": 5},
                    {"compact_name": "geoVelocity", "weight": 3}
                ]
            }
        })
    }

    fn planned(schema: &Schema, config: &Tree, state: Option<&Tree>) -> (Tree, Diagnostics) {
        let mut plan = config.clone();
        for (name, attr) in &schema.attributes {
            if attr.mode.is_computed() && plan.get(name).is_null() {
                let prior = state.map_or(AttrValue::Unknown, |s| s.get(name).clone());
                plan.insert(name.clone(), prior);
            }
        }
        let mut diags = Diagnostics::new();
        RiskPolicy::modify_plan(config, state, &mut plan, &mut diags);
        (plan, diags)
    }

    #[test]
    fn test_threshold_ordering_violated() {
        let schema = RiskPolicy::schema();
        let config = tree(&schema, weights_config(60, 50));

        let diags = schema.validate_config(&config);
        let paths: Vec<String> = diags
            .errors()
            .filter_map(|d| d.attribute.as_ref().map(ToString::to_string))
            .collect();
        assert_eq!(diags.error_count(), 2, "{diags:?}");
        assert!(paths.contains(&"policy_weights.policy_threshold_medium.min_score".to_string()));
        assert!(paths.contains(&"policy_weights.policy_threshold_high.min_score".to_string()));
    }

    #[test]
    fn test_weights_must_be_divisible_by_ten() {
        let schema = RiskPolicy::schema();
        let diags = schema.validate_config(&tree(&schema, weights_config(45, 70)));
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn test_exactly_one_policy_kind() {
        let schema = RiskPolicy::schema();
        let mut json = weights_config(40, 70);
        json.as_object_mut().expect("object").remove("policy_weights");
        let diags = schema.validate_config(&tree(&schema, json));
        assert!(diags.iter().any(|d| d.summary == "Invalid Attribute Combination"));
    }

    #[test]
    fn test_plan_derives_references_and_bounds() {
        let schema = RiskPolicy::schema();
        let config = tree(&schema, weights_config(40, 70));
        let (plan, diags) = planned(&schema, &config, None);
        assert!(diags.is_empty(), "{diags:?}");

        let mut diags = Diagnostics::new();
        let model = RiskPolicyModel::from_tree(&plan, &AttributePath::empty(), &mut diags);
        let weights = model.policy_weights.as_known().expect("weights");
        let medium = weights.policy_threshold_medium.as_known().expect("medium");
        let high = weights.policy_threshold_high.as_known().expect("high");
        assert_eq!(medium.max_score, Value::Known(70));
        assert_eq!(high.max_score, Value::Known(WEIGHTS_MAX_SCORE));

        let references: Vec<&str> = weights
            .predictors
            .as_known()
            .expect("predictors")
            .iter()
            .filter_map(|p| p.predictor_reference_value.as_str())
            .collect();
        assert!(references.contains(&"${details.aggregatedWeights.anonymousNetwork}"));
        assert_eq!(
            model.default_result.as_known().and_then(|r| r.level.as_str()),
            Some("LOW")
        );
    }

    #[test]
    fn test_changed_predictors_unknown_evaluated_predictors() {
        let schema = RiskPolicy::schema();
        let config = tree(&schema, weights_config(40, 70));
        let (mut state, _) = planned(&schema, &config, None);
        state.insert("evaluated_predictors", AttrValue::Set(vec!["p1".into(), "p2".into()]));

        let (plan, _) = planned(&schema, &config, Some(&state));
        assert_eq!(plan.get("evaluated_predictors"), state.get("evaluated_predictors"));

        let mut changed = weights_config(40, 70);
        changed["policy_weights"]["predictors"][1]["compact_name"] = json!("ipRisk");
        let (plan, _) = planned(&schema, &tree(&schema, changed), Some(&state));
        assert!(plan.get("evaluated_predictors").is_unknown());
    }

    #[test]
    fn test_compact_name_from_reference() {
        assert_eq!(
            compact_name_from_reference("${details.aggregatedWeights.geoVelocity}", false),
            Some("geoVelocity")
        );
        assert_eq!(compact_name_from_reference("${details.geoVelocity.level}", true), Some("geoVelocity"));
        assert_eq!(compact_name_from_reference("${transaction.ip}", true), None);
    }

    #[tokio::test]
    async fn test_create_sends_both_policies() {
        let server = MockServer::start().await;
        let weights = json!([
            {"value": "${details.aggregatedWeights.anonymousNetwork}", "weight": 5},
            {"value": "${details.aggregatedWeights.geoVelocity}", "weight": 3}
        ]);
        let response = json!({
            "id": ID,
            "name": "Weighted policy",
            "default": false,
            "defaultResult": {"level": "LOW", "type": "VALUE"},
            "evaluatedPredictors": [{"id": "p1"}, {"id": "p2"}],
            "riskPolicies": [
                {
                    "name": MEDIUM_WEIGHTED_POLICY,
                    "result": {"level": "MEDIUM", "type": "VALUE"},
                    "condition": {"type": "AGGREGATED_WEIGHTS", "between": {"minScore": 40, "maxScore": 70}, "aggregatedWeights": weights}
                },
                {
                    "name": HIGH_WEIGHTED_POLICY,
                    "result": {"level": "HIGH", "type": "VALUE"},
                    "condition": {"type": "AGGREGATED_WEIGHTS", "between": {"minScore": 70, "maxScore": 100}, "aggregatedWeights": weights}
                }
            ]
        });
        Mock::given(method("POST"))
            .and(path(format!("/environments/{ENV}/riskPolicySets")))
            .and(body_partial_json(json!({
                "riskPolicies": [
                    {"name": MEDIUM_WEIGHTED_POLICY, "condition": {"between": {"minScore": 40, "maxScore": 70}}},
                    {"name": HIGH_WEIGHTED_POLICY, "condition": {"between": {"minScore": 70, "maxScore": 100}}}
                ]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(response))
            .expect(1)
            .mount(&server)
            .await;

        let resource = Dispatcher::<RiskPolicy>::new(provider(&server));
        let config = tree(resource.schema(), weights_config(40, 70));
        let (plan, _) = planned(resource.schema(), &config, None);

        let result = resource.create(&OpContext::new(), &plan).await;
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        let stored = stored(&result);
        assert_eq!(stored.get("id").as_str(), Some(ID));
        assert!(stored.get("policy_scores").is_null());

        // Refreshing the created object against an unchanged server plans no change.
        let (replanned, _) = planned(resource.schema(), &config, Some(stored));
        assert_eq!(&replanned, stored);
    }
}
