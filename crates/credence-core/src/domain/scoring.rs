//! Scoring results, decisions and attribution payloads.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use credence_narrative::{AttributionSummary, FactorSummary};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Smoothed probability above which a score is high risk.
pub const HIGH_RISK_CUTOFF: f64 = 0.7;

/// Smoothed probability above which a score is medium risk.
pub const MEDIUM_RISK_CUTOFF: f64 = 0.5;

/// Credit decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Approve,
    Decline,
}

impl Decision {
    /// DECLINE iff `probability` is strictly above `threshold`.
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability > threshold {
            Decision::Decline
        } else {
            Decision::Approve
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "APPROVE",
            Decision::Decline => "DECLINE",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Short machine-readable justification attached to a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    HighRiskScore,
    MediumRiskScore,
    LowRiskScore,
    PositiveIndicators,
    NegativeIndicators,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::HighRiskScore => "HIGH_RISK_SCORE",
            ReasonCode::MediumRiskScore => "MEDIUM_RISK_SCORE",
            ReasonCode::LowRiskScore => "LOW_RISK_SCORE",
            ReasonCode::PositiveIndicators => "POSITIVE_INDICATORS",
            ReasonCode::NegativeIndicators => "NEGATIVE_INDICATORS",
        }
    }

    /// Exactly one risk tier, then the indicator codes.
    pub fn derive(probability: f64, explanation: Option<&Explanation>) -> Vec<ReasonCode> {
        let tier = if probability > HIGH_RISK_CUTOFF {
            ReasonCode::HighRiskScore
        } else if probability > MEDIUM_RISK_CUTOFF {
            ReasonCode::MediumRiskScore
        } else {
            ReasonCode::LowRiskScore
        };

        let mut codes = vec![tier];
        if let Some(explanation) = explanation {
            if !explanation.top_positive.is_empty() {
                codes.push(ReasonCode::PositiveIndicators);
            }
            if !explanation.top_negative.is_empty() {
                codes.push(ReasonCode::NegativeIndicators);
            }
        }
        codes
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One feature's signed contribution to the model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub feature: String,
    pub attribution: f64,
    pub feature_value: f64,
}

/// Output of the attribution explainer for one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub base_value: f64,
    /// Highest attributions above zero, descending
    pub top_positive: Vec<Contributor>,
    /// Lowest attributions below zero, ascending
    pub top_negative: Vec<Contributor>,
}

impl Explanation {
    /// Narrative-facing view of the contributors.
    pub fn summary(&self) -> AttributionSummary {
        let factors = |contributors: &[Contributor]| {
            contributors
                .iter()
                .map(|c| FactorSummary {
                    feature: c.feature.clone(),
                    feature_value: c.feature_value,
                })
                .collect()
        };
        AttributionSummary {
            positive: factors(&self.top_positive),
            negative: factors(&self.top_negative),
        }
    }
}

/// Attribution payload returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub base_value: f64,
    /// Raw primary-model probability the contributions explain
    pub model_output: f64,
    pub top_positive: Vec<Contributor>,
    pub top_negative: Vec<Contributor>,
}

impl Attribution {
    pub fn new(explanation: Explanation, model_output: f64) -> Self {
        Self {
            base_value: explanation.base_value,
            model_output,
            top_positive: explanation.top_positive,
            top_negative: explanation.top_negative,
        }
    }
}

/// Result of scoring one feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub request_id: Uuid,
    pub raw_probability: f64,
    pub smoothed_probability: f64,
    pub decision: Decision,
    pub reason_codes: Vec<ReasonCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<Attribution>,
    pub narrative: String,
    pub model_version: String,
    pub threshold: f64,
}

/// Result of scoring a batch; failed instances are dropped from `results`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchScoringResult {
    pub request_id: Uuid,
    pub results: Vec<ScoringResult>,
    pub processed_count: usize,
    pub failed_count: usize,
}

/// One row of the version listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSummary {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub metrics: BTreeMap<String, f64>,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contributor(feature: &str, attribution: f64) -> Contributor {
        Contributor {
            feature: feature.to_string(),
            attribution,
            feature_value: 1.0,
        }
    }

    #[test]
    fn decision_is_strictly_above_threshold() {
        assert_eq!(Decision::from_probability(0.5, 0.5), Decision::Approve);
        assert_eq!(
            Decision::from_probability(0.5 + 1e-9, 0.5),
            Decision::Decline
        );
        assert_eq!(Decision::from_probability(0.0, 0.0), Decision::Approve);
    }

    #[test]
    fn decision_serializes_uppercase() {
        let json = serde_json::to_string(&Decision::Decline).unwrap();
        assert_eq!(json, "\"DECLINE\"");
        assert_eq!(Decision::Approve.to_string(), "APPROVE");
    }

    #[test]
    fn reason_code_tiers() {
        assert_eq!(
            ReasonCode::derive(0.71, None),
            vec![ReasonCode::HighRiskScore]
        );
        assert_eq!(
            ReasonCode::derive(0.6, None),
            vec![ReasonCode::MediumRiskScore]
        );
        assert_eq!(ReasonCode::derive(0.3, None), vec![ReasonCode::LowRiskScore]);
        // boundaries are exclusive
        assert_eq!(ReasonCode::derive(0.7, None), vec![ReasonCode::MediumRiskScore]);
        assert_eq!(ReasonCode::derive(0.5, None), vec![ReasonCode::LowRiskScore]);
    }

    #[test]
    fn reason_codes_follow_attribution_sides() {
        let explanation = Explanation {
            base_value: 0.2,
            top_positive: vec![contributor("dti", 0.1)],
            top_negative: vec![],
        };
        assert_eq!(
            ReasonCode::derive(0.3, Some(&explanation)),
            vec![ReasonCode::LowRiskScore, ReasonCode::PositiveIndicators]
        );

        let both = Explanation {
            top_negative: vec![contributor("annual_inc", -0.05)],
            ..explanation
        };
        assert_eq!(
            ReasonCode::derive(0.9, Some(&both)),
            vec![
                ReasonCode::HighRiskScore,
                ReasonCode::PositiveIndicators,
                ReasonCode::NegativeIndicators
            ]
        );
        assert_eq!(
            serde_json::to_string(&ReasonCode::NegativeIndicators).unwrap(),
            "\"NEGATIVE_INDICATORS\""
        );
    }

    #[test]
    fn explanation_summary_keeps_order() {
        let explanation = Explanation {
            base_value: 0.2,
            top_positive: vec![contributor("a", 0.3), contributor("b", 0.1)],
            top_negative: vec![contributor("c", -0.2)],
        };
        let summary = explanation.summary();
        assert_eq!(summary.positive.len(), 2);
        assert_eq!(summary.positive[0].feature, "a");
        assert_eq!(summary.negative[0].feature, "c");
    }
}
