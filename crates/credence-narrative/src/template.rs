//! Prompt construction, cache keys and the local fallback narrative.

use sha2::{Digest, Sha256};

use crate::NarrativeRequest;

/// System instruction sent with every completion request.
pub const SYSTEM_PROMPT: &str = "You are a banker's assistant. Provide clear, factual \
explanations of credit risk decisions in 120-180 words.";

fn percent(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}

/// Build the user prompt for the text-generation endpoint.
///
/// Lists at most three positive and two negative factors.
pub fn build_prompt(request: &NarrativeRequest) -> String {
    let mut factors: Vec<String> = request
        .attribution
        .positive
        .iter()
        .take(3)
        .map(|f| format!("- {}: {:.2}", f.feature, f.feature_value))
        .collect();
    factors.extend(
        request
            .attribution
            .negative
            .iter()
            .take(2)
            .map(|f| format!("- {}: {:.2}", f.feature, f.feature_value)),
    );

    let factors_text = if factors.is_empty() {
        "- No specific factors identified".to_string()
    } else {
        factors.join("\n")
    };

    let fraud_text = if request.fraud_detected {
        "FRAUD ALERT: Potential fraud detected. "
    } else {
        ""
    };

    format!(
        "Explain this loan decision for a banker:\n\n\
         Risk Score: {}\n\
         Decision: {}\n\
         {}\n\
         Top Contributing Factors:\n\
         {}\n\n\
         Provide a brief, professional explanation suitable for review by a loan officer. \
         Include key factors and risk assessment.",
        percent(request.risk_score),
        request.decision,
        fraud_text,
        factors_text
    )
}

/// Deterministic narrative used whenever the endpoint is unavailable.
///
/// Total: any request produces a non-empty explanation.
pub fn fallback_narrative(request: &NarrativeRequest) -> String {
    let factors: Vec<&str> = request
        .attribution
        .positive
        .iter()
        .take(2)
        .chain(request.attribution.negative.iter().take(2))
        .map(|f| f.feature.as_str())
        .collect();

    let factors_str = if factors.is_empty() {
        "multiple factors".to_string()
    } else {
        factors.join(", ")
    };

    let fraud_note = if request.fraud_detected {
        "Fraud risk detected. "
    } else {
        ""
    };

    format!(
        "{}Decision: {}. Risk score: {}. Primary factors: {}. \
         Review recommended before final approval.",
        fraud_note,
        request.decision,
        percent(request.risk_score),
        factors_str
    )
}

/// Content-hash key for near-identical requests.
///
/// Keyed on the score, the decision, the fraud flag and the attribution
/// shape (factor counts), not on factor names. The same score can map to
/// different decisions under different thresholds.
pub fn cache_key(request: &NarrativeRequest) -> String {
    let key_data = format!(
        "{:.6}_{}_{}_{}_{}",
        request.risk_score,
        request.decision,
        request.fraud_detected,
        request.attribution.positive.len(),
        request.attribution.negative.len()
    );
    let digest = Sha256::digest(key_data.as_bytes());
    format!("explanation:{}", hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AttributionSummary, FactorSummary};

    fn factor(name: &str, value: f64) -> FactorSummary {
        FactorSummary {
            feature: name.to_string(),
            feature_value: value,
        }
    }

    fn request(positive: Vec<FactorSummary>, negative: Vec<FactorSummary>) -> NarrativeRequest {
        NarrativeRequest {
            attribution: AttributionSummary { positive, negative },
            risk_score: 0.734,
            decision: "DECLINE".to_string(),
            fraud_detected: false,
        }
    }

    #[test]
    fn fallback_names_top_factors() {
        let req = request(
            vec![
                factor("inquiry_density", 2.1),
                factor("delinq_2yrs", 1.0),
                factor("revol_bal", 0.3),
            ],
            vec![factor("annual_inc", 1.4)],
        );
        let text = fallback_narrative(&req);
        assert_eq!(
            text,
            "Decision: DECLINE. Risk score: 73.4%. Primary factors: inquiry_density, \
             delinq_2yrs, annual_inc. Review recommended before final approval."
        );
    }

    #[test]
    fn fallback_without_attribution_mentions_multiple_factors() {
        let mut req = request(vec![], vec![]);
        req.fraud_detected = true;
        let text = fallback_narrative(&req);
        assert!(text.starts_with("Fraud risk detected. Decision: DECLINE."));
        assert!(text.contains("Primary factors: multiple factors."));
    }

    #[test]
    fn prompt_caps_factor_lists() {
        let req = request(
            vec![
                factor("a", 1.0),
                factor("b", 2.0),
                factor("c", 3.0),
                factor("d", 4.0),
            ],
            vec![factor("x", -1.0), factor("y", -2.0), factor("z", -3.0)],
        );
        let prompt = build_prompt(&req);
        assert!(prompt.contains("- c: 3.00"));
        assert!(!prompt.contains("- d: 4.00"));
        assert!(prompt.contains("- y: -2.00"));
        assert!(!prompt.contains("- z: -3.00"));
        assert!(prompt.contains("Risk Score: 73.4%"));
    }

    #[test]
    fn prompt_without_factors_says_so() {
        let prompt = build_prompt(&request(vec![], vec![]));
        assert!(prompt.contains("- No specific factors identified"));
    }

    #[test]
    fn cache_key_tracks_shape_not_names() {
        let a = request(vec![factor("a", 1.0)], vec![]);
        let b = request(vec![factor("b", 9.0)], vec![]);
        let c = request(vec![factor("a", 1.0), factor("b", 1.0)], vec![]);
        assert_eq!(cache_key(&a), cache_key(&b));
        assert_ne!(cache_key(&a), cache_key(&c));
        assert!(cache_key(&a).starts_with("explanation:"));
    }

    #[test]
    fn cache_key_tracks_decision() {
        let decline = request(vec![factor("a", 1.0)], vec![]);
        let mut approve = decline.clone();
        approve.decision = "APPROVE".to_string();
        assert_ne!(cache_key(&decline), cache_key(&approve));
    }
}
