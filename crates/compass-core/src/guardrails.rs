//! Guardrail filtering
//!
//! Applies ordered eligibility predicates to recommendation candidates. The
//! first non-passing predicate decides the outcome: a failed check makes the
//! candidate ineligible, a check that cannot be answered from the available
//! profile data produces needs_review (never a silent pass or fail).
//! Candidates are annotated, not dropped, so callers can audit suppressed
//! recommendations; only eligible decisions reach end-user-facing consumers.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GuardrailConfig;
use crate::models::{IncomeLevel, UserProfile};
use crate::recommend::{RecommendationCandidate, RecommendationKind};
use crate::signals::{Signal, SignalKind};

/// Outcome of guardrail evaluation for one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailOutcome {
    Eligible,
    Ineligible,
    NeedsReview,
}

impl GuardrailOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eligible => "eligible",
            Self::Ineligible => "ineligible",
            Self::NeedsReview => "needs_review",
        }
    }
}

impl std::fmt::Display for GuardrailOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The decision attached to a candidate by the guardrail filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailDecision {
    pub candidate_id: String,
    pub outcome: GuardrailOutcome,
    /// The rule that produced the outcome ("passed" when eligible)
    pub rule: String,
    pub explanation: String,
}

/// Result of one eligibility predicate
enum CheckResult {
    Pass,
    Fail { rule: &'static str, explanation: String },
    Inconclusive { rule: &'static str, explanation: String },
}

/// Evaluate every candidate against its kind's predicate list.
///
/// Every input candidate appears exactly once in the output, paired with
/// its decision, in input order.
pub fn filter(
    candidates: Vec<RecommendationCandidate>,
    profile: &UserProfile,
    signals: &[Signal],
    config: &GuardrailConfig,
) -> Vec<(RecommendationCandidate, GuardrailDecision)> {
    // Peak utilization from the signal set backs the credit-product ceiling
    let max_utilization = signals
        .iter()
        .filter(|s| s.kind == SignalKind::CreditUtilization)
        .map(|s| s.value)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));

    candidates
        .into_iter()
        .map(|candidate| {
            let decision = evaluate(&candidate, profile, max_utilization, config);
            if decision.outcome != GuardrailOutcome::Eligible {
                debug!(
                    candidate = candidate.id.as_str(),
                    kind = candidate.kind.as_str(),
                    outcome = decision.outcome.as_str(),
                    rule = decision.rule.as_str(),
                    "Candidate suppressed by guardrail"
                );
            }
            (candidate, decision)
        })
        .collect()
}

/// Run the ordered predicate list for a candidate's kind
fn evaluate(
    candidate: &RecommendationCandidate,
    profile: &UserProfile,
    max_utilization: Option<f64>,
    config: &GuardrailConfig,
) -> GuardrailDecision {
    let checks = match candidate.kind {
        // New credit products carry the strictest list; the utilization
        // ceiling is evaluated first so an over-extended user is suppressed
        // even when profile data is incomplete
        RecommendationKind::IncreaseCreditLine => vec![
            check_utilization_ceiling(max_utilization, config),
            check_minimum_age(profile, config),
            check_income_floor(profile),
        ],
        RecommendationKind::OpenHighYieldSavings => vec![check_minimum_age(profile, config)],
        RecommendationKind::PayDownBalance
        | RecommendationKind::BuildEmergencyFund
        | RecommendationKind::ReviewSubscriptions
        | RecommendationKind::AutomateSavings => vec![],
    };

    for check in checks {
        match check {
            CheckResult::Pass => continue,
            CheckResult::Fail { rule, explanation } => {
                return GuardrailDecision {
                    candidate_id: candidate.id.clone(),
                    outcome: GuardrailOutcome::Ineligible,
                    rule: rule.to_string(),
                    explanation,
                };
            }
            CheckResult::Inconclusive { rule, explanation } => {
                return GuardrailDecision {
                    candidate_id: candidate.id.clone(),
                    outcome: GuardrailOutcome::NeedsReview,
                    rule: rule.to_string(),
                    explanation,
                };
            }
        }
    }

    GuardrailDecision {
        candidate_id: candidate.id.clone(),
        outcome: GuardrailOutcome::Eligible,
        rule: "passed".to_string(),
        explanation: "All eligibility checks passed".to_string(),
    }
}

/// No additional credit products at or above the utilization ceiling
fn check_utilization_ceiling(max_utilization: Option<f64>, config: &GuardrailConfig) -> CheckResult {
    match max_utilization {
        Some(utilization) if utilization >= config.utilization_ceiling => CheckResult::Fail {
            rule: "utilization_ceiling",
            explanation: format!(
                "Measured utilization {:.0}% is at or above the {:.0}% ceiling for \
                 additional credit products",
                utilization * 100.0,
                config.utilization_ceiling * 100.0
            ),
        },
        // No utilization signal means no measured credit risk to gate on
        _ => CheckResult::Pass,
    }
}

fn check_minimum_age(profile: &UserProfile, config: &GuardrailConfig) -> CheckResult {
    match profile.age {
        None => CheckResult::Inconclusive {
            rule: "minimum_age",
            explanation: "Profile is missing age; cannot verify the product age minimum"
                .to_string(),
        },
        Some(age) if age < config.min_age => CheckResult::Fail {
            rule: "minimum_age",
            explanation: format!(
                "User age {} is below the product minimum of {}",
                age, config.min_age
            ),
        },
        Some(_) => CheckResult::Pass,
    }
}

fn check_income_floor(profile: &UserProfile) -> CheckResult {
    match profile.income_level {
        None => CheckResult::Inconclusive {
            rule: "income_floor",
            explanation: "Profile is missing income level; cannot verify credit product \
                          eligibility"
                .to_string(),
        },
        Some(IncomeLevel::Low) => CheckResult::Fail {
            rule: "income_floor",
            explanation: "Additional credit products are not recommended at a low income level"
                .to_string(),
        },
        Some(_) => CheckResult::Pass,
    }
}
