//! Offline evaluation harness
//!
//! Aggregates per-user pipeline outputs into population-level quality
//! metrics for monitoring and regression testing. Runs in a separate
//! offline pass and never participates in the per-user request path.
//! Every ratio is defined as 0 when its denominator is 0.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::guardrails::{GuardrailDecision, GuardrailOutcome};
use crate::personas::{PersonaAssignment, PersonaKind};
use crate::recommend::{RecommendationCandidate, RecommendationKind};
use crate::signals::Signal;

/// Recorded user feedback on a delivered recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub candidate_id: String,
    pub helpful: bool,
}

/// A candidate paired with its guardrail decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationOutcome {
    pub candidate: RecommendationCandidate,
    pub decision: GuardrailDecision,
}

impl RecommendationOutcome {
    /// Only eligible candidates are surfaced to end-user-facing consumers
    pub fn delivered(&self) -> bool {
        self.decision.outcome == GuardrailOutcome::Eligible
    }
}

/// The persisted output of one user's pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPipelineOutput {
    pub user_id: String,
    pub consent_granted: bool,
    pub window_days: u32,
    pub signals: Vec<Signal>,
    pub assignments: Vec<PersonaAssignment>,
    pub recommendations: Vec<RecommendationOutcome>,
    #[serde(default)]
    pub feedback: Vec<FeedbackRecord>,
}

impl UserPipelineOutput {
    /// Primary persona: the rank-1 assignment, if any
    pub fn primary_persona(&self) -> Option<PersonaKind> {
        self.assignments
            .iter()
            .find(|a| a.rank == 1)
            .map(|a| a.persona)
    }
}

/// Population-level quality metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub user_count: usize,
    pub candidate_count: usize,
    /// Fraction of delivered recommendations marked helpful by feedback
    pub relevance_score: f64,
    /// Distinct delivered kinds over the total kind count
    pub diversity_score: f64,
    /// Fraction of users with at least one eligible recommendation
    pub coverage_rate: f64,
    /// Dispersion of delivered-kind distributions across persona groups
    pub personalization_score: f64,
    /// Fraction of candidates marked eligible by the guardrail filter
    pub eligibility_rate: f64,
    /// Fraction of users with granted consent
    pub consent_rate: f64,
    /// Fraction of users with at least one detected signal
    pub signal_detection_rate: f64,
}

/// 0 when the denominator is 0, never NaN and never an error
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Score a population of pipeline outputs
pub fn evaluate(outputs: &[UserPipelineOutput]) -> EvaluationReport {
    let user_count = outputs.len();
    let candidate_count: usize = outputs.iter().map(|o| o.recommendations.len()).sum();

    let delivered: Vec<(&UserPipelineOutput, &RecommendationOutcome)> = outputs
        .iter()
        .flat_map(|o| o.recommendations.iter().filter(|r| r.delivered()).map(move |r| (o, r)))
        .collect();

    let helpful = delivered
        .iter()
        .filter(|(output, rec)| {
            output
                .feedback
                .iter()
                .any(|f| f.helpful && f.candidate_id == rec.candidate.id)
        })
        .count();
    let relevance_score = ratio(helpful, delivered.len());

    let distinct_kinds: HashSet<RecommendationKind> =
        delivered.iter().map(|(_, r)| r.candidate.kind).collect();
    let diversity_score = ratio(distinct_kinds.len(), RecommendationKind::all().len());

    let covered_users = outputs
        .iter()
        .filter(|o| o.recommendations.iter().any(|r| r.delivered()))
        .count();
    let coverage_rate = ratio(covered_users, user_count);

    let eligible_count = delivered.len();
    let eligibility_rate = ratio(eligible_count, candidate_count);

    let consented = outputs.iter().filter(|o| o.consent_granted).count();
    let consent_rate = ratio(consented, user_count);

    let with_signals = outputs.iter().filter(|o| !o.signals.is_empty()).count();
    let signal_detection_rate = ratio(with_signals, user_count);

    EvaluationReport {
        user_count,
        candidate_count,
        relevance_score,
        diversity_score,
        coverage_rate,
        personalization_score: personalization(outputs),
        eligibility_rate,
        consent_rate,
        signal_detection_rate,
    }
}

/// Mean pairwise total-variation distance between the delivered-kind
/// distributions of distinct primary-persona groups.
///
/// 1.0 means persona groups receive completely disjoint recommendation
/// mixes; 0.0 means every group gets the same mix (or fewer than two
/// groups have deliveries to compare).
fn personalization(outputs: &[UserPipelineOutput]) -> f64 {
    // kind -> count per persona group, BTreeMap for deterministic iteration
    let mut groups: BTreeMap<PersonaKind, BTreeMap<RecommendationKind, usize>> = BTreeMap::new();

    for output in outputs {
        let Some(persona) = output.primary_persona() else {
            continue;
        };
        for rec in output.recommendations.iter().filter(|r| r.delivered()) {
            *groups
                .entry(persona)
                .or_default()
                .entry(rec.candidate.kind)
                .or_insert(0) += 1;
        }
    }

    let distributions: Vec<BTreeMap<RecommendationKind, f64>> = groups
        .values()
        .filter(|counts| !counts.is_empty())
        .map(|counts| {
            let total: usize = counts.values().sum();
            counts
                .iter()
                .map(|(kind, count)| (*kind, *count as f64 / total as f64))
                .collect()
        })
        .collect();

    if distributions.len() < 2 {
        return 0.0;
    }

    let mut total_distance = 0.0;
    let mut pairs = 0usize;
    for i in 0..distributions.len() {
        for j in (i + 1)..distributions.len() {
            total_distance += total_variation(&distributions[i], &distributions[j]);
            pairs += 1;
        }
    }
    total_distance / pairs as f64
}

/// Total variation distance between two kind distributions
fn total_variation(
    p: &BTreeMap<RecommendationKind, f64>,
    q: &BTreeMap<RecommendationKind, f64>,
) -> f64 {
    RecommendationKind::all()
        .iter()
        .map(|kind| {
            let pv = p.get(kind).copied().unwrap_or(0.0);
            let qv = q.get(kind).copied().unwrap_or(0.0);
            (pv - qv).abs()
        })
        .sum::<f64>()
        / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::personas::CriterionMeasurement;
    use crate::signals::SignalDetail;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 30).unwrap()
    }

    fn assignment(persona: PersonaKind) -> PersonaAssignment {
        PersonaAssignment {
            user_id: "u".to_string(),
            window_days: 90,
            persona,
            rank: 1,
            criteria: vec![CriterionMeasurement {
                criterion: "test".to_string(),
                measured: 0.0,
                threshold: 0.0,
            }],
            assigned_at: as_of(),
        }
    }

    fn outcome(id: &str, kind: RecommendationKind, outcome: GuardrailOutcome) -> RecommendationOutcome {
        RecommendationOutcome {
            candidate: RecommendationCandidate {
                id: id.to_string(),
                user_id: "u".to_string(),
                kind,
                persona: PersonaKind::HighUtilization,
                rationale: "test".to_string(),
                params: serde_json::Value::Null,
            },
            decision: GuardrailDecision {
                candidate_id: id.to_string(),
                outcome,
                rule: "passed".to_string(),
                explanation: "test".to_string(),
            },
        }
    }

    fn any_signal() -> Signal {
        let detail = SignalDetail::CreditUtilization { accounts: vec![] };
        Signal {
            user_id: "u".to_string(),
            kind: detail.kind(),
            value: 0.6,
            detail,
            computed_at: as_of(),
            dedup_key: "test".to_string(),
        }
    }

    fn user(
        id: &str,
        consent: bool,
        persona: Option<PersonaKind>,
        recommendations: Vec<RecommendationOutcome>,
        feedback: Vec<FeedbackRecord>,
    ) -> UserPipelineOutput {
        UserPipelineOutput {
            user_id: id.to_string(),
            consent_granted: consent,
            window_days: 90,
            signals: if persona.is_some() { vec![any_signal()] } else { vec![] },
            assignments: persona.map(assignment).into_iter().collect(),
            recommendations,
            feedback,
        }
    }

    #[test]
    fn test_empty_population_yields_all_zero_rates() {
        let report = evaluate(&[]);
        assert_eq!(report.user_count, 0);
        assert_eq!(report.relevance_score, 0.0);
        assert_eq!(report.diversity_score, 0.0);
        assert_eq!(report.coverage_rate, 0.0);
        assert_eq!(report.personalization_score, 0.0);
        assert_eq!(report.eligibility_rate, 0.0);
        assert_eq!(report.consent_rate, 0.0);
        assert_eq!(report.signal_detection_rate, 0.0);
        // None of the ratios may be NaN
        assert!(!report.relevance_score.is_nan());
    }

    #[test]
    fn test_basic_rates() {
        let users = vec![
            user(
                "u1",
                true,
                Some(PersonaKind::HighUtilization),
                vec![
                    outcome("c1", RecommendationKind::PayDownBalance, GuardrailOutcome::Eligible),
                    outcome(
                        "c2",
                        RecommendationKind::IncreaseCreditLine,
                        GuardrailOutcome::Ineligible,
                    ),
                ],
                vec![FeedbackRecord {
                    candidate_id: "c1".to_string(),
                    helpful: true,
                }],
            ),
            user("u2", false, None, vec![], vec![]),
        ];

        let report = evaluate(&users);
        assert_eq!(report.user_count, 2);
        assert_eq!(report.candidate_count, 2);
        assert_eq!(report.eligibility_rate, 0.5);
        assert_eq!(report.coverage_rate, 0.5);
        assert_eq!(report.consent_rate, 0.5);
        assert_eq!(report.signal_detection_rate, 0.5);
        assert_eq!(report.relevance_score, 1.0); // 1 delivered, 1 helpful
        // 1 distinct delivered kind out of the full kind set
        assert_eq!(
            report.diversity_score,
            1.0 / RecommendationKind::all().len() as f64
        );
    }

    #[test]
    fn test_relevance_counts_only_delivered() {
        // Helpful feedback on an ineligible candidate does not count
        let users = vec![user(
            "u1",
            true,
            Some(PersonaKind::HighUtilization),
            vec![
                outcome("c1", RecommendationKind::PayDownBalance, GuardrailOutcome::Eligible),
                outcome(
                    "c2",
                    RecommendationKind::IncreaseCreditLine,
                    GuardrailOutcome::Ineligible,
                ),
            ],
            vec![FeedbackRecord {
                candidate_id: "c2".to_string(),
                helpful: true,
            }],
        )];
        let report = evaluate(&users);
        assert_eq!(report.relevance_score, 0.0);
    }

    #[test]
    fn test_personalization_disjoint_groups_score_one() {
        let users = vec![
            user(
                "u1",
                true,
                Some(PersonaKind::HighUtilization),
                vec![outcome("c1", RecommendationKind::PayDownBalance, GuardrailOutcome::Eligible)],
                vec![],
            ),
            user(
                "u2",
                true,
                Some(PersonaKind::SavingsBuilder),
                vec![outcome(
                    "c2",
                    RecommendationKind::OpenHighYieldSavings,
                    GuardrailOutcome::Eligible,
                )],
                vec![],
            ),
        ];
        let report = evaluate(&users);
        assert!((report.personalization_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_personalization_identical_groups_score_zero() {
        let users = vec![
            user(
                "u1",
                true,
                Some(PersonaKind::HighUtilization),
                vec![outcome("c1", RecommendationKind::PayDownBalance, GuardrailOutcome::Eligible)],
                vec![],
            ),
            user(
                "u2",
                true,
                Some(PersonaKind::SavingsBuilder),
                vec![outcome("c2", RecommendationKind::PayDownBalance, GuardrailOutcome::Eligible)],
                vec![],
            ),
        ];
        let report = evaluate(&users);
        assert_eq!(report.personalization_score, 0.0);
    }

    #[test]
    fn test_single_group_personalization_is_zero() {
        let users = vec![user(
            "u1",
            true,
            Some(PersonaKind::HighUtilization),
            vec![outcome("c1", RecommendationKind::PayDownBalance, GuardrailOutcome::Eligible)],
            vec![],
        )];
        let report = evaluate(&users);
        assert_eq!(report.personalization_score, 0.0);
    }
}
