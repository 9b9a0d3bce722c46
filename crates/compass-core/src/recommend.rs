//! Recommendation generation
//!
//! Maps persona assignments to candidate recommendations, binding template
//! parameters from the signal evidence that justified each assignment. The
//! persona → template mapping is an exhaustive match over the closed persona
//! enum so adding a persona forces every consumer to be updated.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::personas::{PersonaAssignment, PersonaKind};
use crate::signals::{Signal, SignalDetail, SignalKind};

/// Recommendation kinds the generator can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    PayDownBalance,
    IncreaseCreditLine,
    BuildEmergencyFund,
    ReviewSubscriptions,
    AutomateSavings,
    OpenHighYieldSavings,
}

impl RecommendationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PayDownBalance => "pay_down_balance",
            Self::IncreaseCreditLine => "increase_credit_line",
            Self::BuildEmergencyFund => "build_emergency_fund",
            Self::ReviewSubscriptions => "review_subscriptions",
            Self::AutomateSavings => "automate_savings",
            Self::OpenHighYieldSavings => "open_high_yield_savings",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::PayDownBalance => "Pay Down Balance",
            Self::IncreaseCreditLine => "Increase Credit Line",
            Self::BuildEmergencyFund => "Build Emergency Fund",
            Self::ReviewSubscriptions => "Review Subscriptions",
            Self::AutomateSavings => "Automate Savings",
            Self::OpenHighYieldSavings => "Open High-Yield Savings",
        }
    }

    /// All kinds, used to normalize the diversity metric
    pub fn all() -> &'static [RecommendationKind] {
        &[
            Self::PayDownBalance,
            Self::IncreaseCreditLine,
            Self::BuildEmergencyFund,
            Self::ReviewSubscriptions,
            Self::AutomateSavings,
            Self::OpenHighYieldSavings,
        ]
    }
}

impl std::fmt::Display for RecommendationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RecommendationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pay_down_balance" => Ok(Self::PayDownBalance),
            "increase_credit_line" => Ok(Self::IncreaseCreditLine),
            "build_emergency_fund" => Ok(Self::BuildEmergencyFund),
            "review_subscriptions" => Ok(Self::ReviewSubscriptions),
            "automate_savings" => Ok(Self::AutomateSavings),
            "open_high_yield_savings" => Ok(Self::OpenHighYieldSavings),
            _ => Err(format!("Unknown recommendation kind: {}", s)),
        }
    }
}

/// A candidate recommendation, before guardrail filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationCandidate {
    /// Stable id derived from (user, kind); identical across reruns
    pub id: String,
    pub user_id: String,
    pub kind: RecommendationKind,
    /// The persona whose template produced this candidate
    pub persona: PersonaKind,
    pub rationale: String,
    /// Template parameters bound from signal evidence
    pub params: serde_json::Value,
}

impl RecommendationCandidate {
    fn new(
        user_id: &str,
        kind: RecommendationKind,
        persona: PersonaKind,
        rationale: String,
        params: serde_json::Value,
    ) -> Self {
        Self {
            id: candidate_id(user_id, kind),
            user_id: user_id.to_string(),
            kind,
            persona,
            rationale,
            params,
        }
    }
}

/// Hash (user, kind) down to a stable candidate id
fn candidate_id(user_id: &str, kind: RecommendationKind) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b"|");
    hasher.update(kind.as_str().as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

/// Generate the candidate set for a user's persona assignments.
///
/// A user with multiple personas receives the union of all templates,
/// deduplicated by kind: the first occurrence in priority order wins.
/// Output order follows persona rank, then template declaration order.
pub fn generate(
    user_id: &str,
    assignments: &[PersonaAssignment],
    signals: &[Signal],
) -> Vec<RecommendationCandidate> {
    let mut ordered: Vec<&PersonaAssignment> = assignments.iter().collect();
    ordered.sort_by_key(|a| a.rank);

    let mut seen: HashSet<RecommendationKind> = HashSet::new();
    let mut candidates = vec![];
    for assignment in ordered {
        for candidate in templates_for(user_id, assignment.persona, signals) {
            if seen.insert(candidate.kind) {
                candidates.push(candidate);
            }
        }
    }
    candidates
}

/// Static persona → template mapping with parameter binding
fn templates_for(
    user_id: &str,
    persona: PersonaKind,
    signals: &[Signal],
) -> Vec<RecommendationCandidate> {
    match persona {
        PersonaKind::HighUtilization => {
            let utilization = signal_value(signals, SignalKind::CreditUtilization);
            let accounts = utilization_accounts(signals);
            let percent = utilization.unwrap_or(0.0) * 100.0;
            vec![
                RecommendationCandidate::new(
                    user_id,
                    RecommendationKind::PayDownBalance,
                    persona,
                    format!(
                        "Your peak credit utilization is {:.0}%. Paying down the balance \
                         lowers interest costs and improves your credit profile.",
                        percent
                    ),
                    json!({ "utilization": utilization, "accounts": accounts }),
                ),
                RecommendationCandidate::new(
                    user_id,
                    RecommendationKind::IncreaseCreditLine,
                    persona,
                    format!(
                        "A higher credit limit would reduce your {:.0}% utilization, \
                         if your issuer approves an increase.",
                        percent
                    ),
                    json!({ "utilization": utilization }),
                ),
            ]
        }
        PersonaKind::VariableIncome => {
            let gap = signal_value(signals, SignalKind::IncomeStability);
            let savings_rate = signal_value(signals, SignalKind::SavingsGrowth);
            vec![
                RecommendationCandidate::new(
                    user_id,
                    RecommendationKind::BuildEmergencyFund,
                    persona,
                    format!(
                        "Your deposits arrive about every {:.0} days. An emergency fund \
                         covering 3 months of expenses smooths the gaps between paydays.",
                        gap.unwrap_or(0.0)
                    ),
                    json!({ "median_gap_days": gap, "buffer_months": 3 }),
                ),
                RecommendationCandidate::new(
                    user_id,
                    RecommendationKind::AutomateSavings,
                    persona,
                    "Scheduling a transfer on each payday sets money aside before \
                     irregular income gets absorbed into spending."
                        .to_string(),
                    json!({ "monthly_rate": savings_rate }),
                ),
            ]
        }
        PersonaKind::SubscriptionHeavy => {
            let subscriptions = subscription_evidence(signals);
            let monthly_total: f64 = subscriptions.iter().map(|(_, v)| v).sum();
            let merchants: Vec<&str> = subscriptions.iter().map(|(m, _)| m.as_str()).collect();
            vec![RecommendationCandidate::new(
                user_id,
                RecommendationKind::ReviewSubscriptions,
                persona,
                format!(
                    "You have {} recurring subscriptions totaling ${:.2}/month. \
                     Reviewing them may surface services you no longer use.",
                    merchants.len(),
                    monthly_total
                ),
                json!({
                    "subscription_count": merchants.len(),
                    "monthly_total": monthly_total,
                    "merchants": merchants,
                }),
            )]
        }
        PersonaKind::SavingsBuilder => {
            let rate = signal_value(signals, SignalKind::SavingsGrowth);
            let monthly = rate.unwrap_or(0.0);
            vec![
                RecommendationCandidate::new(
                    user_id,
                    RecommendationKind::AutomateSavings,
                    persona,
                    format!(
                        "You're already saving about ${:.0}/month. Automating the \
                         transfer locks in the habit.",
                        monthly
                    ),
                    json!({ "monthly_rate": rate }),
                ),
                RecommendationCandidate::new(
                    user_id,
                    RecommendationKind::OpenHighYieldSavings,
                    persona,
                    format!(
                        "At ${:.0}/month of growth, a high-yield account would earn \
                         meaningfully more interest on the balance.",
                        monthly
                    ),
                    json!({ "monthly_rate": rate }),
                ),
            ]
        }
    }
}

/// Value of the most recent signal of a kind, if any
fn signal_value(signals: &[Signal], kind: SignalKind) -> Option<f64> {
    signals
        .iter()
        .enumerate()
        .filter(|(_, s)| s.kind == kind)
        .max_by_key(|(i, s)| (s.computed_at, *i))
        .map(|(_, s)| s.value)
}

/// Account ids from the utilization signal, riskiest first
fn utilization_accounts(signals: &[Signal]) -> Vec<String> {
    signals
        .iter()
        .find(|s| s.kind == SignalKind::CreditUtilization)
        .map(|s| match &s.detail {
            SignalDetail::CreditUtilization { accounts } => {
                accounts.iter().map(|a| a.account_id.clone()).collect()
            }
            _ => vec![],
        })
        .unwrap_or_default()
}

/// (merchant, monthly-equivalent) pairs from subscription signals
fn subscription_evidence(signals: &[Signal]) -> Vec<(String, f64)> {
    signals
        .iter()
        .filter(|s| s.kind == SignalKind::SubscriptionDetected)
        .map(|s| match &s.detail {
            SignalDetail::SubscriptionDetected { merchant, .. } => (merchant.clone(), s.value),
            _ => (String::new(), s.value),
        })
        .collect()
}
