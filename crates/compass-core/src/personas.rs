//! Persona classification
//!
//! Evaluates eligibility rules against the detected signal set and produces
//! a ranked list of matching personas. Pure function of its input: identical
//! signals yield identical, identically-ordered assignments.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClassifierConfig;
use crate::signals::{Signal, SignalKind};

/// Persona kinds a user can be classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaKind {
    HighUtilization,
    VariableIncome,
    SubscriptionHeavy,
    SavingsBuilder,
}

impl PersonaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighUtilization => "high_utilization",
            Self::VariableIncome => "variable_income",
            Self::SubscriptionHeavy => "subscription_heavy",
            Self::SavingsBuilder => "savings_builder",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::HighUtilization => "High Credit Utilization",
            Self::VariableIncome => "Variable Income",
            Self::SubscriptionHeavy => "Subscription Heavy",
            Self::SavingsBuilder => "Savings Builder",
        }
    }

    /// Fixed severity weight for priority ordering (higher = more urgent)
    pub fn severity(&self) -> u8 {
        match self {
            Self::HighUtilization => 4,
            Self::VariableIncome => 3,
            Self::SubscriptionHeavy => 2,
            Self::SavingsBuilder => 1,
        }
    }
}

impl std::fmt::Display for PersonaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PersonaKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "high_utilization" => Ok(Self::HighUtilization),
            "variable_income" => Ok(Self::VariableIncome),
            "subscription_heavy" => Ok(Self::SubscriptionHeavy),
            "savings_builder" => Ok(Self::SavingsBuilder),
            _ => Err(format!("Unknown persona kind: {}", s)),
        }
    }
}

/// A satisfied classification criterion with its measured value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionMeasurement {
    /// Human-readable rule, e.g. "credit_utilization >= 0.50"
    pub criterion: String,
    pub measured: f64,
    pub threshold: f64,
}

impl CriterionMeasurement {
    fn new(criterion: impl Into<String>, measured: f64, threshold: f64) -> Self {
        Self {
            criterion: criterion.into(),
            measured,
            threshold,
        }
    }
}

/// A persona assigned to a user for one analysis window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaAssignment {
    pub user_id: String,
    pub window_days: u32,
    pub persona: PersonaKind,
    /// 1 = highest priority; ranks form a dense 1..N sequence
    pub rank: u32,
    /// The criteria that were satisfied, with measured values
    pub criteria: Vec<CriterionMeasurement>,
    pub assigned_at: NaiveDate,
}

/// A persona match before ranks are assigned
struct PersonaMatch {
    persona: PersonaKind,
    /// Magnitude of the defining signal, used as the severity tie-break
    defining_value: f64,
    criteria: Vec<CriterionMeasurement>,
}

/// Classify a user's signal set into zero or more ranked personas.
///
/// Uses the most recent signal of each scalar kind. Matches are ordered by
/// fixed severity weight, ties broken by defining-signal magnitude
/// descending, and ranks reassigned 1..N after ordering.
pub fn classify(
    signals: &[Signal],
    window_days: u32,
    config: &ClassifierConfig,
) -> Vec<PersonaAssignment> {
    let Some(first) = signals.first() else {
        return vec![];
    };
    let user_id = first.user_id.clone();
    // All signals in one detection run share its as_of date; with mixed
    // input the newest run wins
    let assigned_at = signals
        .iter()
        .map(|s| s.computed_at)
        .max()
        .unwrap_or(first.computed_at);

    let mut matches: Vec<PersonaMatch> = vec![];

    if let Some(m) = match_high_utilization(signals, config) {
        matches.push(m);
    }
    if let Some(m) = match_variable_income(signals, config) {
        matches.push(m);
    }
    if let Some(m) = match_subscription_heavy(signals, config) {
        matches.push(m);
    }
    if let Some(m) = match_savings_builder(signals, config) {
        matches.push(m);
    }

    matches.sort_by(|a, b| {
        b.persona
            .severity()
            .cmp(&a.persona.severity())
            .then_with(|| {
                b.defining_value
                    .partial_cmp(&a.defining_value)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });

    debug!(
        user = user_id.as_str(),
        personas = matches.len(),
        "Persona classification complete"
    );

    matches
        .into_iter()
        .enumerate()
        .map(|(i, m)| PersonaAssignment {
            user_id: user_id.clone(),
            window_days,
            persona: m.persona,
            rank: i as u32 + 1,
            criteria: m.criteria,
            assigned_at,
        })
        .collect()
}

/// Most recent signal of a kind; among equals the last in detector order wins
fn latest(signals: &[Signal], kind: SignalKind) -> Option<&Signal> {
    signals
        .iter()
        .enumerate()
        .filter(|(_, s)| s.kind == kind)
        .max_by_key(|(i, s)| (s.computed_at, *i))
        .map(|(_, s)| s)
}

/// Subscription signals from the most recent detection run
fn latest_subscriptions(signals: &[Signal]) -> Vec<&Signal> {
    let newest = signals
        .iter()
        .filter(|s| s.kind == SignalKind::SubscriptionDetected)
        .map(|s| s.computed_at)
        .max();
    match newest {
        Some(date) => signals
            .iter()
            .filter(|s| s.kind == SignalKind::SubscriptionDetected && s.computed_at == date)
            .collect(),
        None => vec![],
    }
}

fn match_high_utilization(signals: &[Signal], config: &ClassifierConfig) -> Option<PersonaMatch> {
    let signal = latest(signals, SignalKind::CreditUtilization)?;
    // Closed boundary: exactly at the threshold matches
    if signal.value < config.utilization_threshold {
        return None;
    }
    Some(PersonaMatch {
        persona: PersonaKind::HighUtilization,
        defining_value: signal.value,
        criteria: vec![CriterionMeasurement::new(
            format!("credit_utilization >= {:.2}", config.utilization_threshold),
            signal.value,
            config.utilization_threshold,
        )],
    })
}

fn match_variable_income(signals: &[Signal], config: &ClassifierConfig) -> Option<PersonaMatch> {
    let signal = latest(signals, SignalKind::IncomeStability)?;
    if signal.value <= config.income_gap_days {
        return None;
    }
    Some(PersonaMatch {
        persona: PersonaKind::VariableIncome,
        defining_value: signal.value,
        criteria: vec![CriterionMeasurement::new(
            format!("income_stability > {:.0} days", config.income_gap_days),
            signal.value,
            config.income_gap_days,
        )],
    })
}

fn match_subscription_heavy(signals: &[Signal], config: &ClassifierConfig) -> Option<PersonaMatch> {
    let subscriptions = latest_subscriptions(signals);
    let count = subscriptions.len();
    let monthly_total: f64 = subscriptions.iter().map(|s| s.value).sum();

    if count < config.subscription_min_count || monthly_total < config.subscription_min_monthly {
        return None;
    }
    Some(PersonaMatch {
        persona: PersonaKind::SubscriptionHeavy,
        defining_value: monthly_total,
        criteria: vec![
            CriterionMeasurement::new(
                format!("subscription_count >= {}", config.subscription_min_count),
                count as f64,
                config.subscription_min_count as f64,
            ),
            CriterionMeasurement::new(
                format!("subscription_monthly_total >= {:.2}", config.subscription_min_monthly),
                monthly_total,
                config.subscription_min_monthly,
            ),
        ],
    })
}

fn match_savings_builder(signals: &[Signal], config: &ClassifierConfig) -> Option<PersonaMatch> {
    let growth = latest(signals, SignalKind::SavingsGrowth)?;
    if growth.value < config.savings_min_monthly {
        return None;
    }

    let mut criteria = vec![CriterionMeasurement::new(
        format!("savings_growth >= {:.2}/month", config.savings_min_monthly),
        growth.value,
        config.savings_min_monthly,
    )];

    // No credit exposure is not penalized: an absent utilization signal
    // satisfies the cap clause
    if let Some(utilization) = latest(signals, SignalKind::CreditUtilization) {
        if utilization.value >= config.savings_utilization_cap {
            return None;
        }
        criteria.push(CriterionMeasurement::new(
            format!("credit_utilization < {:.2}", config.savings_utilization_cap),
            utilization.value,
            config.savings_utilization_cap,
        ));
    }

    Some(PersonaMatch {
        persona: PersonaKind::SavingsBuilder,
        defining_value: growth.value,
        criteria,
    })
}
