//! Domain models for Compass
//!
//! Input types for the decision pipeline: the raw financial snapshot handed
//! over by the data-loading collaborator, and the user profile consumed by
//! the guardrail filter. Derived types (signals, personas, recommendations,
//! decisions) live with the stage that produces them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Error, Result};

/// A financial account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub kind: AccountKind,
    /// Institution-specific subtype (e.g. "cd", "money_market", "rewards")
    pub subtype: Option<String>,
    /// Current ledger balance. For credit accounts this is the amount owed.
    pub balance: f64,
    pub available_balance: Option<f64>,
    /// Credit limit; only meaningful for credit accounts
    pub credit_limit: Option<f64>,
    pub currency: String,
}

/// Account kinds the pipeline distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Checking,
    Savings,
    Credit,
    Loan,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Savings => "savings",
            Self::Credit => "credit",
            Self::Loan => "loan",
        }
    }

    /// Savings and other low-risk deposit accounts count toward savings growth
    pub fn is_savings(&self) -> bool {
        matches!(self, Self::Savings)
    }
}

impl std::str::FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "checking" => Ok(Self::Checking),
            "savings" => Ok(Self::Savings),
            "credit" => Ok(Self::Credit),
            "loan" => Ok(Self::Loan),
            _ => Err(format!("Unknown account kind: {}", s)),
        }
    }
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A financial transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub account_id: String,
    pub date: NaiveDate,
    /// Negative = spend, positive = deposit
    pub amount: f64,
    pub description: String,
    /// Pre-normalized merchant name, when the data source provides one
    pub merchant: Option<String>,
    pub category: Option<String>,
    /// Pending transactions are excluded from recurrence detection
    #[serde(default)]
    pub pending: bool,
}

/// A liability attached to an account (credit card, loan)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Liability {
    pub account_id: String,
    /// Annual percentage rate
    pub apr: Option<f64>,
    pub minimum_payment: Option<f64>,
    #[serde(default)]
    pub overdue: bool,
    pub next_due_date: Option<NaiveDate>,
}

/// The full set of raw records for one user, as loaded by the caller.
///
/// Read-only to the pipeline. The invariant that every transaction and
/// liability references a known account is checked by [`validate`], which
/// every entry point calls before doing any work.
///
/// [`validate`]: RawFinancialSnapshot::validate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFinancialSnapshot {
    pub user_id: String,
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub liabilities: Vec<Liability>,
}

impl RawFinancialSnapshot {
    /// Check internal referential integrity.
    ///
    /// A transaction or liability referencing an unknown account makes the
    /// whole snapshot malformed; the run produces no output rather than
    /// partial output.
    pub fn validate(&self) -> Result<()> {
        let account_ids: HashSet<&str> = self.accounts.iter().map(|a| a.id.as_str()).collect();

        for tx in &self.transactions {
            if !account_ids.contains(tx.account_id.as_str()) {
                return Err(Error::MalformedInput(format!(
                    "transaction {} references unknown account {}",
                    tx.id, tx.account_id
                )));
            }
        }

        for liability in &self.liabilities {
            if !account_ids.contains(liability.account_id.as_str()) {
                return Err(Error::MalformedInput(format!(
                    "liability references unknown account {}",
                    liability.account_id
                )));
            }
        }

        Ok(())
    }
}

/// Income bands used by guardrail eligibility predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncomeLevel {
    Low,
    Moderate,
    High,
}

impl IncomeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
        }
    }
}

impl std::str::FromStr for IncomeLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "moderate" | "middle" => Ok(Self::Moderate),
            "high" => Ok(Self::High),
            _ => Err(format!("Unknown income level: {}", s)),
        }
    }
}

impl std::fmt::Display for IncomeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Profile fields consumed by guardrail predicates.
///
/// Fields are optional because upstream KYC data is often incomplete; a
/// predicate that needs a missing field produces `needs_review` rather than
/// silently passing or failing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub age: Option<u32>,
    pub income_level: Option<IncomeLevel>,
}
