//! Compass Core Library
//!
//! The decision pipeline for the Compass financial persona engine:
//! - Signal detection over raw account/transaction/liability snapshots
//! - Persona classification with deterministic priority ranking
//! - Recommendation generation from persona/signal evidence
//! - Guardrail filtering with auditable eligibility decisions
//! - Offline evaluation harness for population-level quality metrics
//!
//! The per-user pipeline is pure and synchronous; persistence, transport,
//! and the consent gate itself belong to the surrounding service.

pub mod config;
pub mod error;
pub mod eval;
pub mod guardrails;
pub mod models;
pub mod personas;
pub mod pipeline;
pub mod recommend;
pub mod signals;

pub use config::{ClassifierConfig, DetectorConfig, GuardrailConfig, PipelineConfig};
pub use error::{Error, Result};
pub use eval::{
    evaluate, EvaluationReport, FeedbackRecord, RecommendationOutcome, UserPipelineOutput,
};
pub use guardrails::{GuardrailDecision, GuardrailOutcome};
pub use models::{
    Account, AccountKind, IncomeLevel, Liability, RawFinancialSnapshot, Transaction, UserProfile,
};
pub use personas::{classify, CriterionMeasurement, PersonaAssignment, PersonaKind};
pub use pipeline::Pipeline;
pub use recommend::{generate, RecommendationCandidate, RecommendationKind};
pub use signals::{
    BillingPeriod, Signal, SignalDetail, SignalDetector, SignalKind, UtilizationEntry,
};
