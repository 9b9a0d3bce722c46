//! Pipeline entry points
//!
//! The facade the surrounding service calls into. Every per-user entry
//! point is gated on the collaborator-supplied consent boolean and fails
//! fast with `ConsentRequired` when it is false. The per-user pipeline is
//! pure and synchronous: no I/O, no shared state, so callers may run any
//! number of users in parallel without coordination.

use chrono::NaiveDate;
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::eval::{RecommendationOutcome, UserPipelineOutput};
use crate::guardrails::{self, GuardrailDecision};
use crate::models::{RawFinancialSnapshot, UserProfile};
use crate::personas::{self, PersonaAssignment};
use crate::recommend::{self, RecommendationCandidate};
use crate::signals::{Signal, SignalDetector};

/// The four-stage decision pipeline
pub struct Pipeline {
    config: PipelineConfig,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Stage 1: derive behavioral signals from the snapshot
    pub fn detect_signals(
        &self,
        snapshot: &RawFinancialSnapshot,
        consent: bool,
        window_days: u32,
        as_of: NaiveDate,
    ) -> Result<Vec<Signal>> {
        ensure_consent(&snapshot.user_id, consent)?;
        SignalDetector::with_config(self.config.detector.clone()).detect(
            snapshot,
            window_days,
            as_of,
        )
    }

    /// Stage 2: classify the signal set into ranked personas
    pub fn classify_personas(
        &self,
        user_id: &str,
        signals: &[Signal],
        consent: bool,
        window_days: u32,
    ) -> Result<Vec<PersonaAssignment>> {
        ensure_consent(user_id, consent)?;
        Ok(personas::classify(signals, window_days, &self.config.classifier))
    }

    /// Stages 3 and 4: generate candidates and filter them through the
    /// guardrails. Every candidate is returned with its decision attached.
    pub fn recommend(
        &self,
        user_id: &str,
        assignments: &[PersonaAssignment],
        signals: &[Signal],
        profile: &UserProfile,
        consent: bool,
    ) -> Result<Vec<(RecommendationCandidate, GuardrailDecision)>> {
        ensure_consent(user_id, consent)?;
        let candidates = recommend::generate(user_id, assignments, signals);
        Ok(guardrails::filter(
            candidates,
            profile,
            signals,
            &self.config.guardrails,
        ))
    }

    /// Run the full per-user pipeline.
    ///
    /// Produces a fresh output set; callers supersede (not merge) any prior
    /// results for the same user and window. Identical input, window, and
    /// `as_of` produce identical output.
    pub fn run(
        &self,
        snapshot: &RawFinancialSnapshot,
        profile: &UserProfile,
        consent: bool,
        window_days: u32,
        as_of: NaiveDate,
    ) -> Result<UserPipelineOutput> {
        let signals = self.detect_signals(snapshot, consent, window_days, as_of)?;
        let assignments =
            self.classify_personas(&snapshot.user_id, &signals, consent, window_days)?;
        let recommendations =
            self.recommend(&snapshot.user_id, &assignments, &signals, profile, consent)?;

        info!(
            user = snapshot.user_id.as_str(),
            signals = signals.len(),
            personas = assignments.len(),
            candidates = recommendations.len(),
            "Pipeline run complete"
        );

        Ok(UserPipelineOutput {
            user_id: snapshot.user_id.clone(),
            consent_granted: consent,
            window_days,
            signals,
            assignments,
            recommendations: recommendations
                .into_iter()
                .map(|(candidate, decision)| RecommendationOutcome {
                    candidate,
                    decision,
                })
                .collect(),
            feedback: vec![],
        })
    }
}

/// Consent must be granted before any entry point runs for a user
fn ensure_consent(user_id: &str, consent: bool) -> Result<()> {
    if consent {
        Ok(())
    } else {
        Err(Error::ConsentRequired {
            user_id: user_id.to_string(),
        })
    }
}
