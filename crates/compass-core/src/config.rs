//! Pipeline configuration
//!
//! Every threshold and tolerance the pipeline uses is configuration, not a
//! constant: the recurrence-clustering heuristics are approximate and the
//! persona/guardrail cutoffs are policy, so both are the likely sources of
//! behavioral drift between deployments.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. An explicit override file, when the caller provides a path
//! 2. Embedded defaults compiled into the binary (config/pipeline.toml)

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/pipeline.toml");

/// Signal detector tolerances
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Consecutive charges must land within this many days of the expected
    /// period (weekly/monthly/quarterly/yearly) to count as recurring
    pub date_tolerance_days: i64,
    /// Charge amounts must stay within this fraction of the group median
    pub amount_tolerance: f64,
    /// Minimum charges from one merchant before a subscription is considered
    pub min_occurrences: usize,
    /// Amount tolerance for candidate paychecks (deposits vary more)
    pub deposit_amount_tolerance: f64,
    /// Minimum qualifying deposits before income stability is reported
    pub min_deposits: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            date_tolerance_days: 3,       // ±3 days around the expected period
            amount_tolerance: 0.05,       // 5% variance allowed
            min_occurrences: 2,           // 2 charges establish a pattern
            deposit_amount_tolerance: 0.25, // 25% variance for paychecks
            min_deposits: 3,              // 3 deposits establish a pay cadence
        }
    }
}

/// Persona classification thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Peak utilization at or above this ratio marks high_utilization
    pub utilization_threshold: f64,
    /// Median deposit gap above this many days marks variable_income
    pub income_gap_days: f64,
    /// subscription_heavy: minimum number of detected subscriptions
    pub subscription_min_count: usize,
    /// subscription_heavy: minimum summed monthly-equivalent cost
    pub subscription_min_monthly: f64,
    /// savings_builder: minimum average monthly savings growth
    pub savings_min_monthly: f64,
    /// savings_builder: peak utilization must stay below this ratio
    /// (no utilization signal at all also passes)
    pub savings_utilization_cap: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            utilization_threshold: 0.50,
            income_gap_days: 45.0,
            subscription_min_count: 3,
            subscription_min_monthly: 50.0,
            savings_min_monthly: 200.0,
            savings_utilization_cap: 0.30,
        }
    }
}

/// Guardrail eligibility thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    /// Do not recommend additional credit products at or above this
    /// measured utilization
    pub utilization_ceiling: f64,
    /// Minimum age for opening new financial products
    pub min_age: u32,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            utilization_ceiling: 0.80,
            min_age: 18,
        }
    }
}

/// Aggregate configuration for the full pipeline
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub detector: DetectorConfig,
    pub classifier: ClassifierConfig,
    pub guardrails: GuardrailConfig,
}

impl PipelineConfig {
    /// Load the embedded defaults
    pub fn embedded() -> Result<Self> {
        parse_config(DEFAULT_CONFIG)
    }

    /// Load from an override file, falling back to embedded defaults for
    /// any section the file omits (serde defaults handle the merge)
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        parse_config(&raw)
    }
}

fn parse_config(raw: &str) -> Result<PipelineConfig> {
    toml::from_str(raw).map_err(|e| Error::Config(format!("invalid pipeline config: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_match_struct_defaults() {
        let embedded = PipelineConfig::embedded().unwrap();
        let defaults = PipelineConfig::default();

        assert_eq!(
            embedded.detector.date_tolerance_days,
            defaults.detector.date_tolerance_days
        );
        assert_eq!(
            embedded.classifier.utilization_threshold,
            defaults.classifier.utilization_threshold
        );
        assert_eq!(
            embedded.guardrails.utilization_ceiling,
            defaults.guardrails.utilization_ceiling
        );
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            [classifier]
            utilization_threshold = 0.6
            "#,
        )
        .unwrap();

        assert_eq!(config.classifier.utilization_threshold, 0.6);
        // Untouched sections and fields keep their defaults
        assert_eq!(config.classifier.income_gap_days, 45.0);
        assert_eq!(config.detector.amount_tolerance, 0.05);
        assert_eq!(config.guardrails.min_age, 18);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = parse_config("detector = \"not a table\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
