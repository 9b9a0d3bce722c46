//! `run` and `detect` command implementations
//!
//! Both load a snapshot JSON file (standing in for the external data-loading
//! collaborator) and push it through the pipeline.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use compass_core::{
    GuardrailOutcome, Pipeline, PipelineConfig, RawFinancialSnapshot, Signal, UserProfile,
};

/// Build the pipeline from an override config file or the embedded defaults
pub fn load_pipeline(config_path: Option<&Path>) -> Result<Pipeline> {
    let config = match config_path {
        Some(path) => PipelineConfig::from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::embedded().context("Failed to load embedded config")?,
    };
    Ok(Pipeline::with_config(config))
}

fn load_snapshot(path: &Path) -> Result<RawFinancialSnapshot> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let snapshot: RawFinancialSnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
    tracing::debug!(
        user = snapshot.user_id.as_str(),
        accounts = snapshot.accounts.len(),
        transactions = snapshot.transactions.len(),
        "Snapshot loaded"
    );
    Ok(snapshot)
}

fn load_profile(path: Option<&Path>) -> Result<UserProfile> {
    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read profile {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse profile {}", path.display()))
        }
        // Guardrails treat missing fields as inconclusive, never as a pass
        None => Ok(UserProfile::default()),
    }
}

pub fn cmd_run(
    config_path: Option<&Path>,
    snapshot_path: &Path,
    profile_path: Option<&Path>,
    window_days: u32,
    as_of: Option<NaiveDate>,
    no_consent: bool,
    json: bool,
) -> Result<()> {
    let pipeline = load_pipeline(config_path)?;
    let snapshot = load_snapshot(snapshot_path)?;
    let profile = load_profile(profile_path)?;
    let as_of = as_of.unwrap_or_else(|| chrono::Local::now().date_naive());

    let output = pipeline.run(&snapshot, &profile, !no_consent, window_days, as_of)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "🧭 Pipeline run for {} ({} day window ending {})",
        output.user_id, output.window_days, as_of
    );
    println!();
    print_signals(&output.signals);

    println!("👤 Personas");
    if output.assignments.is_empty() {
        println!("   (no persona matched)");
    }
    for assignment in &output.assignments {
        println!("   {}. {}", assignment.rank, assignment.persona.label());
        for criterion in &assignment.criteria {
            println!(
                "      {} (measured {:.2})",
                criterion.criterion, criterion.measured
            );
        }
    }
    println!();

    println!("💡 Recommendations");
    if output.recommendations.is_empty() {
        println!("   (none generated)");
    }
    for rec in &output.recommendations {
        let icon = match rec.decision.outcome {
            GuardrailOutcome::Eligible => "✅",
            GuardrailOutcome::Ineligible => "🚫",
            GuardrailOutcome::NeedsReview => "🔍",
        };
        println!("   {} {} — {}", icon, rec.candidate.kind.label(), rec.candidate.rationale);
        if rec.decision.outcome != GuardrailOutcome::Eligible {
            println!(
                "      {} ({}): {}",
                rec.decision.outcome, rec.decision.rule, rec.decision.explanation
            );
        }
    }

    let delivered = output.recommendations.iter().filter(|r| r.delivered()).count();
    println!();
    println!(
        "Delivered {} of {} candidates",
        delivered,
        output.recommendations.len()
    );

    Ok(())
}

pub fn cmd_detect(
    config_path: Option<&Path>,
    snapshot_path: &Path,
    window_days: u32,
    as_of: Option<NaiveDate>,
    json: bool,
) -> Result<()> {
    let pipeline = load_pipeline(config_path)?;
    let snapshot = load_snapshot(snapshot_path)?;
    let as_of = as_of.unwrap_or_else(|| chrono::Local::now().date_naive());

    let signals = pipeline.detect_signals(&snapshot, true, window_days, as_of)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&signals)?);
        return Ok(());
    }

    println!(
        "🧭 Signal detection for {} ({} day window ending {})",
        snapshot.user_id, window_days, as_of
    );
    println!();
    print_signals(&signals);

    Ok(())
}

fn print_signals(signals: &[Signal]) {
    println!("📊 Signals");
    if signals.is_empty() {
        println!("   (none detected)");
    }
    for signal in signals {
        let discriminator = signal.detail.discriminator();
        if discriminator.is_empty() {
            println!("   {} = {:.2}", signal.kind, signal.value);
        } else {
            println!("   {} [{}] = {:.2}", signal.kind, discriminator, signal.value);
        }
    }
    println!();
}
