//! `evaluate` command implementation

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use compass_core::{evaluate, UserPipelineOutput};

pub fn cmd_evaluate(batch_path: &Path, json: bool) -> Result<()> {
    let raw = fs::read_to_string(batch_path)
        .with_context(|| format!("Failed to read batch {}", batch_path.display()))?;
    let outputs: Vec<UserPipelineOutput> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse batch {}", batch_path.display()))?;

    let report = evaluate(&outputs);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("📈 Evaluation Report");
    println!("   ─────────────────────────────");
    println!("   Users:                {}", report.user_count);
    println!("   Candidates:           {}", report.candidate_count);
    println!("   Relevance:            {:.1}%", report.relevance_score * 100.0);
    println!("   Diversity:            {:.1}%", report.diversity_score * 100.0);
    println!("   Coverage:             {:.1}%", report.coverage_rate * 100.0);
    println!("   Personalization:      {:.1}%", report.personalization_score * 100.0);
    println!("   Eligibility rate:     {:.1}%", report.eligibility_rate * 100.0);
    println!("   Consent rate:         {:.1}%", report.consent_rate * 100.0);
    println!("   Signal detection:     {:.1}%", report.signal_detection_rate * 100.0);

    Ok(())
}
