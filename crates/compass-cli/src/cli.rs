//! CLI argument definitions using clap
//!
//! This module contains the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Compass - financial persona and recommendation pipeline
#[derive(Parser)]
#[command(name = "compass")]
#[command(about = "Rule-based financial persona and recommendation engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Pipeline configuration file (TOML)
    ///
    /// Thresholds and tolerances for all four pipeline stages. When omitted,
    /// the defaults compiled into the binary are used.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit machine-readable JSON instead of a summary
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline for one user's snapshot
    Run {
        /// Snapshot file: JSON with accounts, transactions, liabilities
        #[arg(short, long)]
        snapshot: PathBuf,

        /// User profile JSON (age, income level) for guardrail checks
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Trailing analysis window in days
        #[arg(short, long, default_value = "90")]
        window: u32,

        /// Analysis reference date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Treat consent as not granted (the pipeline will refuse to run)
        #[arg(long)]
        no_consent: bool,
    },

    /// Detect behavioral signals only
    Detect {
        /// Snapshot file: JSON with accounts, transactions, liabilities
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Trailing analysis window in days
        #[arg(short, long, default_value = "90")]
        window: u32,

        /// Analysis reference date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// Score a batch of persisted pipeline outputs
    Evaluate {
        /// Batch file: JSON array of per-user pipeline outputs
        #[arg(short, long)]
        batch: PathBuf,
    },
}
