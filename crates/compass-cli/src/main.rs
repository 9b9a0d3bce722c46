//! Compass CLI - financial persona and recommendation engine
//!
//! Usage:
//!   compass run --snapshot user.json        Run the full pipeline
//!   compass detect --snapshot user.json     Detect signals only
//!   compass evaluate --batch outputs.json   Score a batch of outputs

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Run {
            snapshot,
            profile,
            window,
            as_of,
            no_consent,
        } => commands::cmd_run(
            cli.config.as_deref(),
            &snapshot,
            profile.as_deref(),
            window,
            as_of,
            no_consent,
            cli.json,
        ),
        Commands::Detect {
            snapshot,
            window,
            as_of,
        } => commands::cmd_detect(cli.config.as_deref(), &snapshot, window, as_of, cli.json),
        Commands::Evaluate { batch } => commands::cmd_evaluate(&batch, cli.json),
    }
}
