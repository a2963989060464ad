//! Tally CLI - natural-language bookkeeping and exam practice
//!
//! Usage:
//!   tally add "Ăn phở 40k"             Record a transaction
//!   tally report                       Totals and category breakdown
//!   tally grade -q Q -a A -r notes.txt Grade an essay answer
//!   tally exam -r notes.txt            Interactive oral exam

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use clap::Parser;
use tally_core::{CandidateConfig, StrategyKind, TaskType};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
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
        Commands::Add {
            text,
            strategy,
            models,
        } => {
            let config = load_config()?;
            let strategy: StrategyKind = strategy.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            let candidates = commands::resolve_candidates(&config, TaskType::Extraction, &models);
            let client = commands::build_client(config.timeout_for(TaskType::Extraction))?;
            commands::cmd_add(&cli.ledger, &text, strategy, candidates, client).await
        }
        Commands::List { limit } => commands::cmd_list(&cli.ledger, limit),
        Commands::Report => commands::cmd_report(&cli.ledger),
        Commands::Reset { yes } => commands::cmd_reset(&cli.ledger, yes),
        Commands::Grade {
            question,
            answer,
            answer_file,
            reference,
            models,
        } => {
            let config = load_config()?;
            let candidates = commands::resolve_candidates(&config, TaskType::Exam, &models);
            let client = commands::build_client(config.timeout_for(TaskType::Exam))?;
            let answer = commands::read_answer(answer, answer_file.as_deref())?;
            commands::cmd_grade(&question, &answer, reference.as_deref(), candidates, client).await
        }
        Commands::Exam { reference, models } => {
            let config = load_config()?;
            let candidates = commands::resolve_candidates(&config, TaskType::Exam, &models);
            let client = commands::build_client(config.timeout_for(TaskType::Exam))?;
            commands::cmd_exam(reference.as_deref(), candidates, client).await
        }
        Commands::Models => {
            let config = load_config()?;
            let client = commands::build_client(config.max_timeout())?;
            commands::cmd_models(&config, &client).await
        }
        Commands::Prompts { action } => match action {
            PromptsAction::List => commands::cmd_prompts_list(),
            PromptsAction::Show { id } => commands::cmd_prompts_show(&id),
            PromptsAction::Path => commands::cmd_prompts_path(),
        },
    }
}

fn load_config() -> Result<CandidateConfig> {
    CandidateConfig::load().context("Failed to load model configuration")
}
