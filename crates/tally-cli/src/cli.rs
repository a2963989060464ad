//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Record spending in plain language, practice exams with an AI examiner
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Natural-language bookkeeping and exam practice", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Ledger file (CSV)
    #[arg(long, default_value = "tally.csv", global = true)]
    pub ledger: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a transaction described in plain text
    ///
    /// Example: tally add "Ăn phở 40k"
    Add {
        /// What happened, e.g. "Cafe sáng 25k" or "Lương tháng 10 15tr"
        text: String,

        /// Extraction strategy: schema (structured call) or delimited (text line)
        #[arg(short, long, default_value = "schema")]
        strategy: String,

        /// Candidate model (repeatable, tried in order; overrides config)
        #[arg(short, long = "model")]
        models: Vec<String>,
    },

    /// List recorded transactions
    List {
        /// Maximum number of (most recent) transactions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show totals, per-category breakdown and daily spending
    Report,

    /// Delete every recorded transaction
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },

    /// Grade an essay answer out of 10
    Grade {
        /// Exam question
        #[arg(short, long)]
        question: String,

        /// Answer text
        #[arg(short, long, conflicts_with = "answer_file")]
        answer: Option<String>,

        /// Read the answer from a UTF-8 text file
        #[arg(long)]
        answer_file: Option<PathBuf>,

        /// Reference material (UTF-8 .txt) to grade against
        #[arg(short, long)]
        reference: Option<PathBuf>,

        /// Candidate model (repeatable, tried in order; overrides config)
        #[arg(short, long = "model")]
        models: Vec<String>,
    },

    /// Interactive oral exam (reads answers from stdin)
    Exam {
        /// Reference material (UTF-8 .txt) the examiner draws on
        #[arg(short, long)]
        reference: Option<PathBuf>,

        /// Candidate model (repeatable, tried in order; overrides config)
        #[arg(short, long = "model")]
        models: Vec<String>,
    },

    /// Show the backend, candidate models and their availability
    Models,

    /// Manage prompt templates
    Prompts {
        #[command(subcommand)]
        action: PromptsAction,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all prompts and their override status
    List,

    /// Show the content of a specific prompt
    Show {
        /// Prompt ID (e.g., extract_schema_call, oral_examiner)
        id: String,
    },

    /// Show the override directory path
    Path,
}
