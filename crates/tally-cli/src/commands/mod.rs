//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `ledger` - Bookkeeping commands (add, list, report, reset)
//! - `exam` - Essay grading and the interactive oral exam
//! - `models` - Backend and candidate model status
//! - `prompts` - Prompt library management commands

pub mod exam;
pub mod ledger;
pub mod models;
pub mod prompts;

// Re-export command functions for main.rs
pub use exam::*;
pub use ledger::*;
pub use models::*;
pub use prompts::*;

use std::time::Duration;

use anyhow::{Context, Result};
use tally_core::model_router::parse_model_list;
use tally_core::{AIClient, CandidateConfig, TaskType, TransactionKind};

/// Build the model client selected by `AI_BACKEND`
pub fn build_client(timeout: Duration) -> Result<AIClient> {
    AIClient::from_env(timeout).context(
        "AI backend not configured. Set OPENAI_COMPATIBLE_HOST, or choose AI_BACKEND=gemini or AI_BACKEND=mock",
    )
}

/// Candidates for a task; `--model` flags win over the configured list
pub fn resolve_candidates(config: &CandidateConfig, task: TaskType, explicit: &[String]) -> Vec<String> {
    if explicit.is_empty() {
        config.candidates_for(task)
    } else {
        parse_model_list(&explicit.join(","))
    }
}

/// Format an amount with dot thousands separators, e.g. 1500000 -> "1.500.000đ"
pub fn format_amount(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out.push('đ');
    out
}

/// Signed amount right-aligned to `width` columns, colored red or green
///
/// Padding is applied before the escape codes so they don't count toward the width.
pub fn colored_amount(kind: TransactionKind, amount: u64, width: usize) -> String {
    let (sign, color) = match kind {
        TransactionKind::Expense => ('-', "31"),
        TransactionKind::Income => ('+', "32"),
    };
    let padded = format!("{:>width$}", format!("{}{}", sign, format_amount(amount)));
    format!("\x1b[{}m{}\x1b[0m", color, padded)
}

/// Truncate a string to a maximum length in characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
