//! Free text to transaction extraction
//!
//! Two strategies share one contract: hand the text to a model route, read
//! back exactly one `NewTransaction` or a typed `ExtractionError`.
//!
//! - `DelimitedStrategy`: the model answers `category|amount|note` as text
//! - `SchemaCallStrategy`: the model calls a declared `record_transaction` tool
//!
//! Neither strategy retries; a failed parse is reported to the caller.

mod delimited;
mod schema_call;

pub use delimited::{parse_amount, parse_delimited_reply, DelimitedStrategy};
pub use schema_call::{parse_record_call, record_transaction_tool, SchemaCallStrategy, RECORD_TOOL};

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::warn;

use crate::error::{Error, Result};
use crate::models::{Category, NewTransaction, TransactionKind};

static INCOME_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(^\s*\+|lương|thưởng|thu nhập|salary|income|bonus|refund|hoàn tiền)")
        .expect("valid regex")
});

/// Compounds that contain an income word but describe spending
/// ("thưởng thức" = to enjoy, "lương thực" = food staples)
static NOT_INCOME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)thưởng\s+thức|lương\s+thực").expect("valid regex"));

/// Which extraction strategy to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    /// Single `category|amount|note` text line
    Delimited,
    /// Structured `record_transaction` call
    #[default]
    Schema,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delimited => "delimited",
            Self::Schema => "schema",
        }
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "delimited" | "text" => Ok(Self::Delimited),
            "schema" | "schema-call" | "tool" => Ok(Self::Schema),
            _ => Err(format!("Unknown strategy: {}", s)),
        }
    }
}

/// A transaction together with the model that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub transaction: NewTransaction,
    pub model: String,
}

/// Turns one free-text description into one transaction
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Extract a transaction and report which model answered
    async fn extract_detailed(&self, text: &str) -> Result<Extracted>;

    /// Extract a transaction
    async fn extract(&self, text: &str) -> Result<NewTransaction> {
        Ok(self.extract_detailed(text).await?.transaction)
    }

    fn kind(&self) -> StrategyKind;
}

/// Reject blank input before any model is called
pub(crate) fn require_text(text: &str) -> Result<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidData(
            "Transaction text must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}

/// Map a model-supplied label to a category, logging coercions
pub(crate) fn normalize_category(label: &str) -> Category {
    match label.parse::<Category>() {
        Ok(category) => category,
        Err(_) => {
            warn!(label = %label, "Unknown category from model, using Other");
            Category::Other
        }
    }
}

/// Income if the category is Salary or either text carries an income marker
pub(crate) fn infer_kind(category: Category, input: &str, note: &str) -> TransactionKind {
    if category == Category::Salary || has_income_marker(input) || has_income_marker(note) {
        TransactionKind::Income
    } else {
        TransactionKind::Expense
    }
}

fn has_income_marker(text: &str) -> bool {
    INCOME_MARKER.is_match(&NOT_INCOME.replace_all(text, " "))
}
