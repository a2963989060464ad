//! Delimited-text extraction (`category|amount|note`)

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::ai::ModelRoute;
use crate::error::{ExtractionError, Result};
use crate::models::NewTransaction;
use crate::prompts::{Prompt, PromptId, PromptLibrary};

use super::{infer_kind, normalize_category, require_text, ExtractionStrategy, Extracted, StrategyKind};

static PLAIN_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("valid regex"));

/// Thousands groups: `40.000`, `1,234,567`, `10_000`
static GROUPED_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{1,3}(?:[.,_][0-9]{3})+$").expect("valid regex"));

/// Decimal before a `k`/`tr`/`m` suffix: `1.5`, `2,25`
static SHORT_DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)[.,]([0-9]{1,2})$").expect("valid regex"));

/// Asks the model for one `category|amount|note` line
pub struct DelimitedStrategy<R> {
    route: R,
    prompt: Prompt,
}

impl<R: ModelRoute> DelimitedStrategy<R> {
    pub fn new(route: R, prompts: &mut PromptLibrary) -> Result<Self> {
        let prompt = prompts.get(PromptId::ExtractDelimited)?.clone();
        Ok(Self { route, prompt })
    }
}

#[async_trait]
impl<R: ModelRoute> ExtractionStrategy for DelimitedStrategy<R> {
    async fn extract_detailed(&self, text: &str) -> Result<Extracted> {
        let input = require_text(text)?;
        let mut vars = HashMap::new();
        vars.insert("text", input);

        let answer = self.route.run(&self.prompt.to_request(&vars)).await?;
        let reply = answer.reply.text.ok_or_else(|| {
            ExtractionError::format_mismatch("model returned no text line")
        })?;

        let transaction = parse_delimited_reply(&reply, input)?;
        debug!(
            model = %answer.model,
            category = %transaction.category,
            amount = transaction.amount,
            "Delimited extraction succeeded"
        );
        Ok(Extracted {
            transaction,
            model: answer.model,
        })
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Delimited
    }
}

/// Parse a `category|amount|note` reply
///
/// `input` is the user's original text, used only to infer income.
pub fn parse_delimited_reply(
    reply: &str,
    input: &str,
) -> std::result::Result<NewTransaction, ExtractionError> {
    let line = reply
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.starts_with("```"))
        .map(|l| l.trim_matches('`').trim())
        .find(|l| !l.is_empty())
        .ok_or_else(|| ExtractionError::format_mismatch("empty reply"))?;

    let fields: Vec<&str> = line.split('|').map(str::trim).collect();
    if fields.len() != 3 {
        return Err(ExtractionError::format_mismatch(format!(
            "expected 3 '|'-separated fields, got {}: {}",
            fields.len(),
            line
        )));
    }

    let amount = parse_amount(fields[1])?;
    let category = normalize_category(fields[0]);
    let note = fields[2].to_string();
    let kind = infer_kind(category, input, &note);

    Ok(NewTransaction {
        category,
        amount,
        kind,
        note,
    })
}

/// Parse an amount like `40000`, `40.000`, `40k` or `1.5tr`
///
/// `.`, `,` and `_` are accepted only between groups of three digits. A `k`
/// suffix multiplies by 1 000 and `tr`/`m` by 1 000 000; with a suffix, one
/// separator followed by one or two digits is a decimal point.
pub fn parse_amount(raw: &str) -> std::result::Result<u64, ExtractionError> {
    let not_numeric = || ExtractionError::amount_not_numeric(format!("'{}'", raw.trim()));

    let lowered = raw.trim().to_lowercase();
    let (number, multiplier) = if let Some(n) = lowered.strip_suffix("tr") {
        (n, 1_000_000u64)
    } else if let Some(n) = lowered.strip_suffix('m') {
        (n, 1_000_000)
    } else if let Some(n) = lowered.strip_suffix('k') {
        (n, 1_000)
    } else {
        (lowered.as_str(), 1)
    };
    let number = number.trim_end();

    if multiplier > 1 {
        if let Some(caps) = SHORT_DECIMAL.captures(number) {
            let (whole, frac) = (&caps[1], &caps[2]);
            let whole: u64 = whole.parse().map_err(|_| not_numeric())?;
            let frac_value: u64 = frac.parse().map_err(|_| not_numeric())?;
            let scale = 10u64.pow(frac.len() as u32);
            return whole
                .checked_mul(multiplier)
                .and_then(|w| w.checked_add(frac_value * multiplier / scale))
                .ok_or_else(not_numeric);
        }
    }

    if !PLAIN_DIGITS.is_match(number) && !GROUPED_DIGITS.is_match(number) {
        return Err(not_numeric());
    }

    let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
    let base: u64 = digits.parse().map_err(|_| not_numeric())?;
    base.checked_mul(multiplier).ok_or_else(not_numeric)
}
