//! Bookkeeping command implementations

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::{
    DelimitedStrategy, ExtractionStrategy, FallbackInvoker, Ledger, ModelInvoker, PromptLibrary,
    SchemaCallStrategy, StrategyKind, TransactionKind,
};

use super::{colored_amount, format_amount, truncate};

fn open_ledger(path: &Path) -> Result<Ledger> {
    Ledger::load_from_path(path)
        .with_context(|| format!("Failed to read ledger {}", path.display()))
}

/// Extract a transaction from `text` and append it to the ledger file
///
/// The ledger is only written when extraction succeeds.
pub async fn cmd_add<I>(
    ledger_path: &Path,
    text: &str,
    strategy: StrategyKind,
    candidates: Vec<String>,
    invoker: I,
) -> Result<()>
where
    I: ModelInvoker + 'static,
{
    let mut ledger = open_ledger(ledger_path)?;
    let mut prompts = PromptLibrary::new();
    let route = FallbackInvoker::new(invoker, candidates);

    let extractor: Box<dyn ExtractionStrategy> = match strategy {
        StrategyKind::Delimited => Box::new(DelimitedStrategy::new(route, &mut prompts)?),
        StrategyKind::Schema => Box::new(SchemaCallStrategy::new(route, &mut prompts)?),
    };

    let extracted = extractor
        .extract_detailed(text)
        .await
        .context("Could not record transaction")?;

    let record = ledger.append(extracted.transaction).clone();
    ledger
        .save_to_path(ledger_path)
        .with_context(|| format!("Failed to write ledger {}", ledger_path.display()))?;

    let sign = match record.kind {
        TransactionKind::Expense => "-",
        TransactionKind::Income => "+",
    };
    println!(
        "✅ Recorded {}{} │ {} │ {}",
        sign,
        format_amount(record.amount),
        record.category,
        record.note
    );
    println!("   via {} ({} strategy)", extracted.model, strategy.as_str());

    Ok(())
}

/// Show the most recent `limit` transactions, oldest first
pub fn cmd_list(ledger_path: &Path, limit: usize) -> Result<()> {
    let ledger = open_ledger(ledger_path)?;

    if ledger.is_empty() {
        println!("No transactions recorded. Add one with:");
        println!("  tally add \"Ăn phở 40k\"");
        return Ok(());
    }

    let skip = ledger.len().saturating_sub(limit);

    println!();
    println!("📝 Recent Transactions ({} of {})", ledger.len() - skip, ledger.len());
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in ledger.iter().skip(skip) {
        println!(
            "   {} │ {:13} │ {} │ {}",
            tx.timestamp.format("%Y-%m-%d %H:%M"),
            tx.category.as_str(),
            colored_amount(tx.kind, tx.amount, 14),
            truncate(&tx.note, 40)
        );
    }

    Ok(())
}

/// Totals, per-category breakdown and daily expense series
pub fn cmd_report(ledger_path: &Path) -> Result<()> {
    let ledger = open_ledger(ledger_path)?;

    println!();
    println!("📊 Ledger Report");
    println!("   ─────────────────────────────────────────────────────────────");

    if ledger.is_empty() {
        println!("   No transactions recorded.");
        return Ok(());
    }

    let totals = ledger.totals();
    println!("   Income:   {:>16}", format_amount(totals.income));
    println!("   Expense:  {:>16}", format_amount(totals.expense));
    let balance = if totals.balance < 0 {
        format!("-{}", format_amount(totals.balance.unsigned_abs()))
    } else {
        format_amount(totals.balance.unsigned_abs())
    };
    println!("   Balance:  {:>16}", balance);

    for (kind, title) in [
        (TransactionKind::Expense, "Spending by category"),
        (TransactionKind::Income, "Income by category"),
    ] {
        let by_category = ledger.aggregate_by_category(kind);
        if by_category.is_empty() {
            continue;
        }
        let total: u64 = by_category.values().sum();

        let mut rows: Vec<_> = by_category.into_iter().collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        println!();
        println!("   {}", title);
        println!("   {:15} │ {:>14} │ {:>6}", "Category", "Amount", "%");
        println!("   ────────────────┼────────────────┼────────");
        for (category, amount) in rows {
            let pct = if total > 0 {
                amount as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            println!(
                "   {:15} │ {:>14} │ {:>5.1}%",
                category.as_str(),
                format_amount(amount),
                pct
            );
        }
    }

    let daily = ledger.daily_totals(TransactionKind::Expense);
    if !daily.is_empty() {
        let peak = daily.values().copied().max().unwrap_or(0);
        println!();
        println!("   Daily spending");
        for (day, amount) in &daily {
            let width = if peak > 0 {
                ((*amount as f64 / peak as f64) * 30.0).round() as usize
            } else {
                0
            };
            println!(
                "   {} │ {:>14} │ {}",
                day,
                format_amount(*amount),
                "█".repeat(width.max(1))
            );
        }
    }

    Ok(())
}

/// Delete every transaction (requires `--yes`)
pub fn cmd_reset(ledger_path: &Path, confirmed: bool) -> Result<()> {
    if !confirmed {
        anyhow::bail!("Refusing to reset the ledger without --yes");
    }

    let mut ledger = open_ledger(ledger_path)?;
    let removed = ledger.len();
    ledger.reset();
    ledger
        .save_to_path(ledger_path)
        .with_context(|| format!("Failed to write ledger {}", ledger_path.display()))?;

    tracing::info!(removed, path = %ledger_path.display(), "Ledger reset");
    println!("🗑️  Removed {} transaction(s)", removed);
    Ok(())
}
