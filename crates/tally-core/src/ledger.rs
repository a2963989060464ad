//! Append-only transaction ledger with CSV persistence
//!
//! Records keep insertion order, which is also display and file order.
//! Aggregates are recomputed on demand and do not depend on that order.
//!
//! File format (UTF-8, header always present):
//!
//! ```text
//! date,category,amount,note,type
//! 2024-10-01 08:15:00,Food,40000,Ăn phở,Expense
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use chrono::{Local, NaiveDate, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{Category, NewTransaction, TransactionKind, TransactionRecord};

/// Timestamp format used in the ledger file
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const HEADER: [&str; 5] = ["date", "category", "amount", "note", "type"];

/// Income, expense and their difference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub income: u64,
    pub expense: u64,
    /// `income - expense`, may be negative
    pub balance: i64,
}

/// One CSV row
#[derive(Debug, Serialize, Deserialize)]
struct LedgerRow {
    date: String,
    category: String,
    amount: u64,
    note: String,
    #[serde(rename = "type")]
    kind: String,
}

impl From<&TransactionRecord> for LedgerRow {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            date: record.timestamp.format(DATE_FORMAT).to_string(),
            category: record.category.as_str().to_string(),
            amount: record.amount,
            note: record.note.clone(),
            kind: record.kind.as_str().to_string(),
        }
    }
}

impl LedgerRow {
    fn into_record(self, line: u64) -> Result<TransactionRecord> {
        let timestamp = NaiveDateTime::parse_from_str(self.date.trim(), DATE_FORMAT).map_err(|e| {
            Error::InvalidData(format!("line {}: bad date '{}': {}", line, self.date, e))
        })?;
        let category = self.category.parse::<Category>().unwrap_or_else(|_| {
            warn!(line, category = %self.category, "Unknown category in ledger file, using Other");
            Category::Other
        });
        let kind = self
            .kind
            .parse::<TransactionKind>()
            .map_err(|e| Error::InvalidData(format!("line {}: {}", line, e)))?;

        Ok(TransactionRecord {
            timestamp,
            category,
            amount: self.amount,
            kind,
            note: self.note,
        })
    }
}

/// Ordered collection of transaction records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    records: Vec<TransactionRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transaction stamped with the current local time
    ///
    /// The timestamp is truncated to whole seconds so it survives a save/load.
    pub fn append(&mut self, tx: NewTransaction) -> &TransactionRecord {
        let now = Local::now().naive_local().trunc_subsecs(0);
        self.append_at(now, tx)
    }

    /// Append with an explicit timestamp
    pub fn append_at(&mut self, timestamp: NaiveDateTime, tx: NewTransaction) -> &TransactionRecord {
        let index = self.records.len();
        self.records.push(TransactionRecord::from_new(timestamp, tx));
        &self.records[index]
    }

    /// Discard every record
    pub fn reset(&mut self) {
        debug!(discarded = self.records.len(), "Ledger reset");
        self.records.clear();
    }

    /// All records in insertion order
    pub fn all(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransactionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of amounts per category for one kind
    ///
    /// Categories with no records of that kind are absent.
    pub fn aggregate_by_category(&self, kind: TransactionKind) -> BTreeMap<Category, u64> {
        let mut totals = BTreeMap::new();
        for record in self.records.iter().filter(|r| r.kind == kind) {
            let entry = totals.entry(record.category).or_insert(0u64);
            *entry = entry.saturating_add(record.amount);
        }
        totals
    }

    pub fn totals(&self) -> Totals {
        let sum = |kind: TransactionKind| {
            self.records
                .iter()
                .filter(|r| r.kind == kind)
                .fold(0u64, |acc, r| acc.saturating_add(r.amount))
        };
        let income = sum(TransactionKind::Income);
        let expense = sum(TransactionKind::Expense);
        let balance = (i128::from(income) - i128::from(expense))
            .clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64;

        Totals {
            income,
            expense,
            balance,
        }
    }

    /// Sum of amounts per calendar day for one kind
    pub fn daily_totals(&self, kind: TransactionKind) -> BTreeMap<NaiveDate, u64> {
        let mut days = BTreeMap::new();
        for record in self.records.iter().filter(|r| r.kind == kind) {
            let entry = days.entry(record.timestamp.date()).or_insert(0u64);
            *entry = entry.saturating_add(record.amount);
        }
        days
    }

    /// Write the ledger as CSV
    pub fn save<W: Write>(&self, sink: W) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(sink);
        writer.write_record(HEADER)?;
        for record in &self.records {
            writer.serialize(LedgerRow::from(record))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a ledger from CSV
    pub fn load<R: Read>(source: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(source);

        let headers = reader.headers()?.clone();
        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            // Where the row starts in the file; quoted notes may span lines
            let line = row.position().map_or(0, |p| p.line());
            let parsed: LedgerRow = row.deserialize(Some(&headers))?;
            records.push(parsed.into_record(line)?);
        }

        debug!(records = records.len(), "Ledger loaded");
        Ok(Self { records })
    }

    /// Save to `path`, replacing it atomically
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        self.save(tmp.as_file_mut())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;

        debug!(path = %path.display(), records = self.records.len(), "Ledger saved");
        Ok(())
    }

    /// Load from `path`; a missing file is an empty ledger
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No ledger file yet, starting empty");
            return Ok(Self::new());
        }
        let file = fs::File::open(path)?;
        Self::load(file)
    }
}

impl<'a> IntoIterator for &'a Ledger {
    type Item = &'a TransactionRecord;
    type IntoIter = std::slice::Iter<'a, TransactionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
