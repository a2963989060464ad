//! Domain models for Tally

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Fixed set of spending/income categories
///
/// Each category has a canonical English label (used in the ledger file and
/// tool schemas) and the Vietnamese label used by the extraction prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Food,
    Transport,
    Shopping,
    Bills,
    Entertainment,
    Salary,
    Investment,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Food => "Food",
            Self::Transport => "Transport",
            Self::Shopping => "Shopping",
            Self::Bills => "Bills",
            Self::Entertainment => "Entertainment",
            Self::Salary => "Salary",
            Self::Investment => "Investment",
            Self::Other => "Other",
        }
    }

    pub fn vietnamese_label(&self) -> &'static str {
        match self {
            Self::Food => "Ăn uống",
            Self::Transport => "Di chuyển",
            Self::Shopping => "Mua sắm",
            Self::Bills => "Hóa đơn",
            Self::Entertainment => "Giải trí",
            Self::Salary => "Lương",
            Self::Investment => "Đầu tư",
            Self::Other => "Khác",
        }
    }

    pub fn all() -> &'static [Category] {
        &[
            Self::Food,
            Self::Transport,
            Self::Shopping,
            Self::Bills,
            Self::Entertainment,
            Self::Salary,
            Self::Investment,
            Self::Other,
        ]
    }

    /// Map a model-supplied label to a category, coercing anything unknown to `Other`
    ///
    /// Accepts the English and Vietnamese labels, case-insensitively.
    pub fn normalize(label: &str) -> Self {
        label.parse().unwrap_or(Self::Other)
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|c| {
                c.as_str().to_lowercase() == wanted || c.vietnamese_label().to_lowercase() == wanted
            })
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direction of money flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TransactionKind {
    #[default]
    Expense,
    Income,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "Expense",
            Self::Income => "Income",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "expense" | "chi" => Ok(Self::Expense),
            "income" | "thu" => Ok(Self::Income),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transaction produced by an extraction strategy, not yet in a ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub category: Category,
    /// Whole currency units
    pub amount: u64,
    pub kind: TransactionKind,
    pub note: String,
}

/// A transaction owned by a ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Assigned by the ledger at append time, whole seconds
    pub timestamp: NaiveDateTime,
    pub category: Category,
    pub amount: u64,
    pub kind: TransactionKind,
    pub note: String,
}

impl TransactionRecord {
    pub fn from_new(timestamp: NaiveDateTime, tx: NewTransaction) -> Self {
        Self {
            timestamp,
            category: tx.category,
            amount: tx.amount,
            kind: tx.kind,
            note: tx.note,
        }
    }
}

/// Who said a line in an oral exam
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    Student,
    Examiner,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Examiner => "examiner",
        }
    }
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn student(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Student,
            content: content.into(),
        }
    }

    pub fn examiner(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Examiner,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parses_both_languages() {
        assert_eq!("Food".parse::<Category>().unwrap(), Category::Food);
        assert_eq!("food".parse::<Category>().unwrap(), Category::Food);
        assert_eq!("Ăn uống".parse::<Category>().unwrap(), Category::Food);
        assert_eq!(" Di chuyển ".parse::<Category>().unwrap(), Category::Transport);
        assert_eq!("LƯƠNG".parse::<Category>().unwrap(), Category::Salary);
        assert!("Groceries".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_normalize_coerces_unknown() {
        assert_eq!(Category::normalize("Groceries"), Category::Other);
        assert_eq!(Category::normalize(""), Category::Other);
        assert_eq!(Category::normalize("Giải trí"), Category::Entertainment);
    }

    #[test]
    fn test_category_labels_roundtrip() {
        for c in Category::all() {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), *c);
            assert_eq!(c.vietnamese_label().parse::<Category>().unwrap(), *c);
        }
    }

    #[test]
    fn test_transaction_kind_parse() {
        assert_eq!(
            "Income".parse::<TransactionKind>().unwrap(),
            TransactionKind::Income
        );
        assert_eq!(
            "expense".parse::<TransactionKind>().unwrap(),
            TransactionKind::Expense
        );
        assert!("refund".parse::<TransactionKind>().is_err());
        assert_eq!(TransactionKind::default(), TransactionKind::Expense);
    }

    #[test]
    fn test_chat_turn_constructors() {
        assert_eq!(ChatTurn::student("hi").role, ChatRole::Student);
        assert_eq!(ChatTurn::examiner("why?").role, ChatRole::Examiner);
        assert_eq!(ChatRole::Examiner.to_string(), "examiner");
    }
}
