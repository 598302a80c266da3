use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a statement's amount column encodes direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignConvention {
    /// Expenses appear as positive numbers; the normalizer flips them negative.
    DebitPositive,
    /// Credits appear as positive numbers; kept as-is, debits flipped.
    CreditPositive,
    /// The column carries explicit signs (or accounting parentheses).
    Signed,
}

/// One statement row after parsing. Expenses are negative, income positive,
/// amounts are exact decimals. Ephemeral unless the caller persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub vendor: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub balance: Option<Decimal>,
    /// Category string supplied by the source statement, if any. Untrusted
    /// until canonicalized against the closed enumeration.
    pub source_category: Option<String>,
    pub source_transaction_id: Option<String>,
}

impl NormalizedTransaction {
    pub fn is_expense(&self) -> bool {
        self.amount < Decimal::ZERO
    }
}
