use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::month::{DateRange, MonthKey};

/// The (user, bank, month, profile) tuple every persisted summary row and
/// statement period hangs off.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatementScope {
    pub user: String,
    pub bank: String,
    pub month: MonthKey,
    pub profile: Option<String>,
}

impl StatementScope {
    pub fn new(user: impl Into<String>, bank: impl Into<String>, month: MonthKey) -> Self {
        StatementScope {
            user: user.into(),
            bank: bank.into(),
            month,
            profile: None,
        }
    }
}

/// A signed per-category total, the unit the validator and mutation engine
/// operate on. Amounts are rounded to 2 fraction digits at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: Category,
    pub amount: Decimal,
    pub transaction_count: u32,
}

impl CategoryTotal {
    pub fn new(category: Category, amount: Decimal, transaction_count: u32) -> Self {
        CategoryTotal {
            category,
            amount: amount.round_dp(2),
            transaction_count,
        }
    }
}

/// Coverage window for one statement: the earliest and latest transaction
/// date observed while normalizing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementPeriod {
    pub scope: StatementScope,
    pub coverage: DateRange,
}
