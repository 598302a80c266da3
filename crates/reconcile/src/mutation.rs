//! Category mutation engine: batched edits and transfers over persisted
//! category totals. The batch is all-or-nothing, transfers are exactly
//! zero-sum, and every operation leaves an audit entry.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use centime_core::{Category, MonthKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MutationOperation {
    Edit {
        category: Category,
        new_amount: Decimal,
        #[serde(default)]
        note: Option<String>,
    },
    Transfer {
        from_category: Category,
        to_category: Category,
        transfer_amount: Decimal,
        #[serde(default)]
        note: Option<String>,
    },
}

/// Which sign rule a transfer used, derived from the source total before
/// the transfer was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// Negative source total: moving expense means the source rises toward
    /// zero and the destination absorbs more expense.
    Expense,
    /// Non-negative source total: value moves conventionally.
    Income,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Expense => write!(f, "expense source: source += amount, destination -= amount"),
            SourceKind::Income => write!(f, "income source: source -= amount, destination += amount"),
        }
    }
}

/// Per-operation audit record: old value, new value, and for transfers the
/// inferred sign handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuditEntry {
    Edit {
        category: Category,
        old_amount: Option<Decimal>,
        new_amount: Decimal,
    },
    Transfer {
        from_category: Category,
        to_category: Category,
        from_old: Decimal,
        from_new: Decimal,
        to_old: Option<Decimal>,
        to_new: Decimal,
        source_kind: SourceKind,
    },
}

#[derive(Debug, Clone)]
pub struct MutationOutcome {
    /// Absolute new total per affected category.
    pub totals: BTreeMap<Category, Decimal>,
    pub audit: Vec<AuditEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationFault {
    #[error("transfer amount must be strictly positive")]
    NonPositiveTransfer,
    #[error("cannot transfer from {0} to itself")]
    SameCategoryTransfer(Category),
    #[error("source category {0} has no stored total")]
    MissingSource(Category),
    #[error("editing {0} into existence requires a target month")]
    EditWithoutMonth(Category),
}

/// The whole batch is rejected; faults are enumerated per operation index.
#[derive(Debug, Clone, Error)]
pub struct MutationError {
    pub faults: Vec<(usize, OperationFault)>,
}

impl fmt::Display for MutationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mutation batch rejected: ")?;
        for (i, (index, fault)) in self.faults.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "operation {index}: {fault}")?;
        }
        Ok(())
    }
}

/// Applies a batch of mutations against a running view of the current
/// totals. Validation of every operation happens against that running view
/// before anything is returned; one structurally invalid operation rejects
/// the whole batch.
pub fn apply_mutations(
    operations: &[MutationOperation],
    current_totals: &BTreeMap<Category, Decimal>,
    target_month: Option<MonthKey>,
) -> Result<MutationOutcome, MutationError> {
    let mut totals = current_totals.clone();
    let mut audit = Vec::with_capacity(operations.len());
    let mut faults = Vec::new();

    for (index, op) in operations.iter().enumerate() {
        match op {
            MutationOperation::Edit { category, new_amount, .. } => {
                let old_amount = totals.get(category).copied();
                if old_amount.is_none() && target_month.is_none() {
                    faults.push((index, OperationFault::EditWithoutMonth(*category)));
                    continue;
                }
                let new_amount = new_amount.round_dp(2);
                totals.insert(*category, new_amount);
                audit.push(AuditEntry::Edit {
                    category: *category,
                    old_amount,
                    new_amount,
                });
            }
            MutationOperation::Transfer {
                from_category,
                to_category,
                transfer_amount,
                ..
            } => {
                // Rounded before validation: a sub-cent amount that rounds
                // to zero is rejected, not silently applied as a no-op.
                let amount = transfer_amount.round_dp(2);
                if amount <= Decimal::ZERO {
                    faults.push((index, OperationFault::NonPositiveTransfer));
                    continue;
                }
                if from_category == to_category {
                    faults.push((index, OperationFault::SameCategoryTransfer(*from_category)));
                    continue;
                }
                let Some(from_old) = totals.get(from_category).copied() else {
                    faults.push((index, OperationFault::MissingSource(*from_category)));
                    continue;
                };
                let to_old = totals.get(to_category).copied();

                // The sign rule keys off the source total before the
                // transfer: an expense bucket sheds expense, an income
                // bucket sheds value. Either way the two deltas cancel.
                let source_kind = if from_old < Decimal::ZERO {
                    SourceKind::Expense
                } else {
                    SourceKind::Income
                };
                let (from_new, to_new) = match source_kind {
                    SourceKind::Expense => (
                        from_old + amount,
                        to_old.unwrap_or(Decimal::ZERO) - amount,
                    ),
                    SourceKind::Income => (
                        from_old - amount,
                        to_old.unwrap_or(Decimal::ZERO) + amount,
                    ),
                };
                debug_assert_eq!(
                    (from_new - from_old) + (to_new - to_old.unwrap_or(Decimal::ZERO)),
                    Decimal::ZERO
                );

                totals.insert(*from_category, from_new);
                totals.insert(*to_category, to_new);
                audit.push(AuditEntry::Transfer {
                    from_category: *from_category,
                    to_category: *to_category,
                    from_old,
                    from_new,
                    to_old,
                    to_new,
                    source_kind,
                });
            }
        }
    }

    if !faults.is_empty() {
        return Err(MutationError { faults });
    }

    tracing::info!(operations = operations.len(), "mutation batch applied");
    Ok(MutationOutcome { totals, audit })
}
