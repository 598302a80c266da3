//! Persisted category summaries and statement periods. Statement saves are
//! idempotent delete-matching-then-insert batches; mutation batches run as
//! one read-modify-write transaction so two concurrent batches never see
//! stale totals.

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::{Executor, Sqlite};

use centime_core::{Category, CategoryTotal, StatementScope};
use centime_reconcile::{
    apply_mutations, validate, MutationOperation, MutationOutcome, ReconciliationReport,
    StatementSummary,
};

use crate::db::{DbPool, StorageError};

/// Everything one accepted statement writes: totals, coverage window, and
/// the currency they are denominated in.
#[derive(Debug, Clone)]
pub struct StatementSave {
    pub scope: StatementScope,
    pub summary: StatementSummary,
    pub currency: String,
    pub asserted_net_flow: Decimal,
}

fn to_cents(amount: Decimal) -> Result<i64, StorageError> {
    (amount.round_dp(2) * Decimal::from(100))
        .to_i64()
        .ok_or_else(|| StorageError::Corrupt(format!("amount out of range: {amount}")))
}

fn from_cents(cents: i64) -> Decimal {
    Decimal::from(cents) / Decimal::from(100)
}

fn parse_category(name: &str) -> Result<Category, StorageError> {
    Category::canonicalize(name)
        .ok_or_else(|| StorageError::Corrupt(format!("stored category '{name}' is not in the enumeration")))
}

/// Validates and, on acceptance, atomically replaces every summary and
/// period row for the statement's (user, bank, month, profile) scope. A
/// re-save of the same statement is idempotent. Rejection writes nothing.
pub async fn save_statement(
    pool: &DbPool,
    save: &StatementSave,
) -> Result<ReconciliationReport, StorageError> {
    let report = validate(&save.summary.totals, save.asserted_net_flow);
    if !report.is_accepted() {
        return Err(StorageError::ReconciliationRejected(Box::new(report)));
    }

    let scope = &save.scope;
    let month = scope.month.to_string();
    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM category_summaries
         WHERE user = ? AND bank = ? AND month = ? AND profile IS ?",
    )
    .bind(&scope.user)
    .bind(&scope.bank)
    .bind(&month)
    .bind(&scope.profile)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "DELETE FROM statement_periods
         WHERE user = ? AND bank = ? AND month = ? AND profile IS ?",
    )
    .bind(&scope.user)
    .bind(&scope.bank)
    .bind(&month)
    .bind(&scope.profile)
    .execute(&mut *tx)
    .await?;

    for total in &save.summary.totals {
        sqlx::query(
            "INSERT INTO category_summaries
             (user, bank, month, profile, category, amount_cents, currency, transaction_count)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&scope.user)
        .bind(&scope.bank)
        .bind(&month)
        .bind(&scope.profile)
        .bind(total.category.as_str())
        .bind(to_cents(total.amount)?)
        .bind(&save.currency)
        .bind(total.transaction_count as i64)
        .execute(&mut *tx)
        .await?;
    }

    if let Some(coverage) = save.summary.coverage {
        sqlx::query(
            "INSERT INTO statement_periods (user, bank, month, profile, start_date, end_date)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&scope.user)
        .bind(&scope.bank)
        .bind(&month)
        .bind(&scope.profile)
        .bind(coverage.start.to_string())
        .bind(coverage.end.to_string())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::info!(
        user = %scope.user,
        bank = %scope.bank,
        month = %month,
        categories = save.summary.totals.len(),
        "statement saved"
    );
    Ok(report)
}

async fn read_totals<'e, E>(
    executor: E,
    scope: &StatementScope,
) -> Result<BTreeMap<Category, Decimal>, StorageError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT category, amount_cents FROM category_summaries
         WHERE user = ? AND bank = ? AND month = ? AND profile IS ?",
    )
    .bind(&scope.user)
    .bind(&scope.bank)
    .bind(scope.month.to_string())
    .bind(&scope.profile)
    .fetch_all(executor)
    .await?;

    let mut totals = BTreeMap::new();
    for (name, cents) in rows {
        totals.insert(parse_category(&name)?, from_cents(cents));
    }
    Ok(totals)
}

/// Current totals for one statement scope.
pub async fn load_totals(
    pool: &DbPool,
    scope: &StatementScope,
) -> Result<BTreeMap<Category, Decimal>, StorageError> {
    read_totals(pool, scope).await
}

/// Loads persisted summary rows for a scope, for reporting.
pub async fn load_summaries(
    pool: &DbPool,
    scope: &StatementScope,
) -> Result<Vec<CategoryTotal>, StorageError> {
    let rows = sqlx::query_as::<_, (String, i64, i64)>(
        "SELECT category, amount_cents, transaction_count FROM category_summaries
         WHERE user = ? AND bank = ? AND month = ? AND profile IS ?
         ORDER BY category",
    )
    .bind(&scope.user)
    .bind(&scope.bank)
    .bind(scope.month.to_string())
    .bind(&scope.profile)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(name, cents, count)| {
            Ok(CategoryTotal::new(
                parse_category(&name)?,
                from_cents(cents),
                count as u32,
            ))
        })
        .collect()
}

/// Applies a mutation batch as one atomic read-modify-write transaction
/// against the scope's persisted totals. Rows created for new categories
/// inherit the currency the scope's existing rows are denominated in;
/// `fallback_currency` only applies when the scope is empty. The upsert uses
/// an explicit existence check because the nullable profile column defeats a
/// UNIQUE index (two NULLs never compare equal).
pub async fn apply_mutation_batch(
    pool: &DbPool,
    scope: &StatementScope,
    operations: &[MutationOperation],
    fallback_currency: &str,
) -> Result<MutationOutcome, StorageError> {
    let month = scope.month.to_string();
    let mut tx = pool.begin().await?;

    let current = read_totals(&mut *tx, scope).await?;
    let outcome = apply_mutations(operations, &current, Some(scope.month))?;

    let stored_currency = sqlx::query_as::<_, (String,)>(
        "SELECT currency FROM category_summaries
         WHERE user = ? AND bank = ? AND month = ? AND profile IS ?
         LIMIT 1",
    )
    .bind(&scope.user)
    .bind(&scope.bank)
    .bind(&month)
    .bind(&scope.profile)
    .fetch_optional(&mut *tx)
    .await?;
    let currency = stored_currency
        .map(|(c,)| c)
        .unwrap_or_else(|| fallback_currency.to_string());

    for (category, amount) in &outcome.totals {
        let cents = to_cents(*amount)?;
        let existing = sqlx::query_as::<_, (i64,)>(
            "SELECT id FROM category_summaries
             WHERE user = ? AND bank = ? AND month = ? AND profile IS ? AND category = ?",
        )
        .bind(&scope.user)
        .bind(&scope.bank)
        .bind(&month)
        .bind(&scope.profile)
        .bind(category.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        match existing {
            Some((id,)) => {
                sqlx::query(
                    "UPDATE category_summaries
                     SET amount_cents = ?, updated_at = datetime('now')
                     WHERE id = ?",
                )
                .bind(cents)
                .bind(id)
                .execute(&mut *tx)
                .await?;
            }
            None => {
                sqlx::query(
                    "INSERT INTO category_summaries
                     (user, bank, month, profile, category, amount_cents, currency, transaction_count)
                     VALUES (?, ?, ?, ?, ?, ?, ?, 0)",
                )
                .bind(&scope.user)
                .bind(&scope.bank)
                .bind(&month)
                .bind(&scope.profile)
                .bind(category.as_str())
                .bind(cents)
                .bind(&currency)
                .execute(&mut *tx)
                .await?;
            }
        }
    }

    tx.commit().await?;
    tracing::info!(
        user = %scope.user,
        bank = %scope.bank,
        month = %month,
        operations = operations.len(),
        "mutation batch committed"
    );
    Ok(outcome)
}
