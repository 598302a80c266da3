//! Row normalization: one raw statement row → one `NormalizedTransaction`.
//! A bad row degrades to a collected error, never an aborted statement.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use centime_core::{NormalizedTransaction, SignConvention};

use crate::amount::{has_explicit_sign, parse_amount, AmountError};
use crate::schema::ResolvedSchema;

/// Fallbacks tried after the schema's declared date format fails.
const DATE_FALLBACKS: &[&str] = &[
    "%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y", "%m-%d-%Y",
];

/// Cell values treated as "no content" when assembling descriptions.
const PLACEHOLDERS: &[&str] = &["-", "n/a", "na", "null", "none"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("row has {got} columns, schema needs column {needed}")]
    TooShort { needed: usize, got: usize },
    #[error("unparsable date: '{0}'")]
    BadDate(String),
    #[error("bad amount: {0}")]
    BadAmount(#[from] AmountError),
    #[error("row is empty")]
    Empty,
}

/// A failed row with its zero-based index in the input table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    pub row_index: usize,
    pub error: RowError,
}

/// Result of normalizing a whole statement: the rows that parsed, plus the
/// collected per-row failures.
#[derive(Debug, Clone)]
pub struct RowBatch {
    pub transactions: Vec<NormalizedTransaction>,
    pub errors: Vec<RowFailure>,
    /// The convention actually applied, after auto-detection.
    pub sign_convention: SignConvention,
}

#[derive(Debug, Clone, Error)]
#[error("no rows parsed: {row_count} data rows, all failed")]
pub struct NoRowsParsed {
    pub row_count: usize,
    pub sample: Vec<RowFailure>,
}

fn cell<'a>(row: &'a [String], index: usize) -> Result<&'a str, RowError> {
    row.get(index)
        .map(|s| s.trim())
        .ok_or(RowError::TooShort { needed: index, got: row.len() })
}

fn optional_cell<'a>(row: &'a [String], index: Option<usize>) -> Option<&'a str> {
    index
        .and_then(|i| row.get(i))
        .map(|s| s.trim())
        .filter(|s| !is_placeholder(s))
}

fn is_placeholder(s: &str) -> bool {
    s.is_empty() || PLACEHOLDERS.contains(&s.to_lowercase().as_str())
}

fn parse_date(raw: &str, declared: &str) -> Result<NaiveDate, RowError> {
    if let Ok(d) = NaiveDate::parse_from_str(raw, declared) {
        return Ok(d);
    }
    for fmt in DATE_FALLBACKS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Ok(d);
        }
    }
    Err(RowError::BadDate(raw.to_string()))
}

/// Normalizes a single row under an already-decided sign convention.
/// Pure: identical input always yields an identical transaction.
pub fn normalize_row(
    row: &[String],
    schema: &ResolvedSchema,
    convention: SignConvention,
) -> Result<NormalizedTransaction, RowError> {
    if row.iter().all(|c| c.trim().is_empty()) {
        return Err(RowError::Empty);
    }

    let date = parse_date(cell(row, schema.date)?, &schema.date_format)?;

    let description = schema
        .description
        .iter()
        .filter_map(|&i| row.get(i))
        .map(|s| s.trim())
        .filter(|s| !is_placeholder(s))
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();

    let amount = read_amount(row, schema, convention)?;

    let balance = optional_cell(row, schema.balance)
        .map(parse_amount)
        .transpose()?;

    let currency = optional_cell(row, schema.currency_column)
        .map(|s| s.to_uppercase())
        .unwrap_or_else(|| schema.currency.clone());

    Ok(NormalizedTransaction {
        date,
        description,
        vendor: optional_cell(row, schema.vendor).map(str::to_string),
        amount,
        currency,
        balance,
        source_category: optional_cell(row, schema.category).map(str::to_string),
        source_transaction_id: optional_cell(row, schema.transaction_id).map(str::to_string),
    })
}

fn read_amount(
    row: &[String],
    schema: &ResolvedSchema,
    convention: SignConvention,
) -> Result<Decimal, RowError> {
    if let Some(col) = schema.amount {
        let raw = cell(row, col)?;
        let value = parse_amount(raw)?;
        let signed = match convention {
            SignConvention::Signed => value,
            // Debit-positive sources list expenses as positives; flip so
            // expenses come out negative.
            SignConvention::DebitPositive => -value,
            SignConvention::CreditPositive => value,
        };
        return Ok(signed);
    }

    // Split inflow/outflow columns: outflow alone implies a negative amount,
    // both absent means zero.
    let inflow = optional_cell(row, schema.inflow)
        .map(parse_amount)
        .transpose()?
        .unwrap_or(Decimal::ZERO);
    let outflow = optional_cell(row, schema.outflow)
        .map(parse_amount)
        .transpose()?
        .unwrap_or(Decimal::ZERO);
    Ok(inflow - outflow)
}

/// Decides the sign convention for one statement by sampling the raw amount
/// column: any explicitly signed or parenthesized value means the data
/// carries its own signs, which overrides the declared policy. Runs once per
/// statement so every row is normalized under the same convention.
pub fn detect_sign_convention(rows: &[Vec<String>], schema: &ResolvedSchema) -> SignConvention {
    let Some(col) = schema.amount else {
        // Inflow/outflow sources have no sign column to inspect.
        return schema.sign_convention;
    };
    let declared = schema.sign_convention;
    if declared == SignConvention::Signed {
        return declared;
    }
    let data_rows = rows.iter().skip(schema.first_transaction_row);
    for row in data_rows {
        if let Some(raw) = row.get(col) {
            if has_explicit_sign(raw) {
                tracing::info!(
                    "amount column carries explicit signs, overriding declared convention"
                );
                return SignConvention::Signed;
            }
        }
    }
    declared
}

/// Normalizes every data row of a statement. Per-row failures are collected,
/// not thrown; the whole statement fails only when nothing parses.
pub fn normalize_rows(
    rows: &[Vec<String>],
    schema: &ResolvedSchema,
) -> Result<RowBatch, NoRowsParsed> {
    let convention = detect_sign_convention(rows, schema);

    let mut transactions = Vec::new();
    let mut errors = Vec::new();
    let mut data_rows = 0usize;

    for (row_index, row) in rows.iter().enumerate().skip(schema.first_transaction_row) {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        data_rows += 1;
        match normalize_row(row, schema, convention) {
            Ok(tx) => transactions.push(tx),
            Err(error) => errors.push(RowFailure { row_index, error }),
        }
    }

    if transactions.is_empty() && data_rows > 0 {
        let sample = errors.into_iter().take(5).collect();
        return Err(NoRowsParsed { row_count: data_rows, sample });
    }

    if !errors.is_empty() {
        tracing::warn!(
            failed = errors.len(),
            parsed = transactions.len(),
            "some statement rows failed to normalize"
        );
    }

    Ok(RowBatch { transactions, errors, sign_convention: convention })
}
