//! Schema resolution: turns a persisted column-mapping schema into typed
//! column indices, rejecting references that look like data values rather
//! than indices (the signature of a corrupted schema).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

use centime_core::SignConvention;

/// Raw column reference as it arrives from the preference store: a number,
/// a numeric string, or (for composite description fields) a list of either.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(i64),
    Text(String),
    Many(Vec<ColumnRef>),
}

/// A named, versioned column mapping owned by a (user, bank, file-format)
/// tuple. Read-only to the parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsingSchema {
    pub name: String,
    #[serde(default)]
    pub version: u32,
    pub column_mappings: BTreeMap<String, ColumnRef>,
    pub date_format: String,
    pub currency: String,
    #[serde(default)]
    pub first_transaction_row: usize,
    pub amount_sign_convention: SignConvention,
}

/// Field names the resolver recognizes in `column_mappings`.
const KNOWN_FIELDS: &[&str] = &[
    "date",
    "description",
    "amount",
    "inflow",
    "outflow",
    "vendor",
    "balance",
    "category",
    "transaction_id",
    "currency",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFault {
    pub field: String,
    pub reason: FaultReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultReason {
    NotAnInteger(String),
    Negative(i64),
    OutOfBounds { index: usize, column_count: usize },
    LooksLikeDate(String),
    LooksLikeDecimal(String),
    ListNotAllowed,
    UnknownField,
}

impl fmt::Display for FaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultReason::NotAnInteger(v) => write!(f, "'{v}' is not an integer column index"),
            FaultReason::Negative(v) => write!(f, "column index {v} is negative"),
            FaultReason::OutOfBounds { index, column_count } => {
                write!(f, "column index {index} exceeds table width {column_count}")
            }
            FaultReason::LooksLikeDate(v) => {
                write!(f, "'{v}' looks like a date, not a column index")
            }
            FaultReason::LooksLikeDecimal(v) => {
                write!(f, "'{v}' looks like an amount, not a column index")
            }
            FaultReason::ListNotAllowed => {
                write!(f, "only the description field may map to multiple columns")
            }
            FaultReason::UnknownField => write!(f, "not a recognized field name"),
        }
    }
}

/// Whole-resolution failure: every faulted field, so the caller can decide
/// between re-deriving the schema and rejecting the statement.
#[derive(Debug, Clone, Error)]
pub struct SchemaError {
    pub faults: Vec<FieldFault>,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema resolution failed: ")?;
        for (i, fault) in self.faults.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", fault.field, fault.reason)?;
        }
        Ok(())
    }
}

/// Column indices after validation against an actual table shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSchema {
    pub date: usize,
    pub description: Vec<usize>,
    pub amount: Option<usize>,
    pub inflow: Option<usize>,
    pub outflow: Option<usize>,
    pub vendor: Option<usize>,
    pub balance: Option<usize>,
    pub category: Option<usize>,
    pub transaction_id: Option<usize>,
    pub currency_column: Option<usize>,
    pub date_format: String,
    pub currency: String,
    pub first_transaction_row: usize,
    pub sign_convention: SignConvention,
}

// DD-MM-YYYY / YYYY-MM-DD shapes with -, / or . separators. A stored date is
// the most common corruption observed in persisted mappings.
static DATE_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,4}[-/.]\d{1,2}[-/.]\d{1,4}$").unwrap());

// A decimal-looking value with more than 4 digits total, e.g. "10804.79".
static DECIMAL_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d[\d,]*[.,]\d+$").unwrap());

fn looks_like_data(s: &str) -> Option<FaultReason> {
    if DATE_LIKE.is_match(s) {
        return Some(FaultReason::LooksLikeDate(s.to_string()));
    }
    if DECIMAL_LIKE.is_match(s) && s.chars().filter(|c| c.is_ascii_digit()).count() > 4 {
        return Some(FaultReason::LooksLikeDecimal(s.to_string()));
    }
    None
}

fn resolve_single(
    field: &str,
    value: &ColumnRef,
    column_count: usize,
    faults: &mut Vec<FieldFault>,
) -> Option<usize> {
    let fault = |reason| FieldFault { field: field.to_string(), reason };

    let raw = match value {
        ColumnRef::Index(n) => *n,
        ColumnRef::Text(s) => {
            let s = s.trim();
            if let Some(reason) = looks_like_data(s) {
                faults.push(fault(reason));
                return None;
            }
            match s.parse::<i64>() {
                Ok(n) => n,
                Err(_) => {
                    faults.push(fault(FaultReason::NotAnInteger(s.to_string())));
                    return None;
                }
            }
        }
        ColumnRef::Many(_) => {
            faults.push(fault(FaultReason::ListNotAllowed));
            return None;
        }
    };

    if raw < 0 {
        faults.push(fault(FaultReason::Negative(raw)));
        return None;
    }
    let index = raw as usize;
    if index >= column_count {
        faults.push(fault(FaultReason::OutOfBounds { index, column_count }));
        return None;
    }
    Some(index)
}

/// Validates and resolves `schema` against a table `column_count` columns
/// wide. Pure; any faulted field fails the whole resolution.
pub fn resolve(schema: &ParsingSchema, column_count: usize) -> Result<ResolvedSchema, SchemaError> {
    let mut faults = Vec::new();
    let mut resolved = ResolvedSchema {
        date: 0,
        description: Vec::new(),
        amount: None,
        inflow: None,
        outflow: None,
        vendor: None,
        balance: None,
        category: None,
        transaction_id: None,
        currency_column: None,
        date_format: schema.date_format.clone(),
        currency: schema.currency.clone(),
        first_transaction_row: schema.first_transaction_row,
        sign_convention: schema.amount_sign_convention,
    };
    let mut saw_date = false;

    for (field, value) in &schema.column_mappings {
        if !KNOWN_FIELDS.contains(&field.as_str()) {
            faults.push(FieldFault {
                field: field.clone(),
                reason: FaultReason::UnknownField,
            });
            continue;
        }

        if field == "description" {
            let refs: Vec<&ColumnRef> = match value {
                ColumnRef::Many(list) => list.iter().collect(),
                single => vec![single],
            };
            for r in refs {
                if let Some(idx) = resolve_single(field, r, column_count, &mut faults) {
                    resolved.description.push(idx);
                }
            }
            continue;
        }

        let Some(idx) = resolve_single(field, value, column_count, &mut faults) else {
            continue;
        };
        match field.as_str() {
            "date" => {
                resolved.date = idx;
                saw_date = true;
            }
            "amount" => resolved.amount = Some(idx),
            "inflow" => resolved.inflow = Some(idx),
            "outflow" => resolved.outflow = Some(idx),
            "vendor" => resolved.vendor = Some(idx),
            "balance" => resolved.balance = Some(idx),
            "category" => resolved.category = Some(idx),
            "transaction_id" => resolved.transaction_id = Some(idx),
            "currency" => resolved.currency_column = Some(idx),
            _ => unreachable!("field list checked above"),
        }
    }

    if !saw_date && !schema.column_mappings.contains_key("date") {
        faults.push(FieldFault {
            field: "date".to_string(),
            reason: FaultReason::NotAnInteger("<missing>".to_string()),
        });
    }
    if resolved.amount.is_none()
        && resolved.inflow.is_none()
        && resolved.outflow.is_none()
        && !schema.column_mappings.contains_key("amount")
        && !schema.column_mappings.contains_key("inflow")
        && !schema.column_mappings.contains_key("outflow")
    {
        faults.push(FieldFault {
            field: "amount".to_string(),
            reason: FaultReason::NotAnInteger("<missing>".to_string()),
        });
    }

    if faults.is_empty() {
        Ok(resolved)
    } else {
        Err(SchemaError { faults })
    }
}
