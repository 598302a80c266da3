//! Locale-tolerant amount lexing. Statement exports disagree on decimal
//! separators, thousands separators, currency symbols and negative-number
//! conventions; this module maps all of them onto exact `Decimal` values.

use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("empty amount")]
    Empty,
    #[error("unparsable amount: '{0}'")]
    Unparsable(String),
}

/// Parses one raw amount cell.
///
/// - currency symbols, codes and whitespace are stripped
/// - `(43.35)` is the accounting convention for `-43.35`
/// - when both `,` and `.` appear, the rightmost one is the decimal
///   separator and the other is a thousands separator
/// - a lone `,` is a decimal separator (`10804,79` → `10804.79`); repeated
///   occurrences of a single separator are all thousands separators
pub fn parse_amount(raw: &str) -> Result<Decimal, AmountError> {
    let stripped = strip_noise(raw);
    if stripped.is_empty() {
        return Err(AmountError::Empty);
    }

    let (negative_parens, body) = match stripped.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner.trim().to_string()),
        None => (false, stripped),
    };
    if body.is_empty() {
        return Err(AmountError::Unparsable(raw.to_string()));
    }

    let normalized = normalize_separators(&body);
    let mut value =
        Decimal::from_str(&normalized).map_err(|_| AmountError::Unparsable(raw.to_string()))?;
    if negative_parens {
        value = -value;
    }
    Ok(value)
}

/// True when the cell carries its own direction: a leading sign or the
/// accounting-parentheses form. Used for per-statement sign-convention
/// auto-detection.
pub fn has_explicit_sign(raw: &str) -> bool {
    let stripped = strip_noise(raw);
    stripped.starts_with('-')
        || stripped.starts_with('+')
        || (stripped.starts_with('(') && stripped.ends_with(')'))
}

/// Removes whitespace, currency symbols and alphabetic currency codes,
/// keeping digits, separators, signs and parentheses.
fn strip_noise(raw: &str) -> String {
    raw.chars()
        .filter(|c| matches!(c, '0'..='9' | ',' | '.' | '-' | '+' | '(' | ')'))
        .collect()
}

fn normalize_separators(body: &str) -> String {
    let commas = body.matches(',').count();
    let dots = body.matches('.').count();

    match (commas, dots) {
        (0, 0) => body.to_string(),
        (0, 1) => body.to_string(),
        // Repeated single separator: all thousands groupings.
        (0, _) => body.replace('.', ""),
        (1, 0) => body.replace(',', "."),
        (_, 0) => body.replace(',', ""),
        // Both present: the rightmost separator is the decimal one.
        _ => {
            let last_comma = body.rfind(',').unwrap();
            let last_dot = body.rfind('.').unwrap();
            if last_comma > last_dot {
                body.replace('.', "").replace(',', ".")
            } else {
                body.replace(',', "")
            }
        }
    }
}
