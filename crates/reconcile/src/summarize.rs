//! Statement-save aggregation: categorized transactions → per-category
//! totals plus the coverage window. The "unmatched goes to Other" fallback
//! lives here, one layer above the rule matcher.

use std::collections::BTreeMap;

use centime_core::{Category, CategoryTotal, DateRange, NormalizedTransaction};
use centime_ingest::rules::{categorize, RuleSet};

#[derive(Debug, Clone)]
pub struct StatementSummary {
    pub totals: Vec<CategoryTotal>,
    pub coverage: Option<DateRange>,
    /// Count of transactions that fell through to the Other bucket because
    /// no rule matched, as opposed to genuinely Other-categorized ones.
    pub unmatched: u32,
}

/// Categorizes every transaction and aggregates signed amounts per category.
/// Totals come out rounded to cents, ordered by the category enumeration.
pub fn summarize(transactions: &[NormalizedTransaction], rules: &RuleSet) -> StatementSummary {
    let mut amounts: BTreeMap<Category, (rust_decimal::Decimal, u32)> = BTreeMap::new();
    let mut coverage: Option<DateRange> = None;
    let mut unmatched = 0u32;

    for tx in transactions {
        let category = match categorize(tx, rules) {
            Some(c) => c,
            None => {
                unmatched += 1;
                Category::Other
            }
        };
        let entry = amounts.entry(category).or_default();
        entry.0 += tx.amount;
        entry.1 += 1;

        coverage = Some(match coverage {
            Some(range) => range.extend(tx.date),
            None => DateRange::single(tx.date),
        });
    }

    let totals = amounts
        .into_iter()
        .map(|(category, (amount, count))| CategoryTotal::new(category, amount, count))
        .collect();

    StatementSummary { totals, coverage, unmatched }
}

#[cfg(test)]
mod tests {
    use super::*;
    use centime_ingest::rules::RuleSet;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn tx(date: (i32, u32, u32), description: &str, amount: Decimal) -> NormalizedTransaction {
        NormalizedTransaction {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            description: description.to_string(),
            vendor: None,
            amount,
            currency: "USD".to_string(),
            balance: None,
            source_category: None,
            source_transaction_id: None,
        }
    }

    fn rules() -> RuleSet {
        RuleSet::from_json(
            r#"[
                {"merchant": "payroll", "category": "Income", "priority": 10},
                {"merchant": "rent", "category": "Housing", "priority": 10}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn aggregates_per_category_with_counts() {
        let txs = vec![
            tx((2024, 3, 1), "ACME PAYROLL", dec!(2000.00)),
            tx((2024, 3, 15), "ACME PAYROLL", dec!(2000.00)),
            tx((2024, 3, 3), "RENT MARCH", dec!(-928.00)),
        ];
        let summary = summarize(&txs, &rules());
        assert_eq!(summary.totals.len(), 2);
        let income = summary.totals.iter().find(|t| t.category == Category::Income).unwrap();
        assert_eq!(income.amount, dec!(4000.00));
        assert_eq!(income.transaction_count, 2);
        let housing = summary.totals.iter().find(|t| t.category == Category::Housing).unwrap();
        assert_eq!(housing.amount, dec!(-928.00));
        assert_eq!(summary.unmatched, 0);
    }

    #[test]
    fn unmatched_falls_back_to_other() {
        let txs = vec![
            tx((2024, 3, 1), "ACME PAYROLL", dec!(2000.00)),
            tx((2024, 3, 9), "MYSTERY VENDOR", dec!(-55.10)),
        ];
        let summary = summarize(&txs, &rules());
        let other = summary.totals.iter().find(|t| t.category == Category::Other).unwrap();
        assert_eq!(other.amount, dec!(-55.10));
        assert_eq!(summary.unmatched, 1);
    }

    #[test]
    fn coverage_window_spans_earliest_to_latest() {
        let txs = vec![
            tx((2024, 3, 9), "ACME PAYROLL", dec!(1.00)),
            tx((2024, 3, 2), "RENT", dec!(-1.00)),
            tx((2024, 3, 28), "MYSTERY", dec!(-1.00)),
        ];
        let summary = summarize(&txs, &rules());
        let coverage = summary.coverage.unwrap();
        assert_eq!(coverage.start, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_eq!(coverage.end, NaiveDate::from_ymd_opt(2024, 3, 28).unwrap());
    }

    #[test]
    fn empty_statement_has_no_coverage() {
        let summary = summarize(&[], &rules());
        assert!(summary.totals.is_empty());
        assert!(summary.coverage.is_none());
    }
}
