//! Reconciliation gating: categorized totals must agree with the externally
//! asserted net flow, and a statement that is mostly "Other" despite real
//! categorization having happened is a failed classification pass, not a
//! valid save.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use centime_core::{Category, CategoryTotal};

/// Relative tolerance between category sum and asserted net flow.
const RELATIVE_TOLERANCE: Decimal = dec!(0.025);
/// Absolute floor, so near-zero statements don't reject on cents.
const ABSOLUTE_FLOOR: Decimal = dec!(1.00);
/// Above this Other-share, with any real categorization present, reject.
const OTHER_REJECT_RATIO: Decimal = dec!(0.60);
/// Above this Other-share, warn but accept.
const OTHER_ADVISORY_RATIO: Decimal = dec!(0.40);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateFailure {
    /// |calculated − asserted| exceeded the tolerance threshold.
    NetFlowMismatch,
    /// Every category in the batch is Other: nothing was classified.
    AllUncategorized,
    /// Other dominates even though some real categorization happened.
    ExcessiveOther,
}

/// Full diagnostic detail for one validation, pass or fail. The three gates
/// are independent; any failure rejects the whole batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub calculated: Decimal,
    pub asserted: Decimal,
    pub difference: Decimal,
    pub percent_difference: Decimal,
    pub threshold: Decimal,
    pub other_ratio: Decimal,
    pub failures: Vec<GateFailure>,
    /// Non-fatal: Other share is high enough to be worth a second look.
    pub advisory: bool,
}

impl ReconciliationReport {
    pub fn is_accepted(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Validates category totals against the asserted net flow. Pure; the
/// caller persists on accept.
pub fn validate(totals: &[CategoryTotal], asserted_net_flow: Decimal) -> ReconciliationReport {
    let calculated: Decimal = totals.iter().map(|t| t.amount).sum();
    let difference = (calculated - asserted_net_flow).abs();
    let threshold = (asserted_net_flow.abs() * RELATIVE_TOLERANCE).max(ABSOLUTE_FLOOR);
    let percent_difference = if asserted_net_flow.is_zero() {
        Decimal::ZERO
    } else {
        (difference / asserted_net_flow.abs() * dec!(100)).round_dp(2)
    };

    let total_abs: Decimal = totals.iter().map(|t| t.amount.abs()).sum();
    let other_abs: Decimal = totals
        .iter()
        .filter(|t| t.category == Category::Other)
        .map(|t| t.amount.abs())
        .sum();
    // The gates compare the exact ratio; rounding happens only for the
    // report, so a hairline overshoot cannot round itself under the limit.
    let exact_ratio = if total_abs.is_zero() {
        Decimal::ZERO
    } else {
        other_abs / total_abs
    };
    let other_ratio = exact_ratio.round_dp(4);
    let has_real_category = totals
        .iter()
        .any(|t| t.category != Category::Other && !t.amount.is_zero());

    let mut failures = Vec::new();
    if difference > threshold {
        failures.push(GateFailure::NetFlowMismatch);
    }
    if !totals.is_empty() && totals.iter().all(|t| t.category == Category::Other) {
        failures.push(GateFailure::AllUncategorized);
    }
    // Literal conjunction: a lone Other category with nothing else trips the
    // all-Other gate above, not this one.
    if exact_ratio > OTHER_REJECT_RATIO && has_real_category {
        failures.push(GateFailure::ExcessiveOther);
    }

    let advisory = failures.is_empty() && exact_ratio >= OTHER_ADVISORY_RATIO;
    if advisory {
        tracing::warn!(%other_ratio, "high share of uncategorized activity");
    }
    if !failures.is_empty() {
        tracing::warn!(
            %calculated,
            %asserted_net_flow,
            %difference,
            %threshold,
            ?failures,
            "reconciliation rejected"
        );
    }

    ReconciliationReport {
        calculated,
        asserted: asserted_net_flow,
        difference,
        percent_difference,
        threshold,
        other_ratio,
        failures,
        advisory,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total(category: Category, amount: Decimal) -> CategoryTotal {
        CategoryTotal::new(category, amount, 1)
    }

    #[test]
    fn within_tolerance_accepts() {
        // 3000 vs 3072: 2.4% off, inside the 2.5% band.
        let totals = vec![total(Category::Income, dec!(3000))];
        let report = validate(&totals, dec!(3072));
        assert!(report.is_accepted());
        assert_eq!(report.calculated, dec!(3000));
        assert_eq!(report.difference, dec!(72));
    }

    #[test]
    fn outside_tolerance_rejects() {
        // 3000 vs 3078: 2.6% off.
        let totals = vec![total(Category::Income, dec!(3000))];
        let report = validate(&totals, dec!(3078));
        assert!(!report.is_accepted());
        assert_eq!(report.failures, vec![GateFailure::NetFlowMismatch]);
        assert_eq!(report.threshold, dec!(76.950));
    }

    #[test]
    fn absolute_floor_on_near_zero_statements() {
        // Asserted flow of 2: relative tolerance would be 0.05, the floor
        // keeps a 90-cent difference acceptable.
        let totals = vec![total(Category::Income, dec!(2.90))];
        let report = validate(&totals, dec!(2.00));
        assert!(report.is_accepted());

        let report = validate(&[total(Category::Income, dec!(3.10))], dec!(2.00));
        assert!(!report.is_accepted());
    }

    #[test]
    fn all_other_always_rejects() {
        let totals = vec![total(Category::Other, dec!(500)), total(Category::Other, dec!(-500))];
        // Net flow matches exactly, yet the batch is unclassified.
        let report = validate(&totals, dec!(0));
        assert!(report.failures.contains(&GateFailure::AllUncategorized));
    }

    #[test]
    fn single_other_category_trips_all_other_not_ratio_gate() {
        let totals = vec![total(Category::Other, dec!(-300))];
        let report = validate(&totals, dec!(-300));
        assert!(report.failures.contains(&GateFailure::AllUncategorized));
        // other_ratio is 100% but the ratio gate needs a non-Other category
        // with non-zero total; the literal conjunction is preserved.
        assert!(!report.failures.contains(&GateFailure::ExcessiveOther));
    }

    #[test]
    fn excessive_other_with_real_categories_rejects() {
        let totals = vec![
            total(Category::Other, dec!(-700)),
            total(Category::FoodGroceries, dec!(-300)),
        ];
        let report = validate(&totals, dec!(-1000));
        assert_eq!(report.other_ratio, dec!(0.70));
        assert!(report.failures.contains(&GateFailure::ExcessiveOther));
    }

    #[test]
    fn hairline_ratio_overshoot_still_rejects() {
        // True ratio 0.6000001 rounds to 0.6000 in the report but the gate
        // must still see it as above the limit.
        let totals = vec![
            total(Category::Other, dec!(-60000.01)),
            total(Category::FoodGroceries, dec!(-39999.99)),
        ];
        let report = validate(&totals, dec!(-100000.00));
        assert_eq!(report.other_ratio, dec!(0.6000));
        assert!(report.failures.contains(&GateFailure::ExcessiveOther));
    }

    #[test]
    fn advisory_band_accepts_with_warning() {
        let totals = vec![
            total(Category::Other, dec!(-450)),
            total(Category::FoodGroceries, dec!(-550)),
        ];
        let report = validate(&totals, dec!(-1000));
        assert!(report.is_accepted());
        assert!(report.advisory);
    }

    #[test]
    fn clean_statement_no_advisory() {
        let totals = vec![
            total(Category::Income, dec!(4000)),
            total(Category::Housing, dec!(-928)),
        ];
        let report = validate(&totals, dec!(3072));
        assert!(report.is_accepted());
        assert!(!report.advisory);
        assert_eq!(report.other_ratio, Decimal::ZERO);
    }

    #[test]
    fn gates_are_independent() {
        // Tolerance failure and ratio failure can both be reported.
        let totals = vec![
            total(Category::Other, dec!(-700)),
            total(Category::FoodGroceries, dec!(-300)),
        ];
        let report = validate(&totals, dec!(-2000));
        assert!(report.failures.contains(&GateFailure::NetFlowMismatch));
        assert!(report.failures.contains(&GateFailure::ExcessiveOther));
    }

    #[test]
    fn empty_totals_do_not_divide_by_zero() {
        let report = validate(&[], dec!(0));
        assert_eq!(report.other_ratio, Decimal::ZERO);
        assert!(report.is_accepted());
    }
}
