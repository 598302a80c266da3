//! Priority-ordered categorization rules. Rules arrive from the preference
//! store in a loose wire shape; one normalization pass at load time maps
//! them onto tagged condition variants and precompiles their patterns, so
//! the matcher itself stays exhaustive and total.

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use centime_core::{Category, NormalizedTransaction};

/// Wire shape of a stored rule. `merchant` may be a single pattern or a
/// list; `pattern` is the legacy generic field; `category` is free text
/// until validated against the closed enumeration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRule {
    #[serde(default)]
    pub priority: i32,
    /// `None` marks a global rule; global rules sort after bank-specific
    /// rules of equal priority.
    #[serde(default)]
    pub bank: Option<String>,
    #[serde(default)]
    pub merchant: Option<OneOrMany>,
    #[serde(default)]
    pub description_pattern: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub amount_min: Option<Decimal>,
    #[serde(default)]
    pub amount_max: Option<Decimal>,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

/// A pattern condition, compiled once at rule-load time.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    kind: PatternKind,
}

#[derive(Debug, Clone)]
enum PatternKind {
    /// `*`/`?` glob, translated to an anchored regex.
    Wildcard(Regex),
    /// The pattern contained regex metacharacters and compiled as-is.
    Regex(Regex),
    /// Case-insensitive substring.
    Substring(String),
}

impl CompiledPattern {
    fn compile(pattern: &str) -> Option<CompiledPattern> {
        let source = pattern.to_string();
        let kind = if pattern.contains('*') || pattern.contains('?') {
            let mut expr = String::from("(?i)^");
            for ch in pattern.chars() {
                match ch {
                    '*' => expr.push_str(".*"),
                    '?' => expr.push('.'),
                    other => expr.push_str(&regex::escape(&other.to_string())),
                }
            }
            expr.push('$');
            PatternKind::Wildcard(Regex::new(&expr).ok()?)
        } else if pattern.chars().any(|c| r"^$.[]|(){}+\".contains(c)) {
            PatternKind::Regex(Regex::new(pattern).ok()?)
        } else {
            PatternKind::Substring(pattern.to_lowercase())
        };
        Some(CompiledPattern { source, kind })
    }

    fn matches(&self, text: &str) -> bool {
        match &self.kind {
            PatternKind::Wildcard(re) | PatternKind::Regex(re) => re.is_match(text),
            PatternKind::Substring(needle) => text.to_lowercase().contains(needle),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// A rule condition after normalization. A merchant condition holds the
/// whole pattern list and matches if any entry does; `GenericPattern` is
/// the legacy `pattern` field and matches like a merchant pattern.
#[derive(Debug, Clone)]
pub enum RuleCondition {
    MerchantPattern(Vec<CompiledPattern>),
    DescriptionPattern(CompiledPattern),
    AmountRange {
        min: Option<Decimal>,
        max: Option<Decimal>,
    },
    GenericPattern(CompiledPattern),
}

#[derive(Debug, Clone)]
pub struct CategorizationRule {
    pub priority: i32,
    pub bank: Option<String>,
    pub conditions: Vec<RuleCondition>,
    pub category: Category,
}

impl CategorizationRule {
    fn matches(&self, tx: &NormalizedTransaction) -> bool {
        // A rule with no recognized condition never matches.
        if self.conditions.is_empty() {
            return false;
        }
        self.conditions.iter().all(|cond| match cond {
            RuleCondition::MerchantPattern(patterns) => patterns.iter().any(|p| {
                tx.vendor.as_deref().is_some_and(|v| p.matches(v)) || p.matches(&tx.description)
            }),
            RuleCondition::GenericPattern(p) => {
                tx.vendor.as_deref().is_some_and(|v| p.matches(v)) || p.matches(&tx.description)
            }
            RuleCondition::DescriptionPattern(p) => p.matches(&tx.description),
            RuleCondition::AmountRange { min, max } => {
                min.map_or(true, |m| tx.amount >= m) && max.map_or(true, |m| tx.amount <= m)
            }
        })
    }
}

/// An immutable, pre-sorted rule snapshot for one categorization pass.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CategorizationRule>,
}

impl RuleSet {
    /// Normalizes the preference store's loose shapes into tagged
    /// conditions, drops rules whose category is outside the closed
    /// enumeration, and sorts: descending priority, bank-specific before
    /// global at equal priority.
    pub fn from_raw(raw_rules: Vec<RawRule>) -> RuleSet {
        let mut rules = Vec::with_capacity(raw_rules.len());
        for raw in raw_rules {
            let Some(category) = Category::canonicalize(&raw.category) else {
                tracing::warn!(category = %raw.category, "dropping rule with unknown category");
                continue;
            };

            let mut conditions = Vec::new();
            if let Some(merchant) = raw.merchant {
                let patterns: Vec<CompiledPattern> = merchant
                    .into_vec()
                    .iter()
                    .filter_map(|p| CompiledPattern::compile(p))
                    .collect();
                if !patterns.is_empty() {
                    conditions.push(RuleCondition::MerchantPattern(patterns));
                }
            }
            if let Some(p) = raw.description_pattern.as_deref().and_then(CompiledPattern::compile) {
                conditions.push(RuleCondition::DescriptionPattern(p));
            }
            if let Some(p) = raw.pattern.as_deref().and_then(CompiledPattern::compile) {
                conditions.push(RuleCondition::GenericPattern(p));
            }
            if raw.amount_min.is_some() || raw.amount_max.is_some() {
                conditions.push(RuleCondition::AmountRange {
                    min: raw.amount_min,
                    max: raw.amount_max,
                });
            }

            rules.push(CategorizationRule {
                priority: raw.priority,
                bank: raw.bank,
                conditions,
                category,
            });
        }

        // Bank-specific (Some) sorts before global (None) at equal priority.
        rules.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.bank.is_none().cmp(&b.bank.is_none()))
        });
        RuleSet { rules }
    }

    pub fn from_json(json: &str) -> Result<RuleSet, serde_json::Error> {
        let raw: Vec<RawRule> = serde_json::from_str(json)?;
        Ok(RuleSet::from_raw(raw))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[CategorizationRule] {
        &self.rules
    }
}

/// Assigns at most one category. A source-supplied category that
/// canonicalizes into the closed enumeration wins without consulting rules;
/// otherwise the first matching rule in snapshot order wins. `None` means
/// unmatched, and the fallback policy belongs to the caller.
pub fn categorize(tx: &NormalizedTransaction, rules: &RuleSet) -> Option<Category> {
    if let Some(cat) = tx.source_category.as_deref().and_then(Category::canonicalize) {
        return Some(cat);
    }
    rules.rules.iter().find(|r| r.matches(tx)).map(|r| r.category)
}

/// Batch form: one verdict per transaction, in input order, paired with the
/// transaction's index. `None` entries are unmatched.
pub fn categorize_all(
    transactions: &[NormalizedTransaction],
    rules: &RuleSet,
) -> Vec<(usize, Option<Category>)> {
    transactions
        .iter()
        .enumerate()
        .map(|(idx, tx)| (idx, categorize(tx, rules)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn tx(description: &str, amount: Decimal) -> NormalizedTransaction {
        NormalizedTransaction {
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            description: description.to_string(),
            vendor: None,
            amount,
            currency: "USD".to_string(),
            balance: None,
            source_category: None,
            source_transaction_id: None,
        }
    }

    fn raw(pattern: &str, category: &str, priority: i32) -> RawRule {
        RawRule {
            priority,
            bank: None,
            merchant: Some(OneOrMany::One(pattern.to_string())),
            description_pattern: None,
            pattern: None,
            amount_min: None,
            amount_max: None,
            category: category.to_string(),
        }
    }

    #[test]
    fn substring_match_is_case_insensitive() {
        let rules = RuleSet::from_raw(vec![raw("whole foods", "Food & Groceries", 1)]);
        assert_eq!(
            categorize(&tx("WHOLE FOODS MARKET 123", dec!(-43.35)), &rules),
            Some(Category::FoodGroceries)
        );
        assert_eq!(categorize(&tx("STARBUCKS", dec!(-5.00)), &rules), None);
    }

    #[test]
    fn wildcard_pattern_is_anchored() {
        let rules = RuleSet::from_raw(vec![raw("UBER*", "Transport", 1)]);
        assert_eq!(
            categorize(&tx("UBER   *TRIP HELP.UBER.COM", dec!(-14.20)), &rules),
            Some(Category::Transport)
        );
        // Anchored at the start: a mid-string occurrence does not match.
        assert_eq!(categorize(&tx("POS UBER TRIP", dec!(-20.00)), &rules), None);

        let rules = RuleSet::from_raw(vec![raw("PAYPAL *?ETSY", "Shopping", 1)]);
        assert_eq!(
            categorize(&tx("PAYPAL * ETSY", dec!(-31.00)), &rules),
            Some(Category::Shopping)
        );
    }

    #[test]
    fn regex_pattern() {
        let rules = RuleSet::from_raw(vec![raw(r"^(AMZN|AMAZON)", "Shopping", 1)]);
        assert_eq!(
            categorize(&tx("AMZN MKTP US", dec!(-19.99)), &rules),
            Some(Category::Shopping)
        );
        assert_eq!(categorize(&tx("WHOLE AMAZON", dec!(-1.00)), &rules), None);
    }

    #[test]
    fn merchant_pattern_checks_vendor_then_description() {
        let rules = RuleSet::from_raw(vec![raw("starbucks", "Dining", 1)]);
        let mut t = tx("CARD PAYMENT 991", dec!(-4.80));
        t.vendor = Some("Starbucks #221".to_string());
        assert_eq!(categorize(&t, &rules), Some(Category::Dining));
    }

    #[test]
    fn description_pattern_ignores_vendor() {
        let mut r = raw("x", "Dining", 1);
        r.merchant = None;
        r.description_pattern = Some("card payment".to_string());
        let rules = RuleSet::from_raw(vec![r]);

        let mut t = tx("POS PURCHASE", dec!(-4.80));
        t.vendor = Some("CARD PAYMENT".to_string());
        assert_eq!(categorize(&t, &rules), None);
        assert_eq!(
            categorize(&tx("CARD PAYMENT 991", dec!(-4.80)), &rules),
            Some(Category::Dining)
        );
    }

    #[test]
    fn amount_range_bounds_inclusive() {
        let mut r = raw("acme", "Shopping", 1);
        r.amount_min = Some(dec!(-100.00));
        r.amount_max = Some(dec!(-10.00));
        let rules = RuleSet::from_raw(vec![r]);

        assert_eq!(categorize(&tx("ACME", dec!(-10.00)), &rules), Some(Category::Shopping));
        assert_eq!(categorize(&tx("ACME", dec!(-100.00)), &rules), Some(Category::Shopping));
        assert_eq!(categorize(&tx("ACME", dec!(-9.99)), &rules), None);
        assert_eq!(categorize(&tx("ACME", dec!(-100.01)), &rules), None);
    }

    #[test]
    fn rule_without_conditions_never_matches() {
        let mut r = raw("", "Other", 100);
        r.merchant = None;
        let rules = RuleSet::from_raw(vec![r]);
        assert_eq!(categorize(&tx("ANYTHING", dec!(-1.00)), &rules), None);
    }

    #[test]
    fn unknown_category_rule_is_dropped() {
        let rules = RuleSet::from_raw(vec![raw("acme", "Cryptocurrency", 1)]);
        assert!(rules.is_empty());
    }

    #[test]
    fn higher_priority_wins() {
        let rules = RuleSet::from_raw(vec![
            raw("amazon", "Shopping", 1),
            raw("amazon", "Entertainment", 10),
        ]);
        assert_eq!(
            categorize(&tx("AMAZON MARKETPLACE", dec!(-9.99)), &rules),
            Some(Category::Entertainment)
        );
    }

    #[test]
    fn bank_specific_beats_global_at_equal_priority() {
        let mut bank_rule = raw("amazon", "Entertainment", 5);
        bank_rule.bank = Some("chase".to_string());
        let rules = RuleSet::from_raw(vec![raw("amazon", "Shopping", 5), bank_rule]);
        assert_eq!(
            categorize(&tx("AMAZON MARKETPLACE", dec!(-9.99)), &rules),
            Some(Category::Entertainment)
        );
    }

    #[test]
    fn source_category_short_circuits_rules() {
        let rules = RuleSet::from_raw(vec![raw("salary", "Other", 100)]);
        let mut t = tx("SALARY MARCH", dec!(2500.00));
        t.source_category = Some("salary".to_string());
        assert_eq!(categorize(&t, &rules), Some(Category::Income));
    }

    #[test]
    fn unrecognized_source_category_falls_through_to_rules() {
        let rules = RuleSet::from_raw(vec![raw("salary", "Income", 1)]);
        let mut t = tx("SALARY MARCH", dec!(2500.00));
        t.source_category = Some("mystery-bucket".to_string());
        assert_eq!(categorize(&t, &rules), Some(Category::Income));
    }

    #[test]
    fn merchant_list_matches_any() {
        let mut r = raw("", "Dining", 1);
        r.merchant = Some(OneOrMany::Many(vec![
            "starbucks".to_string(),
            "pret a manger".to_string(),
        ]));
        let rules = RuleSet::from_raw(vec![r]);
        assert_eq!(
            categorize(&tx("PRET A MANGER LONDON", dec!(-6.50)), &rules),
            Some(Category::Dining)
        );
    }

    #[test]
    fn categorization_is_deterministic() {
        let rules = RuleSet::from_raw(vec![
            raw("amazon", "Shopping", 3),
            raw("ama", "Entertainment", 3),
        ]);
        let t = tx("AMAZON", dec!(-1.00));
        let first = categorize(&t, &rules);
        for _ in 0..10 {
            assert_eq!(categorize(&t, &rules), first);
        }
    }

    #[test]
    fn categorize_all_preserves_input_order() {
        let rules = RuleSet::from_raw(vec![raw("payroll", "Income", 1)]);
        let txs = vec![
            tx("ACME PAYROLL", dec!(2000.00)),
            tx("MYSTERY", dec!(-5.00)),
            tx("PAYROLL BONUS", dec!(500.00)),
        ];
        let results = categorize_all(&txs, &rules);
        assert_eq!(
            results,
            vec![
                (0, Some(Category::Income)),
                (1, None),
                (2, Some(Category::Income)),
            ]
        );
    }

    #[test]
    fn loose_json_shape_parses() {
        let json = r#"[
            {"priority": 10, "merchant": ["UBER*", "LYFT"], "category": "Transport"},
            {"pattern": "INTEREST", "category": "Fees & Charges"},
            {"bank": "chase", "description_pattern": "payroll", "amount_min": "1000", "category": "Income"}
        ]"#;
        let rules = RuleSet::from_json(json).unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(
            categorize(&tx("LYFT RIDE 12", dec!(-18.00)), &rules),
            Some(Category::Transport)
        );
    }
}
