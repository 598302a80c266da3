use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed category enumeration. Every component validates against this
/// one list; adding a category means adding a variant here and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Income,
    Housing,
    #[serde(rename = "Food & Groceries")]
    FoodGroceries,
    Dining,
    Transport,
    Utilities,
    Shopping,
    Entertainment,
    Health,
    Travel,
    #[serde(rename = "Fees & Charges")]
    Fees,
    #[serde(rename = "Savings & Investments")]
    Savings,
    Transfers,
    Other,
}

impl Category {
    pub const ALL: &'static [Category] = &[
        Category::Income,
        Category::Housing,
        Category::FoodGroceries,
        Category::Dining,
        Category::Transport,
        Category::Utilities,
        Category::Shopping,
        Category::Entertainment,
        Category::Health,
        Category::Travel,
        Category::Fees,
        Category::Savings,
        Category::Transfers,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Income => "Income",
            Category::Housing => "Housing",
            Category::FoodGroceries => "Food & Groceries",
            Category::Dining => "Dining",
            Category::Transport => "Transport",
            Category::Utilities => "Utilities",
            Category::Shopping => "Shopping",
            Category::Entertainment => "Entertainment",
            Category::Health => "Health",
            Category::Travel => "Travel",
            Category::Fees => "Fees & Charges",
            Category::Savings => "Savings & Investments",
            Category::Transfers => "Transfers",
            Category::Other => "Other",
        }
    }

    /// Maps a free-text category name (canonical name or a known synonym,
    /// case-insensitive) onto the closed enumeration. Returns `None` for
    /// anything unrecognized; callers decide the fallback policy.
    pub fn canonicalize(name: &str) -> Option<Category> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return None;
        }
        let lower = trimmed.to_lowercase();

        for cat in Self::ALL {
            if cat.as_str().to_lowercase() == lower {
                return Some(*cat);
            }
        }

        match lower.as_str() {
            "salary" | "wages" | "payroll" | "deposit" => Some(Category::Income),
            "rent" | "mortgage" | "home" => Some(Category::Housing),
            "groceries" | "food" | "supermarket" => Some(Category::FoodGroceries),
            "restaurants" | "restaurant" | "eating out" | "takeaway" => Some(Category::Dining),
            "transportation" | "fuel" | "gas" | "car" | "commute" => Some(Category::Transport),
            "bills" | "electricity" | "water" | "internet" | "phone" => Some(Category::Utilities),
            "retail" | "clothing" | "online shopping" => Some(Category::Shopping),
            "leisure" | "subscriptions" | "streaming" => Some(Category::Entertainment),
            "medical" | "healthcare" | "pharmacy" | "fitness" => Some(Category::Health),
            "vacation" | "holiday" | "flights" | "hotels" => Some(Category::Travel),
            "fees" | "bank fees" | "charges" | "interest" => Some(Category::Fees),
            "savings" | "investments" | "investment" => Some(Category::Savings),
            "transfer" | "internal transfer" => Some(Category::Transfers),
            "misc" | "miscellaneous" | "uncategorized" | "unknown" => Some(Category::Other),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::canonicalize(s).ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown category: '{0}'")]
pub struct UnknownCategory(pub String);
