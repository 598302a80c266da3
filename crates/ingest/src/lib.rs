pub mod amount;
pub mod row;
pub mod rules;
pub mod schema;

pub use amount::{parse_amount, AmountError};
pub use row::{
    detect_sign_convention, normalize_row, normalize_rows, NoRowsParsed, RowBatch, RowError,
    RowFailure,
};
pub use rules::{categorize, categorize_all, CategorizationRule, RawRule, RuleCondition, RuleSet};
pub use schema::{resolve, ParsingSchema, ResolvedSchema, SchemaError};
