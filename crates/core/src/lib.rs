pub mod category;
pub mod month;
pub mod summary;
pub mod transaction;

pub use category::Category;
pub use month::{DateRange, MonthKey};
pub use summary::{CategoryTotal, StatementPeriod, StatementScope};
pub use transaction::{NormalizedTransaction, SignConvention};
