pub mod db;
pub mod rules_store;
pub mod schemas;
pub mod summaries;

pub use db::{create_db, DbPool, StorageError};
pub use rules_store::{delete_rule, load_rule_set, save_rule};
pub use schemas::{load_schema, save_schema};
pub use summaries::{
    apply_mutation_batch, load_summaries, load_totals, save_statement, StatementSave,
};
