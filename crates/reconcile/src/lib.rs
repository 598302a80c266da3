pub mod mutation;
pub mod summarize;
pub mod validator;

pub use mutation::{
    apply_mutations, AuditEntry, MutationError, MutationOperation, MutationOutcome, SourceKind,
};
pub use summarize::{summarize, StatementSummary};
pub use validator::{validate, GateFailure, ReconciliationReport};
