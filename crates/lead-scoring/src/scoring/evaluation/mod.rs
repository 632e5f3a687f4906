//! Pure rule evaluation: one condition at a time, then the whole active rule set.

mod aggregate;
mod condition;

pub use aggregate::{aggregate, Aggregation, RuleDiagnostic};
pub use condition::{evaluate, MatchResult, TypeMismatch};
