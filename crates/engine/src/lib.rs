//! `tally-engine`: bounded rule grammar evaluated row-wise over records.
//!
//! Rules are parsed into a typed AST and evaluated against a row-lookup
//! closure. Nothing outside the grammar can run.

pub mod error;
pub mod filter;
pub mod rule;

pub use error::RuleError;
pub use filter::{column_total, evaluate_rule_set, generate_column, subset, RuleSet};
pub use rule::{parse, Expr};
