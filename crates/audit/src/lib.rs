//! `tally-audit`: sequential-identifier audit.
//!
//! Compiles identifier templates into schemas and infers which identifiers
//! of a period are missing. Receives pre-loaded identifiers; no CSV or
//! database access.

pub mod config;
pub mod error;
pub mod gap;
pub mod schema;

pub use config::AuditConfig;
pub use error::{AuditError, SchemaError};
pub use gap::{Gap, GapDetector, GapInput, GapReport, GapSource};
pub use schema::{ComponentKind, IdentifierSchema};
