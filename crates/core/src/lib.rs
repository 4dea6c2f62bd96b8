//! `tally-core`: shared data model for the audit and reconciliation crates.
//!
//! Plain data only: typed column values, records keyed by identifier, and the
//! persisted reference shape. No IO, no configuration.

pub mod record;
pub mod reference;
pub mod value;

pub use record::{Record, RecordKind, RecordReference, UnknownRecordGroup};
pub use reference::ReferenceEntry;
pub use value::Value;
