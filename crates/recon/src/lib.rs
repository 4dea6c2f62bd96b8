//! `tally-recon`: multi-account record matching.
//!
//! Pure engine crate: receives pre-loaded records, returns match results.
//! Records are never modified during a run; `attach_references` applies the
//! results afterwards.

pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod matcher;
pub mod model;
pub mod pool;

pub use config::{AccountConfig, AssociationRule, ReconConfig, SourceConfig};
pub use engine::{attach_references, load_csv_records, MatchEngine};
pub use error::ReconError;
pub use model::{Account, MatchPass, MatchResult, Primary, ReconOptions, ReconReport, ReconSummary, SkippedAccount};
