use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;
use tally_core::{Record, ReferenceEntry};

use crate::config::AssociationRule;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// The account whose records are being reconciled.
#[derive(Debug, Clone)]
pub struct Primary {
    pub name: String,
    pub record_type: String,
    pub records: Vec<Record>,
}

/// An associated account searched for matches.
#[derive(Debug, Clone)]
pub struct Account {
    pub name: String,
    pub record_type: String,
    /// Keyed by the primary account's column name.
    pub rules: BTreeMap<String, AssociationRule>,
    pub subset: Option<String>,
    pub records: Vec<Record>,
}

impl Account {
    pub fn new(name: impl Into<String>, record_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            record_type: record_type.into(),
            rules: BTreeMap::new(),
            subset: None,
            records: Vec::new(),
        }
    }

    pub fn with_rule(mut self, local_column: impl Into<String>, rule: AssociationRule) -> Self {
        self.rules.insert(local_column.into(), rule);
        self
    }

    pub fn with_subset(mut self, rule: impl Into<String>) -> Self {
        self.subset = Some(rule.into());
        self
    }

    pub fn with_records(mut self, records: Vec<Record>) -> Self {
        self.records = records;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ReconOptions {
    /// Retry unmatched records without the expanded rule columns.
    pub expand: bool,
    /// Timestamp stamped on every result.
    pub matched_at: NaiveDateTime,
}

impl ReconOptions {
    pub fn new(matched_at: NaiveDateTime) -> Self {
        Self {
            expand: false,
            matched_at,
        }
    }

    pub fn expanded(mut self, expand: bool) -> Self {
        self.expand = expand;
        self
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPass {
    Strict,
    Expanded,
}

impl std::fmt::Display for MatchPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Expanded => write!(f, "expanded"),
        }
    }
}

/// A primary record linked to one record of an associated account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub record_id: String,
    pub record_type: String,
    pub reference_id: String,
    pub reference_account: String,
    pub reference_type: String,
    pub matched_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub pass: MatchPass,
    /// More than one candidate qualified; the first in pool order was taken.
    pub ambiguous: bool,
}

impl MatchResult {
    /// The link from the primary record and its reciprocal.
    pub fn reference_entries(&self) -> [ReferenceEntry; 2] {
        [
            ReferenceEntry::link(
                &self.record_id,
                &self.record_type,
                &self.reference_id,
                &self.reference_type,
                self.matched_at,
                self.warning.clone(),
            ),
            ReferenceEntry::link(
                &self.reference_id,
                &self.reference_type,
                &self.record_id,
                &self.record_type,
                self.matched_at,
                self.warning.clone(),
            ),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAccount {
    pub account: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub total: usize,
    pub strict: usize,
    pub expanded: usize,
    pub ambiguous: usize,
    pub unmatched: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconReport {
    pub account: String,
    pub summary: ReconSummary,
    pub results: Vec<MatchResult>,
    /// Primary records left without a match.
    pub unmatched: Vec<String>,
    pub skipped_accounts: Vec<SkippedAccount>,
}

impl ReconReport {
    pub fn reference_entries(&self) -> Vec<ReferenceEntry> {
        self.results.iter().flat_map(|r| r.reference_entries()).collect()
    }
}
