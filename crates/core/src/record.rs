use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Behavioral family of a record type, resolved once from the record-group
/// string of the record-type registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Account, bank statement and cash expense entries.
    #[default]
    Standard,
    Deposit,
    Audit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRecordGroup(pub String);

impl fmt::Display for UnknownRecordGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown record group '{}'", self.0)
    }
}

impl std::error::Error for UnknownRecordGroup {}

impl RecordKind {
    pub fn from_group(group: &str) -> Result<Self, UnknownRecordGroup> {
        match group {
            "account" | "bank_statement" | "cash_expense" => Ok(Self::Standard),
            "bank_deposit" => Ok(Self::Deposit),
            "audit" => Ok(Self::Audit),
            other => Err(UnknownRecordGroup(other.to_string())),
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Deposit => write!(f, "deposit"),
            Self::Audit => write!(f, "audit"),
        }
    }
}

/// Reference metadata attached to a record once it has been linked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordReference {
    pub reference_id: String,
    pub reference_type: String,
    pub reference_date: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A row keyed by its identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub date: NaiveDate,
    pub record_type: String,
    #[serde(default)]
    pub kind: RecordKind,
    #[serde(default)]
    pub columns: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<RecordReference>,
}

impl Record {
    pub fn new(id: impl Into<String>, date: NaiveDate, record_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            date,
            record_type: record_type.into(),
            kind: RecordKind::Standard,
            columns: BTreeMap::new(),
            reference: None,
        }
    }

    /// Placeholder for a record inferred to be missing. Carries only the
    /// identifier and date until the caller fills it from storage.
    pub fn stub(id: impl Into<String>, date: NaiveDate, record_type: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            kind,
            ..Self::new(id, date, record_type)
        }
    }

    pub fn with_kind(mut self, kind: RecordKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_column(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.insert(name.into(), value.into());
        self
    }

    /// Column lookup. `RecordID` and `RecordDate` resolve to the key fields
    /// when no column of that name exists.
    pub fn get(&self, column: &str) -> Option<Value> {
        if let Some(v) = self.columns.get(column) {
            return Some(v.clone());
        }
        match column {
            "RecordID" => Some(Value::Text(self.id.clone())),
            "RecordDate" => Some(Value::Date(self.date)),
            _ => None,
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(column) || matches!(column, "RecordID" | "RecordDate")
    }

    pub fn is_referenced(&self) -> bool {
        self.reference.is_some()
    }
}
