use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Persisted link between two records, in the column layout of the
/// reference table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReferenceEntry {
    #[serde(rename = "RecordID")]
    pub record_id: String,
    #[serde(rename = "ReferenceID")]
    pub reference_id: String,
    pub reference_date: NaiveDateTime,
    pub record_type: String,
    pub reference_type: String,
    pub reference_notes: Option<String>,
    pub is_approved: bool,
    pub is_child: bool,
    pub is_hard_link: bool,
    pub is_deleted: bool,
}

impl ReferenceEntry {
    /// A fresh, unapproved soft link.
    pub fn link(
        record_id: impl Into<String>,
        record_type: impl Into<String>,
        reference_id: impl Into<String>,
        reference_type: impl Into<String>,
        reference_date: NaiveDateTime,
        notes: Option<String>,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            reference_id: reference_id.into(),
            reference_date,
            record_type: record_type.into(),
            reference_type: reference_type.into(),
            reference_notes: notes,
            is_approved: false,
            is_child: false,
            is_hard_link: false,
            is_deleted: false,
        }
    }
}
