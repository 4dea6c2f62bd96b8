// Run context
// Loaded from ~/.config/tally/context.toml, passed explicitly to the audit
// and reconciliation engines.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tally_core::RecordKind;

use crate::date_mask;
use crate::error::ConfigError;

#[derive(Debug, Deserialize)]
struct RawContext {
    #[serde(default = "default_date_format")]
    date_format: String,
    #[serde(default)]
    id_date_offset_years: i32,
    #[serde(default)]
    record_types: BTreeMap<String, RawRecordType>,
}

#[derive(Debug, Deserialize)]
struct RawRecordType {
    group: String,
}

fn default_date_format() -> String {
    "YYYY-MM-DD".to_string()
}

/// Settings shared by every audit and reconciliation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    /// Date mask used when reading date cells (e.g. `YYYY-MM-DD`).
    pub date_format: String,
    /// Year offset applied when rendering the date component of new
    /// identifiers (non-Gregorian fiscal calendars).
    pub id_date_offset_years: i32,
    record_types: BTreeMap<String, RecordKind>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            date_format: default_date_format(),
            id_date_offset_years: 0,
            record_types: BTreeMap::new(),
        }
    }
}

impl Context {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let raw: RawContext = toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;

        // Reject unusable masks at load rather than on the first date cell
        date_mask::to_chrono(&raw.date_format)?;

        let mut record_types = BTreeMap::new();
        for (name, entry) in raw.record_types {
            let kind = RecordKind::from_group(&entry.group)
                .map_err(|e| ConfigError::Validation(format!("record type '{name}': {e}")))?;
            record_types.insert(name, kind);
        }

        Ok(Self {
            date_format: raw.date_format,
            id_date_offset_years: raw.id_date_offset_years,
            record_types,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }

    /// Get the context file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tally")
            .join("context.toml")
    }

    /// Load the user context, falling back to defaults
    pub fn load_default() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match Self::load(&path) {
            Ok(ctx) => ctx,
            Err(e) => {
                log::warn!("{}: {e}; using default context", path.display());
                Self::default()
            }
        }
    }

    pub fn with_record_type(mut self, name: impl Into<String>, kind: RecordKind) -> Self {
        self.record_types.insert(name.into(), kind);
        self
    }

    /// Kind of a registered record type. Unregistered types are standard.
    pub fn record_kind(&self, record_type: &str) -> RecordKind {
        match self.record_types.get(record_type) {
            Some(kind) => *kind,
            None => {
                log::debug!("record type '{record_type}' not registered; treating as standard");
                RecordKind::Standard
            }
        }
    }

    pub fn is_registered(&self, record_type: &str) -> bool {
        self.record_types.contains_key(record_type)
    }

    /// chrono format string for `date_format`.
    pub fn chrono_date_format(&self) -> String {
        // Validated at load; a default-constructed context is always valid
        date_mask::to_chrono(&self.date_format).unwrap_or_else(|_| "%Y-%m-%d".to_string())
    }
}
