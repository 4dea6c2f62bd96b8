use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tally_config::Context;

use crate::error::AuditError;
use crate::schema::IdentifierSchema;

/// One audited record type: where its rows live and how its identifiers are
/// built.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    pub name: String,
    pub record_type: String,
    /// Identifier template, e.g. `{RV}{YYMM}-{0000}`.
    pub id_format: String,
    /// Values for `{Name}` placeholders of the template.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    pub file: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_date_column")]
    pub date_column: String,
    pub period_date: NaiveDate,
    /// Records already queued for import.
    #[serde(default)]
    pub imports_file: Option<String>,
    /// Complete extract of the audit date, when `file` may be stale.
    #[serde(default)]
    pub superset_file: Option<String>,
}

fn default_id_column() -> String {
    "RecordID".to_string()
}

fn default_date_column() -> String {
    "RecordDate".to_string()
}

impl AuditConfig {
    pub fn from_toml(input: &str) -> Result<Self, AuditError> {
        let config: AuditConfig =
            toml::from_str(input).map_err(|e| AuditError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, AuditError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AuditError::Io(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }

    pub fn validate(&self) -> Result<(), AuditError> {
        if self.name.trim().is_empty() {
            return Err(AuditError::ConfigValidation("name must not be empty".into()));
        }
        if self.record_type.trim().is_empty() {
            return Err(AuditError::ConfigValidation(format!(
                "audit '{}': record_type must not be empty",
                self.name
            )));
        }
        for (name, value) in &self.params {
            if value.is_empty() {
                return Err(AuditError::ConfigValidation(format!(
                    "audit '{}': parameter '{name}' has no value",
                    self.name
                )));
            }
        }

        // Template errors are fatal at load
        IdentifierSchema::compile_with_params(&self.id_format, &self.params)?;
        Ok(())
    }

    /// Compiled identifier schema with the context's year offset applied.
    pub fn schema(&self, ctx: &Context) -> Result<IdentifierSchema, AuditError> {
        let schema = IdentifierSchema::compile_with_params(&self.id_format, &self.params)?;
        Ok(schema.with_year_offset(ctx.id_date_offset_years))
    }
}
