use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    pub primary: SourceConfig,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Where an account's records come from and which columns key them.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub record_type: String,
    pub file: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_date_column")]
    pub date_column: String,
    /// Column holding the id of an already-linked record.
    #[serde(default)]
    pub reference_column: Option<String>,
}

fn default_id_column() -> String {
    "RecordID".to_string()
}

fn default_date_column() -> String {
    "RecordDate".to_string()
}

/// An account whose records are matched against the primary account.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    #[serde(flatten)]
    pub source: SourceConfig,
    /// Rule restricting which of the account's records are candidates.
    #[serde(default)]
    pub subset: Option<String>,
    /// Association rules keyed by the primary account's column name.
    #[serde(default)]
    pub rules: BTreeMap<String, AssociationRule>,
}

// ---------------------------------------------------------------------------
// Association rules
// ---------------------------------------------------------------------------

/// How one primary column relates to a column of the associated account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AssociationRule {
    /// Column of the associated account.
    #[serde(alias = "Column")]
    pub column: String,
    /// Dropped from the comparison during an expanded search.
    #[serde(default, alias = "Expanded", alias = "Expand")]
    pub expanded: bool,
    /// Shown when an expanded match disagrees on this column.
    #[serde(default, alias = "Description")]
    pub description: Option<String>,
}

impl AssociationRule {
    pub fn strict(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            expanded: false,
            description: None,
        }
    }

    pub fn expanded(column: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            expanded: true,
            description: Some(description.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ReconError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ReconError::Io(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.accounts.is_empty() {
            return Err(ReconError::ConfigValidation(
                "at least 1 associated account is required".into(),
            ));
        }

        // Account names key the results; they must be unique
        let mut names = HashSet::new();
        names.insert(self.primary.name.as_str());
        for account in &self.accounts {
            let name = account.source.name.as_str();
            if !names.insert(name) {
                return Err(ReconError::ConfigValidation(format!(
                    "duplicate account name '{name}'"
                )));
            }

            if account.rules.is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "account '{name}': at least 1 association rule is required"
                )));
            }

            for (local, rule) in &account.rules {
                if rule.column.trim().is_empty() {
                    return Err(ReconError::ConfigValidation(format!(
                        "account '{name}': rule '{local}' has no column"
                    )));
                }
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
