use std::fmt;

use tally_engine::RuleError;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (no accounts, duplicate names, etc.).
    ConfigValidation(String),
    /// Missing required column in input data.
    MissingColumn { source: String, column: String },
    /// Date parse error.
    DateParse { source: String, record_id: String, value: String },
    /// Subset rule of an account failed to parse or evaluate.
    Rule { account: String, error: RuleError },
    /// IO error (file read, etc.).
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { source, column } => {
                write!(f, "'{source}': missing column '{column}'")
            }
            Self::DateParse { source, record_id, value } => {
                write!(f, "'{source}', record '{record_id}': cannot parse date '{value}'")
            }
            Self::Rule { account, error } => write!(f, "account '{account}': {error}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
