use std::fmt;

/// Identifier template errors. Raised once, when the template is compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    EmptyTemplate,
    /// No `{000}`-style incrementing field.
    MissingNumeric { template: String },
    /// A `{` without its closing `}`.
    Unterminated { template: String, offset: usize },
    /// Date placeholder that is not a fixed-width mask.
    InvalidDateMask { mask: String },
    /// More than one date placeholder.
    MultipleDates { template: String },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTemplate => write!(f, "identifier template is empty"),
            Self::MissingNumeric { template } => {
                write!(f, "identifier template '{template}' has no numeric component")
            }
            Self::Unterminated { template, offset } => {
                write!(f, "identifier template '{template}': unterminated '{{' at offset {offset}")
            }
            Self::InvalidDateMask { mask } => {
                write!(f, "'{mask}' is not a fixed-width date mask (use YYYY, YY, MM, DD)")
            }
            Self::MultipleDates { template } => {
                write!(f, "identifier template '{template}' has more than one date component")
            }
        }
    }
}

impl std::error::Error for SchemaError {}

#[derive(Debug)]
pub enum AuditError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty name, bad parameter, etc.).
    ConfigValidation(String),
    Schema(SchemaError),
    Io(String),
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Schema(e) => write!(f, "{e}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for AuditError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Schema(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SchemaError> for AuditError {
    fn from(e: SchemaError) -> Self {
        Self::Schema(e)
    }
}
