use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum RuleError {
    /// Rule text uses syntax outside the rule grammar.
    Parse(String),
    /// Rule references a column the row does not carry.
    UnknownColumn(String),
    /// Operands of the wrong type, division by zero, etc.
    Eval(String),
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "rule parse error: {msg}"),
            Self::UnknownColumn(col) => write!(f, "unknown column '{col}' in rule"),
            Self::Eval(msg) => write!(f, "rule evaluation error: {msg}"),
        }
    }
}

impl std::error::Error for RuleError {}
