use thiserror::Error;

/// Errors produced while parsing a cron expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    /// After dropping an optional leading seconds field, the expression did
    /// not have exactly five fields.
    #[error("expected 5 fields (or 6 with seconds), found {found}")]
    FieldCount { found: usize },

    /// One field failed the grammar or range check.
    #[error("invalid {field} field '{value}': {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, CronError>;
