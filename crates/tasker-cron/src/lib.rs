//! `tasker-cron`: parsing five-field cron expressions, next-fire
//! computation and English descriptions.
//!
//! Field order is `minute hour day-of-month month day-of-week`. A six-field
//! expression is accepted and its leading seconds field ignored.

pub mod describe;
pub mod error;
pub mod expression;
pub mod field;

use chrono::{DateTime, Utc};

pub use describe::{describe, CronDescription};
pub use error::{CronError, Result};
pub use expression::CronExpression;
pub use field::{CronField, FieldKind, FieldShape, ListTerm};

/// Whether `expression` is a well-formed cron expression.
pub fn validate(expression: &str) -> bool {
    CronExpression::parse(expression).is_ok()
}

/// Earliest minute boundary strictly after `after` that the expression
/// matches, in UTC. `None` for invalid or never-firing expressions.
pub fn next_invocation(expression: &str, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
    CronExpression::parse(expression).ok()?.next_after(after)
}
