//! Human-readable rendering of cron expressions.

use serde::{Deserialize, Serialize};

use crate::expression::{normalize, CronExpression};
use crate::field::{CronField, FieldKind, FieldShape, ListTerm};

pub const INVALID_DESCRIPTION: &str = "invalid expression";

const PRESETS: [(&str, &str); 6] = [
    ("* * * * *", "Runs every minute"),
    ("0 * * * *", "Runs at the start of every hour"),
    ("0 0 * * *", "Runs once a day at midnight"),
    ("0 0 * * 0", "Runs once a week on Sunday at midnight"),
    ("0 0 1 * *", "Runs on the first day of every month at midnight"),
    ("0 0 1 1 *", "Runs once a year on January 1st at midnight"),
];

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronDescription {
    /// The normalized expression, or the raw input when it did not parse.
    pub expression: String,
    pub description: String,
    pub is_valid: bool,
}

/// Describe `expression` in English. Never fails; malformed input yields
/// `is_valid = false` and [`INVALID_DESCRIPTION`].
pub fn describe(expression: &str) -> CronDescription {
    let Ok(parsed) = CronExpression::parse(expression) else {
        let fields = normalize(expression);
        return CronDescription {
            expression: if fields.len() == 5 {
                fields.join(" ")
            } else {
                expression.to_string()
            },
            description: INVALID_DESCRIPTION.to_string(),
            is_valid: false,
        };
    };

    let normalized = parsed.as_str().to_string();
    if let Some((_, preset)) = PRESETS.iter().find(|(expr, _)| *expr == normalized) {
        return CronDescription {
            expression: normalized,
            description: (*preset).to_string(),
            is_valid: true,
        };
    }

    let mut parts = Vec::new();
    for kind in [
        FieldKind::Minute,
        FieldKind::Hour,
        FieldKind::DayOfMonth,
        FieldKind::Month,
        FieldKind::DayOfWeek,
    ] {
        if let Some(phrase) = field_phrase(parsed.field(kind)) {
            parts.push(phrase);
        }
    }

    CronDescription {
        expression: normalized,
        description: format!("Runs {}", parts.join(", ")),
        is_valid: true,
    }
}

fn minute_phrase(field: &CronField) -> Option<String> {
    let phrase = match field.shape() {
        FieldShape::Any => "every minute".to_string(),
        FieldShape::Step(n) => format!("every {n} minutes"),
        FieldShape::Value(v) => format!("at minute {v}"),
        FieldShape::Range(a, b) => format!("every minute from {a} through {b}"),
        FieldShape::List(terms) => format!("at minutes {}", join_terms(terms, |v| v.to_string())),
        FieldShape::Last => return None,
    };
    Some(phrase)
}

/// Phrase for one field. `None` for a plain `*` outside the minute field,
/// and for shapes the field cannot hold.
fn field_phrase(field: &CronField) -> Option<String> {
    let shape = field.shape();
    let phrase = match (field.kind(), shape) {
        (FieldKind::Minute, _) => return minute_phrase(field),
        (_, FieldShape::Any) => return None,

        (FieldKind::Hour, FieldShape::Step(n)) => format!("every {n} hours"),
        (FieldKind::Hour, FieldShape::Value(v)) => format!("at {v:02}h"),
        (FieldKind::Hour, FieldShape::Range(a, b)) => format!("between {a:02}h and {b:02}h"),
        (FieldKind::Hour, FieldShape::List(terms)) => {
            format!("at hours {}", join_terms(terms, |v| format!("{v:02}h")))
        }
        (FieldKind::Hour, FieldShape::Last) => return None,

        (FieldKind::DayOfMonth, FieldShape::Last) => "on the last day of the month".to_string(),
        (FieldKind::DayOfMonth, FieldShape::Step(n)) => format!("every {n} days of the month"),
        (FieldKind::DayOfMonth, FieldShape::Value(v)) => format!("on day {v} of the month"),
        (FieldKind::DayOfMonth, FieldShape::Range(a, b)) => {
            format!("on days {a} through {b} of the month")
        }
        (FieldKind::DayOfMonth, FieldShape::List(terms)) => {
            format!("on days {} of the month", join_terms(terms, |v| v.to_string()))
        }

        (FieldKind::Month, FieldShape::Step(n)) => format!("every {n} months"),
        (FieldKind::Month, FieldShape::Value(v)) => format!("in {}", month_name(*v)),
        (FieldKind::Month, FieldShape::Range(a, b)) => {
            format!("from {} through {}", month_name(*a), month_name(*b))
        }
        (FieldKind::Month, FieldShape::List(terms)) => {
            format!("in {}", join_terms(terms, month_name))
        }
        (FieldKind::Month, FieldShape::Last) => return None,

        (FieldKind::DayOfWeek, FieldShape::Last) => "on the last day of the week".to_string(),
        (FieldKind::DayOfWeek, FieldShape::Step(n)) => format!("every {n} days of the week"),
        (FieldKind::DayOfWeek, FieldShape::Value(v)) => format!("on {}", weekday_name(*v)),
        (FieldKind::DayOfWeek, FieldShape::Range(a, b)) => {
            format!("{} through {}", weekday_name(*a), weekday_name(*b))
        }
        (FieldKind::DayOfWeek, FieldShape::List(terms)) => {
            format!("on {}", join_terms(terms, weekday_name))
        }
    };
    Some(phrase)
}

fn join_terms<F>(terms: &[ListTerm], name: F) -> String
where
    F: Fn(u32) -> String,
{
    terms
        .iter()
        .map(|term| match term {
            ListTerm::Value(v) => name(*v),
            ListTerm::Range(a, b) => format!("{}-{}", name(*a), name(*b)),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn month_name(month: u32) -> String {
    MONTHS
        .get(month.wrapping_sub(1) as usize)
        .map_or_else(|| month.to_string(), |name| (*name).to_string())
}

fn weekday_name(day: u32) -> String {
    WEEKDAYS
        .get(day as usize)
        .map_or_else(|| day.to_string(), |name| (*name).to_string())
}
