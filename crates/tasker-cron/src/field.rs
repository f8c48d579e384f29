//! Parsing and matching of a single cron field.
//!
//! Each field compiles to a bitmask of permitted values plus the shape it was
//! written in. The shape is kept for [`crate::describe`]; matching only looks
//! at the mask (and the `L` flag for day-of-month).

use crate::error::{CronError, Result};

/// Which of the five positions a field occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

impl FieldKind {
    pub const ALL: [FieldKind; 5] = [
        FieldKind::Minute,
        FieldKind::Hour,
        FieldKind::DayOfMonth,
        FieldKind::Month,
        FieldKind::DayOfWeek,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Minute => "minute",
            FieldKind::Hour => "hour",
            FieldKind::DayOfMonth => "day-of-month",
            FieldKind::Month => "month",
            FieldKind::DayOfWeek => "day-of-week",
        }
    }

    pub fn min(self) -> u32 {
        match self {
            FieldKind::DayOfMonth | FieldKind::Month => 1,
            _ => 0,
        }
    }

    pub fn max(self) -> u32 {
        match self {
            FieldKind::Minute => 59,
            FieldKind::Hour => 23,
            FieldKind::DayOfMonth => 31,
            FieldKind::Month => 12,
            FieldKind::DayOfWeek => 6,
        }
    }

    fn allows_last(self) -> bool {
        matches!(self, FieldKind::DayOfMonth | FieldKind::DayOfWeek)
    }
}

/// One element of a comma list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListTerm {
    Value(u32),
    Range(u32, u32),
}

/// The syntactic form a field was written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldShape {
    /// `*`
    Any,
    /// `*/n`
    Step(u32),
    /// `n`
    Value(u32),
    /// `a-b`
    Range(u32, u32),
    /// `a,b-c,d`
    List(Vec<ListTerm>),
    /// `L`: last day of the month, or Saturday in the day-of-week field.
    Last,
}

/// A compiled cron field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronField {
    kind: FieldKind,
    shape: FieldShape,
    mask: u64,
}

impl CronField {
    /// Parse `raw` as a field of the given kind.
    pub fn parse(kind: FieldKind, raw: &str) -> Result<Self> {
        let invalid = |reason: &str| CronError::InvalidField {
            field: kind.name(),
            value: raw.to_string(),
            reason: reason.to_string(),
        };

        let shape = if raw == "*" {
            FieldShape::Any
        } else if raw == "L" {
            if !kind.allows_last() {
                return Err(invalid("'L' is only allowed for day-of-month and day-of-week"));
            }
            FieldShape::Last
        } else if let Some(step) = raw.strip_prefix("*/") {
            let step = parse_number(step).ok_or_else(|| invalid("step must be a number"))?;
            if step == 0 || step > kind.max() {
                return Err(invalid(&format!("step must be 1-{}", kind.max())));
            }
            FieldShape::Step(step)
        } else if raw.contains(',') {
            let terms = raw
                .split(',')
                .map(|term| parse_term(kind, term).map_err(|reason| invalid(&reason)))
                .collect::<Result<Vec<_>>>()?;
            FieldShape::List(terms)
        } else {
            match parse_term(kind, raw).map_err(|reason| invalid(&reason))? {
                ListTerm::Value(v) => FieldShape::Value(v),
                ListTerm::Range(a, b) => FieldShape::Range(a, b),
            }
        };

        let mask = compile(kind, &shape);
        Ok(Self { kind, shape, mask })
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn shape(&self) -> &FieldShape {
        &self.shape
    }

    /// Whether the field narrows the set of values. Following Vixie cron, any
    /// field written starting with `*` (including `*/n`) counts as
    /// unrestricted for the day-of-month / day-of-week interplay.
    pub fn is_restricted(&self) -> bool {
        !matches!(self.shape, FieldShape::Any | FieldShape::Step(_))
    }

    /// Match a plain value against the mask.
    pub fn matches(&self, value: u32) -> bool {
        value < 64 && self.mask & (1u64 << value) != 0
    }

    /// Day-of-month matching, which needs to know where the month ends.
    pub fn matches_day_of_month(&self, day: u32, last_day: u32) -> bool {
        match self.shape {
            FieldShape::Last => day == last_day,
            _ => self.matches(day),
        }
    }

    /// Permitted values in ascending order.
    pub fn values(&self) -> impl Iterator<Item = u32> + '_ {
        (self.kind.min()..=self.kind.max()).filter(move |v| self.matches(*v))
    }
}

fn parse_term(kind: FieldKind, term: &str) -> std::result::Result<ListTerm, String> {
    if let Some((start, end)) = term.split_once('-') {
        let start = parse_in_range(kind, start)?;
        let end = parse_in_range(kind, end)?;
        if start > end {
            return Err(format!("range start {start} is after end {end}"));
        }
        Ok(ListTerm::Range(start, end))
    } else {
        parse_in_range(kind, term).map(ListTerm::Value)
    }
}

fn parse_in_range(kind: FieldKind, raw: &str) -> std::result::Result<u32, String> {
    let value = parse_number(raw).ok_or_else(|| format!("'{raw}' is not a number"))?;
    if value < kind.min() || value > kind.max() {
        return Err(format!(
            "value {value} out of range {}-{}",
            kind.min(),
            kind.max()
        ));
    }
    Ok(value)
}

/// Strict decimal parse: digits only, so `+5`, ` 5` and `` are rejected.
fn parse_number(raw: &str) -> Option<u32> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

fn compile(kind: FieldKind, shape: &FieldShape) -> u64 {
    let bit = |v: u32| 1u64 << v;
    let span = |a: u32, b: u32| (a..=b).fold(0u64, |m, v| m | bit(v));

    match shape {
        FieldShape::Any => span(kind.min(), kind.max()),
        FieldShape::Step(step) => (kind.min()..=kind.max())
            .step_by(*step as usize)
            .fold(0u64, |m, v| m | bit(v)),
        FieldShape::Value(v) => bit(*v),
        FieldShape::Range(a, b) => span(*a, *b),
        FieldShape::List(terms) => terms.iter().fold(0u64, |m, term| match term {
            ListTerm::Value(v) => m | bit(*v),
            ListTerm::Range(a, b) => m | span(*a, *b),
        }),
        FieldShape::Last => match kind {
            // Saturday closes a Sunday-first week.
            FieldKind::DayOfWeek => bit(6),
            // Resolved per month in `matches_day_of_month`.
            _ => 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(kind: FieldKind, raw: &str) -> Vec<u32> {
        CronField::parse(kind, raw).unwrap().values().collect()
    }

    #[test]
    fn wildcard_covers_whole_range() {
        assert_eq!(values(FieldKind::Month, "*"), (1..=12).collect::<Vec<_>>());
        assert_eq!(values(FieldKind::DayOfWeek, "*").len(), 7);
    }

    #[test]
    fn step_starts_at_field_minimum() {
        assert_eq!(values(FieldKind::Minute, "*/20"), vec![0, 20, 40]);
        assert_eq!(values(FieldKind::DayOfMonth, "*/10"), vec![1, 11, 21, 31]);
    }

    #[test]
    fn list_may_mix_values_and_ranges() {
        assert_eq!(values(FieldKind::Hour, "1-3,7,22"), vec![1, 2, 3, 7, 22]);
    }

    #[test]
    fn rejects_malformed_input() {
        for (kind, raw) in [
            (FieldKind::Minute, "60"),
            (FieldKind::Minute, "*/0"),
            (FieldKind::Minute, "*/abc"),
            (FieldKind::Minute, "*/60"),
            (FieldKind::Minute, "+5"),
            (FieldKind::Minute, ""),
            (FieldKind::Minute, "1,,2"),
            (FieldKind::Minute, "5-1"),
            (FieldKind::Minute, "L"),
            (FieldKind::Hour, "24"),
            (FieldKind::DayOfMonth, "0"),
            (FieldKind::Month, "13"),
            (FieldKind::DayOfWeek, "7"),
            (FieldKind::DayOfWeek, "1-5/2"),
        ] {
            assert!(
                CronField::parse(kind, raw).is_err(),
                "{} '{}' should be rejected",
                kind.name(),
                raw
            );
        }
    }

    #[test]
    fn last_day_of_month_resolved_per_month() {
        let field = CronField::parse(FieldKind::DayOfMonth, "L").unwrap();
        assert!(field.matches_day_of_month(28, 28));
        assert!(!field.matches_day_of_month(28, 31));
        assert!(field.is_restricted());
    }

    #[test]
    fn last_day_of_week_is_saturday() {
        assert_eq!(values(FieldKind::DayOfWeek, "L"), vec![6]);
    }

    #[test]
    fn star_prefixed_fields_are_unrestricted() {
        assert!(!CronField::parse(FieldKind::DayOfMonth, "*").unwrap().is_restricted());
        assert!(!CronField::parse(FieldKind::DayOfMonth, "*/2").unwrap().is_restricted());
        assert!(CronField::parse(FieldKind::DayOfMonth, "1-31").unwrap().is_restricted());
    }
}
