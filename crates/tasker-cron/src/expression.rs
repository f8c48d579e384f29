//! Whole-expression parsing and next-fire computation.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc,
};

use crate::error::{CronError, Result};
use crate::field::{CronField, FieldKind};

/// How far ahead `next_after` looks before concluding the expression never
/// fires. 28 years covers every weekday/leap-year combination, so a date like
/// Feb 29 on a Monday is always found if it exists.
const SEARCH_HORIZON_DAYS: i64 = 366 * 28;

/// Split on whitespace and drop a leading seconds field when exactly six
/// fields are present.
pub fn normalize(expression: &str) -> Vec<&str> {
    let mut fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() == 6 {
        fields.remove(0);
    }
    fields
}

/// A parsed five-field cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    source: String,
    minute: CronField,
    hour: CronField,
    day_of_month: CronField,
    month: CronField,
    day_of_week: CronField,
}

impl CronExpression {
    /// Parse an expression of the form `minute hour day month weekday`.
    ///
    /// A six-field expression has its leading seconds field silently dropped.
    ///
    /// # Examples
    ///
    /// - `0 0 * * *`: daily at midnight
    /// - `*/5 * * * *`: every 5 minutes
    /// - `0 9-17 * * 1-5`: on the hour, 9am-5pm, Monday-Friday
    /// - `30 23 L * *`: 23:30 on the last day of every month
    pub fn parse(expression: &str) -> Result<Self> {
        let fields = normalize(expression);
        let [minute, hour, dom, month, dow] = fields.as_slice() else {
            return Err(CronError::FieldCount {
                found: fields.len(),
            });
        };

        Ok(Self {
            source: fields.join(" "),
            minute: CronField::parse(FieldKind::Minute, minute)?,
            hour: CronField::parse(FieldKind::Hour, hour)?,
            day_of_month: CronField::parse(FieldKind::DayOfMonth, dom)?,
            month: CronField::parse(FieldKind::Month, month)?,
            day_of_week: CronField::parse(FieldKind::DayOfWeek, dow)?,
        })
    }

    /// The normalized five-field form.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn field(&self, kind: FieldKind) -> &CronField {
        match kind {
            FieldKind::Minute => &self.minute,
            FieldKind::Hour => &self.hour,
            FieldKind::DayOfMonth => &self.day_of_month,
            FieldKind::Month => &self.month,
            FieldKind::DayOfWeek => &self.day_of_week,
        }
    }

    /// Whether the calendar day qualifies, ignoring the time of day.
    ///
    /// Day-of-month and day-of-week are OR'd when both are restricted and
    /// AND'd otherwise (Vixie cron). `0 0 13 * 5` therefore fires on every
    /// 13th *and* on every Friday, while `0 0 */2 * 5` fires only on Fridays
    /// that fall on an odd day.
    pub fn matches_date(&self, date: NaiveDate) -> bool {
        if !self.month.matches(date.month()) {
            return false;
        }
        let dom = self
            .day_of_month
            .matches_day_of_month(date.day(), last_day_of_month(date));
        let dow = self
            .day_of_week
            .matches(date.weekday().num_days_from_sunday());

        if self.day_of_month.is_restricted() && self.day_of_week.is_restricted() {
            dom || dow
        } else {
            dom && dow
        }
    }

    /// Whether the expression fires at the given wall-clock minute.
    pub fn matches(&self, local: &NaiveDateTime) -> bool {
        self.matches_date(local.date())
            && self.hour.matches(local.hour())
            && self.minute.matches(local.minute())
    }

    /// Earliest minute boundary strictly after `after`, evaluated in UTC.
    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.next_after_in(after, &Utc)
    }

    /// Earliest minute boundary strictly after `after`, with fields evaluated
    /// against the wall clock of `tz`.
    ///
    /// Local times skipped by a DST transition never fire; repeated local
    /// times fire on whichever occurrence is first after `after`. Returns
    /// `None` if nothing matches within the search horizon, e.g. `0 0 30 2 *`.
    pub fn next_after_in<Tz: TimeZone>(
        &self,
        after: &DateTime<Utc>,
        tz: &Tz,
    ) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(tz).naive_local();
        let start = local.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let horizon = start.date() + Duration::days(SEARCH_HORIZON_DAYS);

        let mut date = start.date();
        while date <= horizon {
            if self.matches_date(date) {
                let first_day = date == start.date();
                for hour in self.hour.values() {
                    if first_day && hour < start.hour() {
                        continue;
                    }
                    for minute in self.minute.values() {
                        if first_day && hour == start.hour() && minute < start.minute() {
                            continue;
                        }
                        let naive = date.and_hms_opt(hour, minute, 0)?;
                        if let Some(instant) = resolve_local(tz, &naive, after) {
                            return Some(instant);
                        }
                    }
                }
            }
            date = date.succ_opt()?;
        }
        None
    }

    /// Successive fire instants after `after`.
    pub fn upcoming<'a>(&'a self, after: DateTime<Utc>) -> impl Iterator<Item = DateTime<Utc>> + 'a {
        std::iter::successors(self.next_after(&after), move |prev| self.next_after(prev))
    }
}

impl std::str::FromStr for CronExpression {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for CronExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// Map a wall-clock minute in `tz` to a UTC instant strictly after `after`.
fn resolve_local<Tz: TimeZone>(
    tz: &Tz,
    naive: &NaiveDateTime,
    after: &DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let later = |dt: DateTime<Tz>| {
        let utc = dt.with_timezone(&Utc);
        (utc > *after).then_some(utc)
    };
    match tz.from_local_datetime(naive) {
        LocalResult::Single(dt) => later(dt),
        LocalResult::Ambiguous(first, second) => later(first).or_else(|| later(second)),
        LocalResult::None => None,
    }
}

fn last_day_of_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .map_or(31, |last| last.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn next(expr: &str, after: &str) -> Option<DateTime<Utc>> {
        CronExpression::parse(expr).unwrap().next_after(&at(after))
    }

    #[test]
    fn every_minute_is_strictly_after() {
        assert_eq!(
            next("* * * * *", "2026-01-01T00:00:00Z"),
            Some(at("2026-01-01T00:01:00Z"))
        );
        assert_eq!(
            next("* * * * *", "2026-01-01T00:00:59.999Z"),
            Some(at("2026-01-01T00:01:00Z"))
        );
    }

    #[test]
    fn daily_rolls_to_tomorrow_once_passed() {
        assert_eq!(
            next("30 9 * * *", "2026-01-01T09:30:00Z"),
            Some(at("2026-01-02T09:30:00Z"))
        );
        assert_eq!(
            next("30 9 * * *", "2026-01-01T09:29:00Z"),
            Some(at("2026-01-01T09:30:00Z"))
        );
    }

    #[test]
    fn rolls_over_year_end() {
        assert_eq!(
            next("0 0 1 1 *", "2026-06-15T12:00:00Z"),
            Some(at("2027-01-01T00:00:00Z"))
        );
    }

    #[test]
    fn last_day_of_february_in_leap_year() {
        assert_eq!(
            next("0 12 L * *", "2028-02-01T00:00:00Z"),
            Some(at("2028-02-29T12:00:00Z"))
        );
        assert_eq!(
            next("0 12 L * *", "2027-02-01T00:00:00Z"),
            Some(at("2027-02-28T12:00:00Z"))
        );
    }

    #[test]
    fn impossible_date_never_fires() {
        assert_eq!(next("0 0 31 2 *", "2026-01-01T00:00:00Z"), None);
    }

    #[test]
    fn feb_29_found_years_ahead() {
        assert_eq!(
            next("0 0 29 2 *", "2028-03-01T00:00:00Z"),
            Some(at("2032-02-29T00:00:00Z"))
        );
    }

    #[test]
    fn day_of_month_or_day_of_week_when_both_restricted() {
        // 2026-03-13 is a Friday; 2026-03-06 is the Friday before.
        let expr = CronExpression::parse("0 0 13 * 5").unwrap();
        let fires: Vec<_> = expr.upcoming(at("2026-03-01T00:00:00Z")).take(3).collect();
        assert_eq!(
            fires,
            vec![
                at("2026-03-06T00:00:00Z"),
                at("2026-03-13T00:00:00Z"),
                at("2026-03-20T00:00:00Z"),
            ]
        );
    }

    #[test]
    fn day_of_week_alone_when_day_of_month_is_star() {
        // Mondays only.
        assert_eq!(
            next("0 8 * * 1", "2026-03-04T00:00:00Z"),
            Some(at("2026-03-09T08:00:00Z"))
        );
    }

    #[test]
    fn star_step_day_of_month_is_anded_with_day_of_week() {
        // Odd days that are also Fridays: Mar 6 is even, Mar 13 is odd.
        assert_eq!(
            next("0 0 */2 * 5", "2026-03-01T00:00:00Z"),
            Some(at("2026-03-13T00:00:00Z"))
        );
    }

    #[test]
    fn six_field_expression_drops_seconds() {
        let six = CronExpression::parse("15 0 12 * * *").unwrap();
        let five = CronExpression::parse("0 12 * * *").unwrap();
        assert_eq!(six, five);
        assert_eq!(six.as_str(), "0 12 * * *");
    }

    #[test]
    fn evaluates_in_fixed_offset_wall_clock() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let expr = CronExpression::parse("0 9 * * *").unwrap();
        // 09:00 at +02:00 is 07:00 UTC.
        assert_eq!(
            expr.next_after_in(&at("2026-05-01T06:00:00Z"), &tz),
            Some(at("2026-05-01T07:00:00Z"))
        );
    }

    #[test]
    fn matches_checks_every_field() {
        let expr = CronExpression::parse("*/15 9-17 * * 1-5").unwrap();
        let monday_930 = at("2026-03-02T09:30:00Z").naive_utc();
        let sunday_930 = at("2026-03-01T09:30:00Z").naive_utc();
        let monday_931 = at("2026-03-02T09:31:00Z").naive_utc();
        assert!(expr.matches(&monday_930));
        assert!(!expr.matches(&sunday_930));
        assert!(!expr.matches(&monday_931));
    }

    #[test]
    fn wrong_field_count_reported() {
        assert_eq!(
            CronExpression::parse("* * *"),
            Err(CronError::FieldCount { found: 3 })
        );
        assert_eq!(
            CronExpression::parse(""),
            Err(CronError::FieldCount { found: 0 })
        );
    }
}
