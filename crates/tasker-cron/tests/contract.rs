// Public contract of the cron engine as used by the scheduler and the API.
// Changing any of these answers changes when users' tasks run.

use chrono::{DateTime, Utc};
use tasker_cron::{describe, next_invocation, validate};

fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

#[test]
fn accepts_common_shapes() {
    for expr in [
        "* * * * *",
        "*/5 * * * *",
        "0 0 * * *",
        "0 9-17 * * 1-5",
        "15,45 * * * *",
        "0 0 L * *",
        "0 0 * * L",
        "0 0 1-7,15 * *",
        "0 0 31 2 *",
    ] {
        assert!(validate(expr), "{expr} should validate");
    }
}

#[test]
fn rejects_malformed() {
    for expr in [
        "",
        "61 * * * *",
        "a b c d e",
        "* * * *",
        "* * * * * * *",
        "*/0 * * * *",
        "*/abc * * * *",
        "* 24 * * *",
        "* * 0 * *",
        "* * * 13 *",
        "* * * * 7",
        "5-1 * * * *",
    ] {
        assert!(!validate(expr), "{expr:?} should not validate");
    }
}

#[test]
fn seconds_field_is_ignored() {
    assert_eq!(validate("0 0 * * * *"), validate("0 * * * *"));
    assert_eq!(validate("99 0 * * * *"), validate("0 * * * *"));

    let t = at("2026-04-10T10:20:30Z");
    assert_eq!(
        next_invocation("0 0 * * * *", &t),
        next_invocation("0 * * * *", &t)
    );
}

#[test]
fn next_is_strictly_increasing() {
    let mut t = at("2026-12-31T23:58:00Z");
    for expr in ["* * * * *", "*/7 * * * *", "0 0 L * *", "0 12 13 * 5", "30 2 * * 0"] {
        for _ in 0..50 {
            let n = next_invocation(expr, &t).unwrap();
            let nn = next_invocation(expr, &n).unwrap();
            assert!(t < n && n < nn, "{expr}: {t} -> {n} -> {nn}");
            t = n;
        }
    }
}

#[test]
fn day_of_month_and_day_of_week_are_ored_when_both_set() {
    // 2026-02-13 is a Friday. With both fields restricted, the 1st of March
    // (a Sunday) qualifies through day-of-month and every Friday through
    // day-of-week.
    let fires: Vec<_> = {
        let mut t = at("2026-02-13T00:00:00Z");
        (0..4)
            .map(|_| {
                t = next_invocation("0 0 1 * 5", &t).unwrap();
                t
            })
            .collect()
    };
    assert_eq!(
        fires,
        vec![
            at("2026-02-20T00:00:00Z"),
            at("2026-02-27T00:00:00Z"),
            at("2026-03-01T00:00:00Z"),
            at("2026-03-06T00:00:00Z"),
        ]
    );
}

#[test]
fn never_firing_expression_yields_none() {
    assert_eq!(next_invocation("0 0 30 2 *", &at("2026-01-01T00:00:00Z")), None);
    assert_eq!(next_invocation("nonsense", &at("2026-01-01T00:00:00Z")), None);
}

#[test]
fn describe_is_total() {
    assert!(describe("*/10 * * * *").is_valid);
    assert_eq!(describe("*/10 * * * *").description, "Runs every 10 minutes");
    assert!(!describe("\t\n").is_valid);
    assert_eq!(describe("61 * * * *").description, "invalid expression");
}
