//! Recurrence phrase parsing.
//!
//! Two modes:
//! - default: `every N hour(s)` with N in {1, 3, 6, 12, 24}
//! - general: `every N <second|minute|hour|day>(s)`, or `every <unit>` for N = 1
//!
//! A phrase that looks like the default form but uses another N falls back to
//! the general parser.

use regex::Regex;
use std::sync::LazyLock;

use crate::definition::{Interval, IntervalUnit};

/// Hour counts accepted by the default mode.
pub const DEFAULT_HOURS: [i64; 5] = [1, 3, 6, 12, 24];

static HOURS_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\bevery\s+(\d+)\s*(?:hours?|hrs?)\b").ok());

static GENERAL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bevery\s+(?:(\d+)\s*)?(seconds?|secs?|minutes?|mins?|hours?|hrs?|days?)\b",
    )
    .ok()
});

/// Default mode only: `every N hours` with N from [`DEFAULT_HOURS`].
pub fn parse_default_hours(text: &str) -> Option<Interval> {
    let caps = HOURS_RE.as_ref()?.captures(text)?;
    let n: i64 = caps.get(1)?.as_str().parse().ok()?;
    DEFAULT_HOURS
        .contains(&n)
        .then(|| Interval::new(n, IntervalUnit::Hours))
}

/// General parser over any supported unit. The value is not range checked;
/// the scheduler applies the minimum-interval floor.
pub fn parse_general(text: &str) -> Option<Interval> {
    let caps = GENERAL_RE.as_ref()?.captures(text)?;
    let value = match caps.get(1) {
        Some(m) => m.as_str().parse().ok()?,
        None => 1,
    };
    let unit = IntervalUnit::parse(caps.get(2)?.as_str())?;
    Some(Interval::new(value, unit))
}

/// Default mode first, then the general parser.
pub fn parse_recurrence(text: &str) -> Option<Interval> {
    parse_default_hours(text).or_else(|| parse_general(text))
}

/// Whether `text` contains a recurrence phrase at all.
pub fn mentions_recurrence(text: &str) -> bool {
    parse_general(text).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_hours_mode() {
        assert_eq!(
            parse_default_hours("scan it every 6 hours please"),
            Some(Interval::new(6, IntervalUnit::Hours))
        );
        assert_eq!(
            parse_default_hours("Every 1 hour"),
            Some(Interval::new(1, IntervalUnit::Hours))
        );
        assert_eq!(parse_default_hours("every 5 hours"), None);
        assert_eq!(parse_default_hours("every 30 minutes"), None);
    }

    #[test]
    fn test_general_fallback() {
        assert_eq!(
            parse_recurrence("every 5 hours"),
            Some(Interval::new(5, IntervalUnit::Hours))
        );
        assert_eq!(
            parse_recurrence("monitor https://a.com every 30 minutes"),
            Some(Interval::new(30, IntervalUnit::Minutes))
        );
        assert_eq!(
            parse_recurrence("every 15 seconds"),
            Some(Interval::new(15, IntervalUnit::Seconds))
        );
        assert_eq!(
            parse_recurrence("every day"),
            Some(Interval::new(1, IntervalUnit::Days))
        );
        assert_eq!(
            parse_recurrence("every 2 days"),
            Some(Interval::new(2, IntervalUnit::Days))
        );
    }

    #[test]
    fn test_no_recurrence() {
        assert_eq!(parse_recurrence("analyze https://a.com"), None);
        assert_eq!(parse_recurrence("every week"), None);
        assert!(!mentions_recurrence("everyday seo tips"));
        assert!(mentions_recurrence("check every hour"));
    }
}
