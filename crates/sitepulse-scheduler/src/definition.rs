//! Scan definitions: the recurring rules the scheduler owns.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit of a recurrence interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl IntervalUnit {
    /// Accepts singular, plural and short forms: "hour", "hours", "hr", "h".
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "s" | "sec" | "secs" | "second" | "seconds" => Some(IntervalUnit::Seconds),
            "m" | "min" | "mins" | "minute" | "minutes" => Some(IntervalUnit::Minutes),
            "h" | "hr" | "hrs" | "hour" | "hours" => Some(IntervalUnit::Hours),
            "d" | "day" | "days" => Some(IntervalUnit::Days),
            _ => None,
        }
    }

    pub fn millis(&self) -> i64 {
        match self {
            IntervalUnit::Seconds => 1_000,
            IntervalUnit::Minutes => 60_000,
            IntervalUnit::Hours => 3_600_000,
            IntervalUnit::Days => 86_400_000,
        }
    }

    fn label(&self, value: i64) -> &'static str {
        match (self, value == 1) {
            (IntervalUnit::Seconds, true) => "second",
            (IntervalUnit::Seconds, false) => "seconds",
            (IntervalUnit::Minutes, true) => "minute",
            (IntervalUnit::Minutes, false) => "minutes",
            (IntervalUnit::Hours, true) => "hour",
            (IntervalUnit::Hours, false) => "hours",
            (IntervalUnit::Days, true) => "day",
            (IntervalUnit::Days, false) => "days",
        }
    }
}

/// Magnitude + unit, e.g. `3 hours`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub value: i64,
    pub unit: IntervalUnit,
}

impl Interval {
    pub fn new(value: i64, unit: IntervalUnit) -> Self {
        Self { value, unit }
    }

    /// Resolved length in milliseconds; saturates instead of overflowing.
    pub fn as_millis(&self) -> i64 {
        self.value.saturating_mul(self.unit.millis())
    }

    pub fn as_duration(&self) -> Duration {
        Duration::try_milliseconds(self.as_millis()).unwrap_or(Duration::MAX)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "every {} {}", self.value, self.unit.label(self.value))
    }
}

/// A recurring scan of one URL for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanDefinition {
    /// `{user_id}::{target_url}`
    pub id: String,
    pub user_id: String,
    /// Where results and failure notices go.
    pub channel_id: String,
    pub target_url: String,
    pub interval: Interval,
    pub last_run: DateTime<Utc>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    /// How many times the scheduler has triggered this definition.
    pub run_count: u32,
}

impl ScanDefinition {
    pub fn key(user_id: &str, target_url: &str) -> String {
        format!("{user_id}::{target_url}")
    }

    pub fn new(
        user_id: &str,
        channel_id: &str,
        target_url: &str,
        interval: Interval,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Self::key(user_id, target_url),
            user_id: user_id.to_string(),
            channel_id: channel_id.to_string(),
            target_url: target_url.to_string(),
            interval,
            last_run: now,
            active: true,
            created_at: now,
            run_count: 0,
        }
    }

    pub fn next_due(&self) -> DateTime<Utc> {
        self.last_run
            .checked_add_signed(self.interval.as_duration())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.active && self.next_due() <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_parse() {
        assert_eq!(IntervalUnit::parse("Hours"), Some(IntervalUnit::Hours));
        assert_eq!(IntervalUnit::parse("minute"), Some(IntervalUnit::Minutes));
        assert_eq!(IntervalUnit::parse("d"), Some(IntervalUnit::Days));
        assert_eq!(IntervalUnit::parse("weeks"), None);
    }

    #[test]
    fn test_interval_resolution() {
        assert_eq!(Interval::new(10, IntervalUnit::Seconds).as_millis(), 10_000);
        assert_eq!(Interval::new(3, IntervalUnit::Hours).as_millis(), 10_800_000);
        assert_eq!(Interval::new(i64::MAX, IntervalUnit::Days).as_millis(), i64::MAX);
        assert_eq!(Interval::new(1, IntervalUnit::Days).to_string(), "every 1 day");
        assert_eq!(Interval::new(6, IntervalUnit::Hours).to_string(), "every 6 hours");
    }

    #[test]
    fn test_due_after_interval() {
        let now = Utc::now();
        let def = ScanDefinition::new(
            "u1",
            "c1",
            "https://a.com/",
            Interval::new(1, IntervalUnit::Hours),
            now,
        );
        assert_eq!(def.id, "u1::https://a.com/");
        assert!(!def.is_due(now));
        assert!(!def.is_due(now + Duration::minutes(59)));
        assert!(def.is_due(now + Duration::hours(1)));

        let mut paused = def.clone();
        paused.active = false;
        assert!(!paused.is_due(now + Duration::days(1)));
    }
}
