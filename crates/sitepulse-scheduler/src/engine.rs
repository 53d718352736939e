//! Scan scheduler: owns the scan definitions and runs the due-check.
//!
//! Due scans are not executed here. Each one is published as a [`ScanJob`] on
//! an unbounded channel and picked up by the executor, so a slow scan never
//! holds up the due-check loop.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sitepulse_core::config::SchedulerConfig;
use sitepulse_core::error::{Result, SitePulseError};
use sitepulse_core::validate;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

use crate::definition::{Interval, IntervalUnit, ScanDefinition};
use crate::interval::parse_recurrence;

/// One triggered run of a definition.
#[derive(Debug, Clone)]
pub struct ScanJob {
    /// Snapshot taken when the definition was found due.
    pub definition: ScanDefinition,
    pub triggered_at: DateTime<Utc>,
}

/// Resets the due-check flag on every exit path.
struct CheckGuard<'a>(&'a AtomicBool);

impl Drop for CheckGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ScanScheduler {
    definitions: DashMap<String, ScanDefinition>,
    min_interval_ms: i64,
    jobs: mpsc::UnboundedSender<ScanJob>,
    checking: AtomicBool,
}

impl ScanScheduler {
    /// Create the scheduler and the receiving end of its job channel.
    pub fn new(config: &SchedulerConfig) -> (Self, mpsc::UnboundedReceiver<ScanJob>) {
        let (jobs, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            definitions: DashMap::new(),
            min_interval_ms: (config.min_interval_secs as i64).saturating_mul(1_000),
            jobs,
            checking: AtomicBool::new(false),
        };
        (scheduler, rx)
    }

    /// Add or replace the definition for (`user_id`, `url`). The first run
    /// happens one full interval from now.
    pub fn schedule(
        &self,
        user_id: &str,
        channel_id: &str,
        url: &str,
        value: i64,
        unit: IntervalUnit,
    ) -> Result<ScanDefinition> {
        self.schedule_at(user_id, channel_id, url, Interval::new(value, unit), Utc::now())
    }

    /// Schedule from a phrase like "every 6 hours".
    pub fn schedule_phrase(
        &self,
        user_id: &str,
        channel_id: &str,
        url: &str,
        phrase: &str,
    ) -> Result<ScanDefinition> {
        let interval = parse_recurrence(phrase).ok_or_else(|| {
            SitePulseError::Validation(format!(
                "could not understand '{phrase}' (try 'every 6 hours' or 'every 30 minutes')"
            ))
        })?;
        self.schedule_at(user_id, channel_id, url, interval, Utc::now())
    }

    pub fn schedule_at(
        &self,
        user_id: &str,
        channel_id: &str,
        url: &str,
        interval: Interval,
        now: DateTime<Utc>,
    ) -> Result<ScanDefinition> {
        let user_id = validate::identifier("user id", user_id)?;
        let channel_id = validate::identifier("channel id", channel_id)?;
        let url = validate::target_url(url)?;
        if interval.value <= 0 {
            return Err(SitePulseError::Validation(format!(
                "interval must be positive, got {}",
                interval.value
            )));
        }
        if interval.as_millis() < self.min_interval_ms {
            return Err(SitePulseError::Validation(format!(
                "interval {} is shorter than the minimum of {}s",
                interval,
                self.min_interval_ms / 1_000
            )));
        }

        let definition = ScanDefinition::new(user_id, channel_id, &url, interval, now);
        let replaced = self
            .definitions
            .insert(definition.id.clone(), definition.clone())
            .is_some();
        tracing::info!(
            "📅 Scan {} for {url} ({interval}, user {user_id})",
            if replaced { "rescheduled" } else { "scheduled" }
        );
        Ok(definition)
    }

    pub fn cancel(&self, user_id: &str, url: &str) -> bool {
        // Accept the URL as typed or in normalized form.
        let normalized = validate::target_url(url).unwrap_or_else(|_| url.to_string());
        let removed = self
            .definitions
            .remove(&ScanDefinition::key(user_id, &normalized))
            .or_else(|| self.definitions.remove(&ScanDefinition::key(user_id, url)))
            .is_some();
        if removed {
            tracing::info!("🗑️ Scan of {url} cancelled for user {user_id}");
        }
        removed
    }

    /// Remove every definition owned by `user_id`; returns how many went.
    pub fn cancel_all(&self, user_id: &str) -> usize {
        let before = self.definitions.len();
        self.definitions.retain(|_, def| def.user_id != user_id);
        let removed = before.saturating_sub(self.definitions.len());
        if removed > 0 {
            tracing::info!("🗑️ {removed} scan(s) cancelled for user {user_id}");
        }
        removed
    }

    /// Snapshot of a user's definitions, sorted by URL.
    pub fn list_for_user(&self, user_id: &str) -> Vec<ScanDefinition> {
        let mut defs: Vec<ScanDefinition> = self
            .definitions
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        defs.sort_by(|a, b| a.target_url.cmp(&b.target_url));
        defs
    }

    pub fn get(&self, user_id: &str, url: &str) -> Option<ScanDefinition> {
        self.definitions
            .get(&ScanDefinition::key(user_id, url))
            .map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Publish a job for every due definition and move its `last_run` to
    /// `now` before anything executes. A failed run therefore waits a full
    /// interval. Returns the number of jobs published; an overlapping call
    /// is skipped and returns 0.
    pub fn due_check(&self, now: DateTime<Utc>) -> usize {
        if self
            .checking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("⏭️ Due-check already running, skipping this tick");
            return 0;
        }
        let _guard = CheckGuard(&self.checking);

        let mut due = Vec::new();
        for mut entry in self.definitions.iter_mut() {
            let def = entry.value_mut();
            if !def.is_due(now) {
                continue;
            }
            def.last_run = now;
            def.run_count += 1;
            due.push(ScanJob {
                definition: def.clone(),
                triggered_at: now,
            });
        }

        let mut published = 0;
        for job in due {
            let id = job.definition.id.clone();
            match self.jobs.send(job) {
                Ok(()) => {
                    tracing::info!("🔔 Scan due: {id}");
                    published += 1;
                }
                Err(_) => tracing::warn!("⚠️ No executor listening, scan {id} dropped"),
            }
        }
        if published > 0 {
            tracing::debug!("⏰ Due-check published {published} scan(s)");
        }
        published
    }
}

/// Run the due-check every `check_interval_secs` until the task is dropped.
pub async fn spawn_scheduler(scheduler: Arc<ScanScheduler>, check_interval_secs: u64) {
    tracing::info!(
        "⏰ Scheduler started (check every {}s)",
        check_interval_secs
    );

    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(check_interval_secs.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        scheduler.due_check(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn scheduler() -> (ScanScheduler, mpsc::UnboundedReceiver<ScanJob>) {
        ScanScheduler::new(&SchedulerConfig::default())
    }

    #[test]
    fn test_valid_intervals_are_listed() {
        let (sched, _rx) = scheduler();
        let cases = [
            (10, IntervalUnit::Seconds),
            (1, IntervalUnit::Minutes),
            (3, IntervalUnit::Hours),
            (2, IntervalUnit::Days),
        ];
        for (i, (value, unit)) in cases.into_iter().enumerate() {
            let url = format!("https://site{i}.com/");
            sched.schedule("u1", "c1", &url, value, unit).unwrap();
            assert!(sched.list_for_user("u1").iter().any(|d| d.target_url == url));
        }
        assert_eq!(sched.list_for_user("u1").len(), 4);
    }

    #[test]
    fn test_short_or_non_positive_intervals_rejected() {
        let (sched, _rx) = scheduler();
        let cases = [
            (9, IntervalUnit::Seconds),
            (0, IntervalUnit::Hours),
            (-5, IntervalUnit::Minutes),
        ];
        for (value, unit) in cases {
            let err = sched
                .schedule("u1", "c1", "https://a.com", value, unit)
                .unwrap_err();
            assert!(matches!(err, SitePulseError::Validation(_)));
        }
        assert!(sched.list_for_user("u1").is_empty());
    }

    #[test]
    fn test_bad_url_rejected() {
        let (sched, _rx) = scheduler();
        assert!(sched
            .schedule("u1", "c1", "ftp://a.com", 1, IntervalUnit::Hours)
            .is_err());
        assert!(sched.is_empty());
    }

    #[test]
    fn test_reschedule_replaces() {
        let (sched, _rx) = scheduler();
        sched.schedule("u1", "c1", "https://a.com", 1, IntervalUnit::Hours).unwrap();
        sched.schedule("u1", "c2", "https://a.com", 6, IntervalUnit::Hours).unwrap();
        let defs = sched.list_for_user("u1");
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].interval.value, 6);
        assert_eq!(defs[0].channel_id, "c2");
    }

    #[test]
    fn test_schedule_phrase() {
        let (sched, _rx) = scheduler();
        let def = sched
            .schedule_phrase("u1", "c1", "https://a.com", "every 12 hours")
            .unwrap();
        assert_eq!(def.interval, Interval::new(12, IntervalUnit::Hours));
        assert!(sched
            .schedule_phrase("u1", "c1", "https://b.com", "every 5 seconds")
            .is_err());
        assert!(sched
            .schedule_phrase("u1", "c1", "https://b.com", "sometimes")
            .is_err());
    }

    #[test]
    fn test_cancel_removes_only_that_pair() {
        let (sched, _rx) = scheduler();
        sched.schedule("u1", "c1", "https://a.com", 1, IntervalUnit::Hours).unwrap();
        sched.schedule("u1", "c1", "https://b.com", 1, IntervalUnit::Hours).unwrap();
        sched.schedule("u2", "c2", "https://a.com", 1, IntervalUnit::Hours).unwrap();

        assert!(sched.cancel("u1", "https://a.com"));
        assert!(!sched.cancel("u1", "https://a.com"));

        let left: Vec<String> = sched
            .list_for_user("u1")
            .into_iter()
            .map(|d| d.target_url)
            .collect();
        assert_eq!(left, vec!["https://b.com/"]);
        assert_eq!(sched.list_for_user("u2").len(), 1);
    }

    #[test]
    fn test_cancel_all() {
        let (sched, _rx) = scheduler();
        sched.schedule("u1", "c1", "https://a.com", 1, IntervalUnit::Hours).unwrap();
        sched.schedule("u1", "c1", "https://b.com", 1, IntervalUnit::Hours).unwrap();
        sched.schedule("u2", "c2", "https://a.com", 1, IntervalUnit::Hours).unwrap();
        assert_eq!(sched.cancel_all("u1"), 2);
        assert_eq!(sched.cancel_all("u1"), 0);
        assert_eq!(sched.len(), 1);
    }

    #[test]
    fn test_due_check_triggers_once_per_cycle() {
        let (sched, mut rx) = scheduler();
        let now = Utc::now();
        let interval = Interval::new(1, IntervalUnit::Hours);
        sched
            .schedule_at("u1", "c1", "https://a.com", interval, now - Duration::hours(2))
            .unwrap();
        sched
            .schedule_at("u1", "c1", "https://fresh.com", interval, now)
            .unwrap();

        assert_eq!(sched.due_check(now), 1);
        let job = rx.try_recv().unwrap();
        assert_eq!(job.definition.target_url, "https://a.com/");
        assert_eq!(job.definition.last_run, now);
        assert_eq!(job.triggered_at, now);
        assert!(rx.try_recv().is_err());

        // Same `now`: nothing is due any more.
        assert_eq!(sched.due_check(now), 0);
        assert!(rx.try_recv().is_err());

        let def = sched.get("u1", "https://a.com/").unwrap();
        assert_eq!(def.last_run, now);
        assert_eq!(def.run_count, 1);

        // One interval later both definitions come due.
        assert_eq!(sched.due_check(now + Duration::hours(1)), 2);
    }

    #[test]
    fn test_overlapping_due_check_is_skipped() {
        let (sched, _rx) = scheduler();
        let now = Utc::now();
        sched
            .schedule_at(
                "u1",
                "c1",
                "https://a.com",
                Interval::new(1, IntervalUnit::Hours),
                now - Duration::hours(2),
            )
            .unwrap();

        sched.checking.store(true, Ordering::SeqCst);
        assert_eq!(sched.due_check(now), 0);
        sched.checking.store(false, Ordering::SeqCst);
        assert_eq!(sched.due_check(now), 1);
        // The guard released the flag.
        assert!(!sched.checking.load(Ordering::SeqCst));
    }

    #[test]
    fn test_due_check_without_executor_does_not_panic() {
        let (sched, rx) = scheduler();
        drop(rx);
        let now = Utc::now();
        sched
            .schedule_at(
                "u1",
                "c1",
                "https://a.com",
                Interval::new(10, IntervalUnit::Seconds),
                now - Duration::minutes(1),
            )
            .unwrap();
        assert_eq!(sched.due_check(now), 0);
        // last_run still advanced.
        assert_eq!(sched.get("u1", "https://a.com/").unwrap().last_run, now);
    }
}
