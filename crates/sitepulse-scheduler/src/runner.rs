//! Executor for scheduler-triggered scans.
//!
//! The scan itself comes in as a callback so this crate does not depend on
//! the scanner. Every job runs on its own task; an error or a panic is logged
//! and reported to the definition's channel, and never reaches the loop.

use sitepulse_channels::Notifier;
use sitepulse_channels::notifier::events;
use sitepulse_core::error::Result;
use sitepulse_core::types::DeliveryStatus;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::ScanJob;

/// Consume jobs until the scheduler side of the channel is dropped.
///
/// `execute` returns a short summary on success, which is only logged.
pub fn spawn_executor<F, Fut>(
    mut jobs: mpsc::UnboundedReceiver<ScanJob>,
    notifier: Arc<Notifier>,
    execute: F,
) -> JoinHandle<()>
where
    F: Fn(ScanJob) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    let execute = Arc::new(execute);
    tokio::spawn(async move {
        tracing::info!("🏃 Scan executor started");
        while let Some(job) = jobs.recv().await {
            let def = job.definition.clone();
            let execute = Arc::clone(&execute);
            // The callback is invoked inside the task so a panic while building
            // the future is contained too.
            let run = tokio::spawn(async move { execute(job).await });
            let notifier = Arc::clone(&notifier);

            tokio::spawn(async move {
                let failure = match run.await {
                    Ok(Ok(summary)) => {
                        tracing::info!("✅ Scheduled scan {} finished: {summary}", def.id);
                        return;
                    }
                    Ok(Err(e)) => e.user_message(),
                    Err(join_err) if join_err.is_panic() => "internal error while scanning".to_string(),
                    Err(join_err) => join_err.to_string(),
                };
                tracing::error!("❌ Scheduled scan {} failed: {failure}", def.id);
                // Best effort; a rejected send is logged by the notifier.
                notifier.notify_detached(
                    events::SCAN_ERROR,
                    &def.channel_id,
                    DeliveryStatus::Error,
                    format!(
                        "❌ Scheduled scan of {} failed: {failure}. Next attempt {}.",
                        def.target_url, def.interval
                    ),
                );
            });
        }
        tracing::info!("🛑 Scan executor stopped (scheduler dropped)");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Interval, IntervalUnit};
    use crate::engine::ScanScheduler;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use sitepulse_channels::{ChannelDeliveryQueue, DeliveryPlan};
    use sitepulse_core::config::SchedulerConfig;
    use sitepulse_core::error::SitePulseError;
    use sitepulse_core::traits::Transport;
    use sitepulse_core::types::NotificationEnvelope;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Capture {
        sent: Mutex<Vec<NotificationEnvelope>>,
    }

    #[async_trait]
    impl Transport for Capture {
        fn name(&self) -> &str {
            "capture"
        }

        async fn deliver(&self, _token: &str, envelope: &NotificationEnvelope) -> Result<()> {
            self.sent.lock().unwrap().push(envelope.clone());
            Ok(())
        }
    }

    fn notifier(capture: Arc<Capture>) -> Arc<Notifier> {
        let queue = Arc::new(ChannelDeliveryQueue::new(capture));
        queue.register_channel("c1", "tok").unwrap();
        Arc::new(Notifier::new(queue, DeliveryPlan::single(), "SitePulse"))
    }

    fn due_scheduler(url: &str) -> (ScanScheduler, mpsc::UnboundedReceiver<ScanJob>) {
        let (sched, rx) = ScanScheduler::new(&SchedulerConfig::default());
        sched
            .schedule_at(
                "u1",
                "c1",
                url,
                Interval::new(1, IntervalUnit::Hours),
                Utc::now() - Duration::hours(2),
            )
            .unwrap();
        (sched, rx)
    }

    async fn wait_for(capture: &Capture, n: usize) -> Vec<NotificationEnvelope> {
        for _ in 0..200 {
            if capture.sent.lock().unwrap().len() >= n {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        capture.sent.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_successful_job_sends_nothing() {
        let capture = Arc::new(Capture::default());
        let (sched, rx) = due_scheduler("https://a.com");
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let _exec = spawn_executor(rx, notifier(capture.clone()), move |job| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(format!("scanned {}", job.definition.target_url))
            }
        });

        assert_eq!(sched.due_check(Utc::now()), 1);
        for _ in 0..200 {
            if runs.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(capture.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_job_notifies_channel() {
        let capture = Arc::new(Capture::default());
        let (sched, rx) = due_scheduler("https://a.com");
        let _exec = spawn_executor(rx, notifier(capture.clone()), |_job| async {
            Err::<String, _>(SitePulseError::Fetch("connection refused".into()))
        });

        sched.due_check(Utc::now());
        let sent = wait_for(&capture, 1).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event_name, events::SCAN_ERROR);
        assert_eq!(sent[0].status, DeliveryStatus::Error);
        assert!(sent[0].message.contains("https://a.com/"));
        assert!(sent[0].message.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_panicking_job_is_contained() {
        let capture = Arc::new(Capture::default());
        let (sched, rx) = due_scheduler("https://a.com");
        let exec = spawn_executor(rx, notifier(capture.clone()), |job| async move {
            if job.definition.run_count > 0 {
                panic!("scanner blew up");
            }
            Ok(String::new())
        });

        sched.due_check(Utc::now());
        let sent = wait_for(&capture, 1).await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].message.contains("internal error"));

        // The executor survives and handles the next cycle.
        sched.due_check(Utc::now() + Duration::hours(1));
        let sent = wait_for(&capture, 2).await;
        assert_eq!(sent.len(), 2);
        assert!(!exec.is_finished());
    }

    #[tokio::test]
    async fn test_panic_before_future_is_built_is_contained() {
        let capture = Arc::new(Capture::default());
        let (sched, rx) = due_scheduler("https://a.com");
        let exec = spawn_executor(rx, notifier(capture.clone()), |job: ScanJob| {
            if job.definition.run_count > 0 {
                panic!("callback failed before returning a future");
            }
            async { Ok(String::new()) }
        });

        sched.due_check(Utc::now());
        let sent = wait_for(&capture, 1).await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].message.contains("internal error"));
        assert!(!exec.is_finished());
    }
}
