//! Notifier: the caller-side layer over [`ChannelDeliveryQueue`].
//!
//! Builds envelopes, attaches the configured [`DeliveryPlan`] (retry with
//! backoff, then fallback) and offers fire-and-forget sends whose failures
//! are logged instead of dropped.

use sitepulse_core::config::DeliveryConfig;
use sitepulse_core::error::Result;
use sitepulse_core::traits::Transport;
use sitepulse_core::types::{Button, DeliveryStatus, NotificationEnvelope, ScanProgressEvent};
use std::sync::Arc;
use std::time::Duration;

use crate::plan::DeliveryPlan;
use crate::queue::{ChannelDeliveryQueue, DeliveryHandle};
use crate::webhook::WebhookTransport;

/// Event names used on the wire.
pub mod events {
    pub const SCAN_PROGRESS: &str = "scan_progress";
    pub const SCAN_REPORT: &str = "scan_report";
    pub const SCAN_ERROR: &str = "scan_error";
    pub const CHAT_REPLY: &str = "chat_reply";
}

pub struct Notifier {
    queue: Arc<ChannelDeliveryQueue>,
    plan: DeliveryPlan,
    sender_name: String,
}

impl Notifier {
    pub fn new(queue: Arc<ChannelDeliveryQueue>, plan: DeliveryPlan, sender_name: &str) -> Self {
        Self {
            queue,
            plan,
            sender_name: sender_name.to_string(),
        }
    }

    /// Build the queue's plan from config, creating the fallback webhook
    /// transport when one is configured.
    pub fn from_config(queue: Arc<ChannelDeliveryQueue>, config: &DeliveryConfig) -> Result<Self> {
        let fallback = match &config.fallback_base_url {
            Some(url) if !url.trim().is_empty() => {
                let transport: Arc<dyn Transport> = Arc::new(WebhookTransport::new(
                    "fallback-webhook",
                    url,
                    Duration::from_secs(config.timeout_secs),
                )?);
                Some(transport)
            }
            _ => None,
        };
        Ok(Self::new(
            queue,
            DeliveryPlan::from_config(config, fallback),
            &config.sender_name,
        ))
    }

    pub fn queue(&self) -> &Arc<ChannelDeliveryQueue> {
        &self.queue
    }

    pub fn envelope(
        &self,
        event_name: &str,
        channel_id: &str,
        status: DeliveryStatus,
        message: impl Into<String>,
    ) -> NotificationEnvelope {
        NotificationEnvelope::new(event_name, &self.sender_name, channel_id, status, message)
    }

    /// Enqueue a prepared envelope under the configured plan.
    pub fn send(&self, envelope: NotificationEnvelope) -> Result<DeliveryHandle> {
        let channel_id = envelope.channel_id.clone();
        self.queue
            .enqueue_send_with(&channel_id, envelope, self.plan.clone())
    }

    pub fn notify(
        &self,
        event_name: &str,
        channel_id: &str,
        status: DeliveryStatus,
        message: impl Into<String>,
    ) -> Result<DeliveryHandle> {
        self.send(self.envelope(event_name, channel_id, status, message))
    }

    pub fn progress(&self, event: &ScanProgressEvent) -> Result<DeliveryHandle> {
        let name = match event.status {
            DeliveryStatus::Success => events::SCAN_PROGRESS,
            DeliveryStatus::Error => events::SCAN_ERROR,
        };
        self.notify(name, &event.channel_id, event.status, event.render())
    }

    /// Send without waiting; enqueue and delivery failures are logged.
    /// Returns whether the message was accepted by the queue.
    pub fn send_detached(&self, envelope: NotificationEnvelope) -> bool {
        let event_name = envelope.event_name.clone();
        let channel_id = envelope.channel_id.clone();
        match self.send(envelope) {
            Ok(handle) => {
                tokio::spawn(async move {
                    if let Err(e) = handle.await {
                        tracing::warn!("⚠️ '{event_name}' to channel {channel_id} not delivered: {e}");
                    }
                });
                true
            }
            Err(e) => {
                tracing::warn!("⚠️ '{event_name}' to channel {channel_id} not enqueued: {e}");
                false
            }
        }
    }

    pub fn notify_detached(
        &self,
        event_name: &str,
        channel_id: &str,
        status: DeliveryStatus,
        message: impl Into<String>,
    ) -> bool {
        self.send_detached(self.envelope(event_name, channel_id, status, message))
    }

    pub fn progress_detached(&self, event: &ScanProgressEvent) -> bool {
        let name = match event.status {
            DeliveryStatus::Success => events::SCAN_PROGRESS,
            DeliveryStatus::Error => events::SCAN_ERROR,
        };
        self.notify_detached(name, &event.channel_id, event.status, event.render())
    }

    /// Report body with a "open site" button.
    pub fn report_detached(&self, channel_id: &str, url: &str, report: &str) -> bool {
        let envelope = self
            .envelope(events::SCAN_REPORT, channel_id, DeliveryStatus::Success, report)
            .with_buttons(vec![Button {
                label: "Open site".into(),
                url: url.to_string(),
            }]);
        self.send_detached(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sitepulse_core::error::SitePulseError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Capture {
        envelopes: Mutex<Vec<NotificationEnvelope>>,
    }

    #[async_trait]
    impl Transport for Capture {
        fn name(&self) -> &str {
            "capture"
        }

        async fn deliver(&self, _token: &str, envelope: &NotificationEnvelope) -> Result<()> {
            self.envelopes.lock().unwrap().push(envelope.clone());
            Ok(())
        }
    }

    struct FailTwice {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Transport for FailTwice {
        fn name(&self) -> &str {
            "fail-twice"
        }

        async fn deliver(&self, _token: &str, _envelope: &NotificationEnvelope) -> Result<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(SitePulseError::Delivery("flaky".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_progress_envelope_fields() {
        let capture = Arc::new(Capture::default());
        let queue = Arc::new(ChannelDeliveryQueue::new(capture.clone()));
        queue.register_channel("c1", "tok").unwrap();
        let notifier = Notifier::new(queue, DeliveryPlan::single(), "SitePulse");

        let event = ScanProgressEvent::progress("scan-1", "c1", 10, "Extracting metadata");
        notifier.progress(&event).unwrap().await.unwrap();

        let sent = capture.envelopes.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event_name, events::SCAN_PROGRESS);
        assert_eq!(sent[0].username, "SitePulse");
        assert_eq!(sent[0].message, "[10%] Extracting metadata");
        assert_eq!(sent[0].status, DeliveryStatus::Success);
    }

    #[tokio::test]
    async fn test_configured_plan_retries_through_queue() {
        let transport = Arc::new(FailTwice { calls: AtomicU32::new(0) });
        let queue = Arc::new(ChannelDeliveryQueue::new(transport.clone()));
        queue.register_channel("c1", "tok").unwrap();
        let notifier = Notifier::new(
            queue,
            DeliveryPlan::with_retries(3, Duration::from_millis(1)),
            "SitePulse",
        );

        let receipt = notifier
            .notify(events::CHAT_REPLY, "c1", DeliveryStatus::Success, "hello")
            .unwrap()
            .await
            .unwrap();
        assert_eq!(receipt.attempts, 3);
    }

    #[tokio::test]
    async fn test_detached_send_to_unknown_channel_is_not_enqueued() {
        let queue = Arc::new(ChannelDeliveryQueue::new(Arc::new(Capture::default())));
        let notifier = Notifier::new(queue, DeliveryPlan::single(), "SitePulse");
        assert!(!notifier.notify_detached(events::CHAT_REPLY, "nobody", DeliveryStatus::Success, "x"));
    }

    #[tokio::test]
    async fn test_report_carries_button() {
        let capture = Arc::new(Capture::default());
        let queue = Arc::new(ChannelDeliveryQueue::new(capture.clone()));
        queue.register_channel("c1", "tok").unwrap();
        let notifier = Notifier::new(queue, DeliveryPlan::single(), "SitePulse");

        assert!(notifier.report_detached("c1", "https://a.com", "all good"));
        // A follow-up awaited send on the same channel lands after the report.
        notifier
            .notify(events::CHAT_REPLY, "c1", DeliveryStatus::Success, "done")
            .unwrap()
            .await
            .unwrap();

        let sent = capture.envelopes.lock().unwrap();
        assert_eq!(sent[0].event_name, events::SCAN_REPORT);
        let buttons = sent[0].buttons.as_ref().unwrap();
        assert_eq!(buttons[0].url, "https://a.com");
        assert_eq!(sent[1].message, "done");
    }

    #[test]
    fn test_from_config_builds_fallback() {
        let queue = Arc::new(ChannelDeliveryQueue::new(Arc::new(Capture::default())));
        let config = DeliveryConfig {
            fallback_base_url: Some("https://backup.example.com".into()),
            ..DeliveryConfig::default()
        };
        let notifier = Notifier::from_config(queue, &config).unwrap();
        assert!(notifier.plan.fallback.is_some());
        assert_eq!(notifier.plan.max_retries, 3);
    }
}
