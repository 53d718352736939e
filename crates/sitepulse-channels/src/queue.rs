//! Channel delivery queue: one FIFO and one worker task per channel.
//!
//! `enqueue_send` never waits for delivery: it validates, appends the send to
//! the channel's queue and hands back a [`DeliveryHandle`]. The channel's
//! worker drains its queue one send at a time, so messages for a channel
//! arrive in the order they were enqueued while unrelated channels proceed
//! in parallel.

use dashmap::DashMap;
use sitepulse_core::error::{Result, SitePulseError};
use sitepulse_core::traits::Transport;
use sitepulse_core::types::NotificationEnvelope;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

use crate::plan::{DeliveryPlan, DeliveryReceipt};

/// A send waiting in a channel's queue.
struct SendJob {
    token: String,
    envelope: NotificationEnvelope,
    plan: DeliveryPlan,
    reply: oneshot::Sender<Result<DeliveryReceipt>>,
}

/// Per-channel state: the delivery token and the worker's inbox.
struct ChannelSlot {
    token: String,
    /// Created on the first send.
    inbox: Option<mpsc::UnboundedSender<SendJob>>,
}

/// Eventual outcome of one enqueued send.
pub struct DeliveryHandle {
    channel_id: String,
    rx: oneshot::Receiver<Result<DeliveryReceipt>>,
}

impl DeliveryHandle {
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }
}

impl Future for DeliveryHandle {
    type Output = Result<DeliveryReceipt>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let channel_id = self.channel_id.clone();
        Pin::new(&mut self.rx).poll(cx).map(|res| {
            res.unwrap_or_else(|_| {
                Err(SitePulseError::Delivery(format!(
                    "delivery worker for channel {channel_id} stopped before reporting"
                )))
            })
        })
    }
}

/// Per-channel serialized delivery.
pub struct ChannelDeliveryQueue {
    transport: Arc<dyn Transport>,
    channels: DashMap<String, ChannelSlot>,
}

impl ChannelDeliveryQueue {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            channels: DashMap::new(),
        }
    }

    /// Register (or re-register) a channel. Last write wins; a running worker
    /// picks up the new token on the next send.
    pub fn register_channel(&self, channel_id: &str, token: &str) -> Result<()> {
        let channel_id = validate_channel_id(channel_id)?;
        let token = token.trim();
        if token.is_empty() {
            return Err(SitePulseError::Validation(format!(
                "Empty delivery token for channel {channel_id}"
            )));
        }
        self.channels
            .entry(channel_id.to_string())
            .and_modify(|slot| slot.token = token.to_string())
            .or_insert_with(|| ChannelSlot {
                token: token.to_string(),
                inbox: None,
            });
        tracing::info!("📡 Channel registered: {channel_id}");
        Ok(())
    }

    pub fn is_registered(&self, channel_id: &str) -> bool {
        self.channels.contains_key(channel_id.trim())
    }

    /// Current delivery token of a channel.
    pub fn token(&self, channel_id: &str) -> Option<String> {
        self.channels.get(channel_id.trim()).map(|slot| slot.token.clone())
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Append a single-attempt send to the channel's queue.
    pub fn enqueue_send(&self, channel_id: &str, envelope: NotificationEnvelope) -> Result<DeliveryHandle> {
        self.enqueue_send_with(channel_id, envelope, DeliveryPlan::single())
    }

    /// Append a send executed under `plan` (retries and fallback run inside the
    /// channel's slot, ahead of anything enqueued later).
    pub fn enqueue_send_with(
        &self,
        channel_id: &str,
        envelope: NotificationEnvelope,
        plan: DeliveryPlan,
    ) -> Result<DeliveryHandle> {
        let channel_id = validate_channel_id(channel_id)?;
        let mut slot = self
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| SitePulseError::ChannelNotRegistered(channel_id.to_string()))?;

        let (reply, rx) = oneshot::channel();
        let job = SendJob {
            token: slot.token.clone(),
            envelope,
            plan,
            reply,
        };

        // Reuse the worker if it is alive; otherwise start one.
        let pending = match &slot.inbox {
            Some(inbox) => inbox.send(job).err().map(|e| e.0),
            None => Some(job),
        };
        if let Some(job) = pending {
            let (inbox, jobs) = mpsc::unbounded_channel();
            // The receiver is alive right here, so this cannot fail.
            let _ = inbox.send(job);
            tokio::spawn(run_worker(
                channel_id.to_string(),
                jobs,
                Arc::clone(&self.transport),
            ));
            slot.inbox = Some(inbox);
        }

        Ok(DeliveryHandle {
            channel_id: channel_id.to_string(),
            rx,
        })
    }
}

fn validate_channel_id(channel_id: &str) -> Result<&str> {
    let trimmed = channel_id.trim();
    if trimmed.is_empty() {
        return Err(SitePulseError::Validation("Channel id must not be blank".into()));
    }
    Ok(trimmed)
}

/// Drain one channel's queue, one send at a time.
async fn run_worker(
    channel_id: String,
    mut jobs: mpsc::UnboundedReceiver<SendJob>,
    transport: Arc<dyn Transport>,
) {
    tracing::debug!("📮 Delivery worker started for channel {channel_id}");

    while let Some(job) = jobs.recv().await {
        let outcome = job
            .plan
            .execute(transport.as_ref(), &job.token, &job.envelope)
            .await;

        match &outcome {
            Ok(receipt) => tracing::debug!(
                "📬 Delivered '{}' to {} (attempts: {}, fallback: {})",
                job.envelope.event_name,
                channel_id,
                receipt.attempts,
                receipt.via_fallback
            ),
            Err(e) => tracing::warn!(
                "⚠️ Delivery of '{}' to {} failed: {e}",
                job.envelope.event_name,
                channel_id
            ),
        }

        // The caller may have dropped its handle; the outcome is already logged.
        let _ = job.reply.send(outcome);
    }

    tracing::debug!("📪 Delivery worker stopped for channel {channel_id}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sitepulse_core::types::DeliveryStatus;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records (token, message) pairs; sleeps longer for earlier messages so
    /// any lack of serialization shows up as reordering.
    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<(String, String)>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn deliver(&self, token: &str, envelope: &NotificationEnvelope) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = 25u64.saturating_sub(n as u64 * 5);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.sent
                .lock()
                .unwrap()
                .push((token.to_string(), envelope.message.clone()));
            Ok(())
        }
    }

    /// Blocks deliveries for the "held" token until released.
    struct Gate {
        release: tokio::sync::Notify,
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for Gate {
        fn name(&self) -> &str {
            "gate"
        }

        async fn deliver(&self, token: &str, envelope: &NotificationEnvelope) -> Result<()> {
            if token == "held" {
                self.release.notified().await;
            }
            self.delivered.lock().unwrap().push(envelope.channel_id.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Transport for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn deliver(&self, _token: &str, _envelope: &NotificationEnvelope) -> Result<()> {
            Err(SitePulseError::Delivery("Webhook error 503".into()))
        }
    }

    fn msg(channel: &str, text: &str) -> NotificationEnvelope {
        NotificationEnvelope::new("test", "SitePulse", channel, DeliveryStatus::Success, text)
    }

    #[tokio::test]
    async fn test_same_channel_delivers_in_call_order() {
        let transport = Arc::new(Recording::default());
        let queue = ChannelDeliveryQueue::new(transport.clone());
        queue.register_channel("c1", "tok").unwrap();

        let handles: Vec<_> = (0..5)
            .map(|i| queue.enqueue_send("c1", msg("c1", &format!("m{i}"))).unwrap())
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let sent: Vec<String> = transport.sent.lock().unwrap().iter().map(|(_, m)| m.clone()).collect();
        assert_eq!(sent, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn test_channels_do_not_block_each_other() {
        let gate = Arc::new(Gate {
            release: tokio::sync::Notify::new(),
            delivered: Mutex::new(Vec::new()),
        });
        let queue = ChannelDeliveryQueue::new(gate.clone());
        queue.register_channel("slow", "held").unwrap();
        queue.register_channel("fast", "open").unwrap();

        let slow = queue.enqueue_send("slow", msg("slow", "first")).unwrap();
        let fast = queue.enqueue_send("fast", msg("fast", "second")).unwrap();

        tokio::time::timeout(Duration::from_secs(2), fast)
            .await
            .expect("fast channel must not wait for slow one")
            .unwrap();
        gate.release.notify_one();
        slow.await.unwrap();

        assert_eq!(*gate.delivered.lock().unwrap(), vec!["fast", "slow"]);
    }

    #[tokio::test]
    async fn test_unregistered_channel_fails_fast() {
        let transport = Arc::new(Recording::default());
        let queue = ChannelDeliveryQueue::new(transport.clone());

        let err = queue.enqueue_send("ghost", msg("ghost", "hi")).err().unwrap();
        assert!(matches!(err, SitePulseError::ChannelNotRegistered(ref c) if c == "ghost"));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(queue.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_channel_rejected() {
        let queue = ChannelDeliveryQueue::new(Arc::new(Recording::default()));
        assert!(matches!(
            queue.enqueue_send("  ", msg("", "hi")),
            Err(SitePulseError::Validation(_))
        ));
        assert!(matches!(
            queue.register_channel("", "tok"),
            Err(SitePulseError::Validation(_))
        ));
        assert!(matches!(
            queue.register_channel("c1", " "),
            Err(SitePulseError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_is_surfaced_on_handle() {
        let queue = ChannelDeliveryQueue::new(Arc::new(Failing));
        queue.register_channel("c1", "tok").unwrap();
        let outcome = queue.enqueue_send("c1", msg("c1", "hi")).unwrap().await;
        assert!(matches!(outcome, Err(SitePulseError::Delivery(m)) if m.contains("503")));

        // The worker keeps serving after a failure.
        let second = queue.enqueue_send("c1", msg("c1", "again")).unwrap().await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_reregistration_last_write_wins() {
        let transport = Arc::new(Recording::default());
        let queue = ChannelDeliveryQueue::new(transport.clone());
        queue.register_channel("c1", "old").unwrap();
        queue.register_channel("c1", "new").unwrap();

        queue.enqueue_send("c1", msg("c1", "hi")).unwrap().await.unwrap();
        assert_eq!(queue.token("c1").as_deref(), Some("new"));
        assert_eq!(transport.sent.lock().unwrap()[0].0, "new");
        assert_eq!(queue.channel_count(), 1);
    }
}
