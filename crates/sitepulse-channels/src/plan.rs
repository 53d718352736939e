//! Delivery plans: how hard a caller wants one message delivered.
//!
//! The queue executes a plan inside the channel's serialized slot, so
//! retries never let a later message overtake an earlier one.
//! Chain: primary transport × (1 + max_retries) with exponential backoff → fallback once.

use rand::Rng;
use sitepulse_core::config::DeliveryConfig;
use sitepulse_core::error::{Result, SitePulseError};
use sitepulse_core::traits::Transport;
use sitepulse_core::types::NotificationEnvelope;
use std::sync::Arc;
use std::time::Duration;

/// Cap for a single backoff sleep.
const MAX_BACKOFF_MS: u64 = 10_000;

/// Retry budget and optional fallback for one send.
#[derive(Clone)]
pub struct DeliveryPlan {
    /// Extra attempts on the primary transport after the first failure.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub fallback: Option<Arc<dyn Transport>>,
}

impl std::fmt::Debug for DeliveryPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryPlan")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("fallback", &self.fallback.as_ref().map(|t| t.name().to_string()))
            .finish()
    }
}

/// What actually happened for a delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub channel_id: String,
    /// Attempts made on the primary transport.
    pub attempts: u32,
    pub via_fallback: bool,
}

impl DeliveryPlan {
    /// Exactly one attempt, no fallback.
    pub fn single() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            fallback: None,
        }
    }

    pub fn with_retries(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn Transport>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Build from config; the fallback transport is supplied by the caller.
    pub fn from_config(config: &DeliveryConfig, fallback: Option<Arc<dyn Transport>>) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            fallback,
        }
    }

    /// Sleep before retry number `retry` (0-based): base × 2^retry plus up to 25% jitter.
    fn backoff(&self, retry: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        if base == 0 {
            return Duration::ZERO;
        }
        let exp = base.saturating_mul(1u64 << retry.min(16)).min(MAX_BACKOFF_MS);
        let jitter = rand::thread_rng().gen_range(0..=exp / 4);
        Duration::from_millis(exp + jitter)
    }

    /// Run the plan against `primary`.
    pub async fn execute(
        &self,
        primary: &dyn Transport,
        token: &str,
        envelope: &NotificationEnvelope,
    ) -> Result<DeliveryReceipt> {
        let mut attempts = 0;
        let mut last_err = None;

        for retry in 0..=self.max_retries {
            if retry > 0 {
                tokio::time::sleep(self.backoff(retry - 1)).await;
            }
            attempts += 1;
            match primary.deliver(token, envelope).await {
                Ok(()) => {
                    return Ok(DeliveryReceipt {
                        channel_id: envelope.channel_id.clone(),
                        attempts,
                        via_fallback: false,
                    });
                }
                Err(e) => {
                    tracing::debug!(
                        "🔁 [{}] attempt {}/{} for channel {} failed: {e}",
                        primary.name(),
                        attempts,
                        self.max_retries + 1,
                        envelope.channel_id
                    );
                    last_err = Some(e);
                }
            }
        }

        let primary_err = last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".into());

        let Some(fallback) = &self.fallback else {
            return Err(SitePulseError::Delivery(format!(
                "{} failed after {attempts} attempt(s): {primary_err}",
                primary.name()
            )));
        };

        tracing::warn!(
            "⚠️ {} exhausted for channel {}; trying fallback '{}'",
            primary.name(),
            envelope.channel_id,
            fallback.name()
        );
        fallback
            .deliver(token, envelope)
            .await
            .map(|()| DeliveryReceipt {
                channel_id: envelope.channel_id.clone(),
                attempts,
                via_fallback: true,
            })
            .map_err(|e| {
                SitePulseError::Delivery(format!(
                    "{} failed after {attempts} attempt(s) ({primary_err}); fallback {} failed: {e}",
                    primary.name(),
                    fallback.name()
                ))
            })
    }
}
