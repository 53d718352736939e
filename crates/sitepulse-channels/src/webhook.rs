//! Webhook transport: POSTs the JSON envelope to `{base_url}/{token}`.

use async_trait::async_trait;
use sitepulse_core::error::{Result, SitePulseError};
use sitepulse_core::traits::Transport;
use sitepulse_core::types::NotificationEnvelope;
use std::time::Duration;

/// Generic HTTP webhook transport.
pub struct WebhookTransport {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl WebhookTransport {
    /// Create a transport posting under `base_url` with a per-request timeout.
    pub fn new(name: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(SitePulseError::Config(format!(
                "Webhook base URL must be http(s): '{base_url}'"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SitePulseError::Config(format!("Client error: {e}")))?;
        Ok(Self {
            name: name.to_string(),
            base_url,
            client,
        })
    }

    /// Full URL a message for `token` is posted to.
    pub fn endpoint(&self, token: &str) -> String {
        format!("{}/{}", self.base_url, token.trim_matches('/'))
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, token: &str, envelope: &NotificationEnvelope) -> Result<()> {
        let url = self.endpoint(token);
        let resp = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(envelope)
            .send()
            .await
            .map_err(|e| SitePulseError::Delivery(format!("Webhook send failed: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            tracing::debug!(
                "✅ Webhook [{}] delivered '{}' to channel {}",
                self.name,
                envelope.event_name,
                envelope.channel_id
            );
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            let body = if body.chars().count() > 200 {
                format!("{}...", body.chars().take(200).collect::<String>())
            } else {
                body
            };
            Err(SitePulseError::Delivery(format!("Webhook error {status}: {body}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_token() {
        let t = WebhookTransport::new("primary", "https://hooks.example.com/v1/", Duration::from_secs(5))
            .unwrap();
        assert_eq!(t.endpoint("abc123"), "https://hooks.example.com/v1/abc123");
        assert_eq!(t.endpoint("/abc123/"), "https://hooks.example.com/v1/abc123");
        assert_eq!(t.name(), "primary");
    }

    #[test]
    fn test_rejects_non_http_base() {
        let err = WebhookTransport::new("x", "ftp://example.com", Duration::from_secs(5));
        assert!(matches!(err, Err(SitePulseError::Config(_))));
    }
}
