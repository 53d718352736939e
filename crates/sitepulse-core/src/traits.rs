//! Collaborator seams. Each has one production implementation elsewhere in the
//! workspace and in-memory fakes in tests.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AdvisoryRequest, NotificationEnvelope, ParsedPage};

/// Fetches a document and extracts its structure.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch and parse `url`. Any failure is terminal for the scan that asked.
    async fn fetch(&self, url: &str) -> Result<ParsedPage>;

    /// Return the HTTP status of `url` without extracting anything.
    async fn probe(&self, url: &str) -> Result<u16>;
}

/// Turns structured findings and a question into prose.
#[async_trait]
pub trait Advisor: Send + Sync {
    fn name(&self) -> &str;

    async fn advise(&self, request: &AdvisoryRequest) -> Result<String>;
}

/// One outbound call to a notification endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver `envelope` using the channel's `token`. `Ok` only for a 2xx.
    async fn deliver(&self, token: &str, envelope: &NotificationEnvelope) -> Result<()>;
}
