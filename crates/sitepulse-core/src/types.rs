//! Shared data model: progress events, notification envelopes, parsed pages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome flag carried by every message sent to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Success,
    Error,
}

/// Progress of one scan, pushed to the channel the scan reports to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanProgressEvent {
    pub scan_id: String,
    pub channel_id: String,
    /// 0–100.
    pub percent: u8,
    pub message: String,
    pub status: DeliveryStatus,
}

impl ScanProgressEvent {
    pub fn progress(scan_id: &str, channel_id: &str, percent: u8, message: impl Into<String>) -> Self {
        Self {
            scan_id: scan_id.to_string(),
            channel_id: channel_id.to_string(),
            percent: percent.min(100),
            message: message.into(),
            status: DeliveryStatus::Success,
        }
    }

    pub fn failure(scan_id: &str, channel_id: &str, message: impl Into<String>) -> Self {
        Self {
            scan_id: scan_id.to_string(),
            channel_id: channel_id.to_string(),
            percent: 100,
            message: message.into(),
            status: DeliveryStatus::Error,
        }
    }

    /// Text as shown on the channel, e.g. `[42%] Checking links...`.
    pub fn render(&self) -> String {
        format!("[{}%] {}", self.percent, self.message)
    }
}

/// Optional action button attached to a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub url: String,
}

/// The JSON body posted to a channel webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    pub event_name: String,
    pub username: String,
    pub status: DeliveryStatus,
    pub channel_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<Button>>,
}

impl NotificationEnvelope {
    pub fn new(
        event_name: &str,
        username: &str,
        channel_id: &str,
        status: DeliveryStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event_name: event_name.to_string(),
            username: username.to_string(),
            status,
            channel_id: channel_id.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
            buttons: None,
        }
    }

    pub fn with_buttons(mut self, buttons: Vec<Button>) -> Self {
        self.buttons = if buttons.is_empty() { None } else { Some(buttons) };
        self
    }
}

/// A heading (`h1`..`h6`) found on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

/// An `<a href>` found on a page. `href` is already resolved against the page URL
/// when it was relative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLink {
    pub href: String,
    pub text: String,
    #[serde(default)]
    pub rel: Option<String>,
}

impl PageLink {
    pub fn is_nofollow(&self) -> bool {
        self.rel
            .as_deref()
            .is_some_and(|r| r.split_whitespace().any(|t| t.eq_ignore_ascii_case("nofollow")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageImage {
    pub src: String,
    pub alt: Option<String>,
}

/// Everything the fetch collaborator extracted from one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedPage {
    /// URL after redirects.
    pub url: String,
    pub status: u16,
    pub title: Option<String>,
    /// `<meta name|property=... content=...>` keyed by lower-cased name.
    pub meta: BTreeMap<String, String>,
    pub canonical: Option<String>,
    pub headings: Vec<Heading>,
    pub links: Vec<PageLink>,
    pub images: Vec<PageImage>,
}

impl ParsedPage {
    pub fn meta(&self, name: &str) -> Option<&str> {
        self.meta.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn headings_at(&self, level: u8) -> impl Iterator<Item = &Heading> {
        self.headings.iter().filter(move |h| h.level == level)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One line of conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatEntry {
    pub fn user(content: &str) -> Self {
        Self {
            role: ChatRole::User,
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// What kind of prose the advisor is asked to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryTopic {
    AnalysisSummary,
    ReportQuestion,
    FixSuggestion,
    BrokenLinkHelp,
    TechAdvice,
    GeneralSeo,
}

impl AdvisoryTopic {
    /// Noun phrase used in "Sorry, I couldn't generate ..." replies.
    pub fn describe(&self) -> &'static str {
        match self {
            AdvisoryTopic::AnalysisSummary => "an analysis summary",
            AdvisoryTopic::ReportQuestion => "an answer about your report",
            AdvisoryTopic::FixSuggestion => "fix suggestions",
            AdvisoryTopic::BrokenLinkHelp => "broken link help",
            AdvisoryTopic::TechAdvice => "technical advice",
            AdvisoryTopic::GeneralSeo => "SEO advice",
        }
    }
}

/// Input to the advisory collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryRequest {
    pub topic: AdvisoryTopic,
    pub question: String,
    /// Structured findings rendered as text (the last report), if any.
    pub findings: Option<String>,
    pub history: Vec<ChatEntry>,
}
