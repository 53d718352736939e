//! Conversation router: classify, dispatch, remember, mirror.

use chrono::Utc;
use serde::Serialize;
use sitepulse_channels::Notifier;
use sitepulse_channels::notifier::events;
use sitepulse_core::error::{Result, SitePulseError};
use sitepulse_core::traits::Advisor;
use sitepulse_core::types::{AdvisoryRequest, AdvisoryTopic, ChatEntry, DeliveryStatus};
use sitepulse_core::validate;
use sitepulse_scanner::ScanWorkflow;
use sitepulse_scheduler::{Interval, ScanScheduler};
use std::sync::Arc;

use crate::intent::{CancelTarget, Intent, classify};
use crate::session::SessionStore;

const ANALYZE_FIRST: &str = "Please analyze a URL first, for example: \"analyze https://example.com\".";

const HELP: &str = "I can help with website health and SEO. Try:\n\
• \"analyze https://example.com\"\n\
• \"check https://example.com every 6 hours\"\n\
• \"show my schedules\" or \"cancel all\"\n\
• after an analysis: \"why is my score low?\", \"how do I fix this?\", \"what about the 404s?\"";

#[derive(Debug, Clone, Serialize)]
pub struct RouterReply {
    pub intent: Intent,
    pub text: String,
}

pub struct ConversationRouter {
    sessions: Arc<SessionStore>,
    workflow: Arc<ScanWorkflow>,
    scheduler: Arc<ScanScheduler>,
    advisor: Arc<dyn Advisor>,
    notifier: Arc<Notifier>,
}

impl ConversationRouter {
    pub fn new(
        sessions: Arc<SessionStore>,
        workflow: Arc<ScanWorkflow>,
        scheduler: Arc<ScanScheduler>,
        advisor: Arc<dyn Advisor>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            sessions,
            workflow,
            scheduler,
            advisor,
            notifier,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Handle one inbound message. Only input validation fails; everything
    /// else, including scan and advisor failures, becomes reply text.
    pub async fn handle(&self, user_id: &str, channel_id: &str, text: &str) -> Result<RouterReply> {
        let user_id = validate::identifier("user id", user_id)?;
        let channel_id = validate::identifier("channel id", channel_id)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SitePulseError::Validation("message text is empty".into()));
        }

        let now = Utc::now();
        // Decide on the report gate before this message counts as activity.
        let active = self.sessions.has_active_report(user_id, now);
        let intent = classify(text, active);
        tracing::info!("💬 {user_id}: intent {}", intent.name());

        self.sessions.touch(user_id, channel_id, now);
        let history = self.sessions.history(user_id);
        self.sessions.push_history(user_id, ChatEntry::user(text));

        let reply = self.dispatch(&intent, user_id, channel_id, text, history).await;

        self.sessions.push_history(user_id, ChatEntry::assistant(&reply));
        // Best effort; failures are logged by the notifier.
        self.notifier
            .notify_detached(events::CHAT_REPLY, channel_id, DeliveryStatus::Success, reply.clone());

        Ok(RouterReply { intent, text: reply })
    }

    async fn dispatch(
        &self,
        intent: &Intent,
        user_id: &str,
        channel_id: &str,
        text: &str,
        history: Vec<ChatEntry>,
    ) -> String {
        match intent {
            Intent::ScheduleScan { url, interval } => {
                self.schedule(user_id, channel_id, url, *interval)
            }
            Intent::CancelSchedule { target } => self.cancel(user_id, target),
            Intent::ListSchedules => self.list(user_id),
            Intent::NewAnalysis { url } => self.analyze(user_id, channel_id, url, history).await,
            Intent::ReportQuestion => {
                self.advise_on_report(user_id, AdvisoryTopic::ReportQuestion, text, history)
                    .await
            }
            Intent::FixSuggestion => {
                self.advise_on_report(user_id, AdvisoryTopic::FixSuggestion, text, history)
                    .await
            }
            Intent::BrokenLinkHelp => {
                self.advise_on_report(user_id, AdvisoryTopic::BrokenLinkHelp, text, history)
                    .await
            }
            Intent::TechAdvice => self.advise_general(user_id, AdvisoryTopic::TechAdvice, text, history).await,
            Intent::GeneralSeo => self.advise_general(user_id, AdvisoryTopic::GeneralSeo, text, history).await,
            Intent::Unsupported => HELP.to_string(),
        }
    }

    async fn analyze(
        &self,
        user_id: &str,
        channel_id: &str,
        url: &str,
        history: Vec<ChatEntry>,
    ) -> String {
        let report = match self.workflow.run(url, channel_id).await {
            Ok(report) => report,
            // The workflow already sent the error event to the channel.
            Err(e) => return format!("❌ I couldn't analyze {url}: {}", e.user_message()),
        };

        let request = AdvisoryRequest {
            topic: AdvisoryTopic::AnalysisSummary,
            question: format!("Summarize the analysis of {}", report.url),
            findings: Some(report.findings_text()),
            history,
        };
        let summary = match self.advisor.advise(&request).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!("⚠️ Advisor failed to summarize {}: {e}", report.url);
                format!(
                    "✅ Analysis of {} complete (score {}/100, {} broken links). {}",
                    report.url,
                    report.meta.score,
                    report.broken.len(),
                    sorry(AdvisoryTopic::AnalysisSummary)
                )
            }
        };

        let scanned = report.url.clone();
        let stored = summary.clone();
        self.sessions
            .update(user_id, move |s| s.record_analysis(&scanned, report, stored));
        summary
    }

    async fn advise_on_report(
        &self,
        user_id: &str,
        topic: AdvisoryTopic,
        text: &str,
        history: Vec<ChatEntry>,
    ) -> String {
        let findings = self.sessions.get(user_id).and_then(|s| {
            let report = s.last_report?;
            Some(match s.last_analysis {
                Some(analysis) => format!("{report}\n\n{}", analysis.findings_text()),
                None => report,
            })
        });
        let Some(findings) = findings else {
            return ANALYZE_FIRST.to_string();
        };
        self.ask(topic, text, Some(findings), history).await
    }

    async fn advise_general(
        &self,
        user_id: &str,
        topic: AdvisoryTopic,
        text: &str,
        history: Vec<ChatEntry>,
    ) -> String {
        let findings = if self.sessions.has_active_report(user_id, Utc::now()) {
            self.sessions.get(user_id).and_then(|s| s.last_report)
        } else {
            None
        };
        self.ask(topic, text, findings, history).await
    }

    async fn ask(
        &self,
        topic: AdvisoryTopic,
        text: &str,
        findings: Option<String>,
        history: Vec<ChatEntry>,
    ) -> String {
        let request = AdvisoryRequest {
            topic,
            question: text.to_string(),
            findings,
            history,
        };
        match self.advisor.advise(&request).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("⚠️ Advisor '{}' failed ({topic:?}): {e}", self.advisor.name());
                sorry(topic)
            }
        }
    }

    fn schedule(&self, user_id: &str, channel_id: &str, url: &str, interval: Interval) -> String {
        match self
            .scheduler
            .schedule_at(user_id, channel_id, url, interval, Utc::now())
        {
            Ok(def) => format!(
                "📅 Scheduled a scan of {} {}. Reports will arrive on this channel.",
                def.target_url, def.interval
            ),
            Err(e) => format!("❌ Couldn't schedule {url}: {}", e.user_message()),
        }
    }

    fn cancel(&self, user_id: &str, target: &CancelTarget) -> String {
        match target {
            CancelTarget::Url(url) => {
                if self.scheduler.cancel(user_id, url) {
                    format!("🗑️ Stopped scheduled scans of {url}.")
                } else {
                    format!("No scheduled scan of {url} found.")
                }
            }
            CancelTarget::All => match self.scheduler.cancel_all(user_id) {
                0 => "You have no scheduled scans.".to_string(),
                n => format!("🗑️ Cancelled {n} scheduled scan(s)."),
            },
        }
    }

    fn list(&self, user_id: &str) -> String {
        let defs = self.scheduler.list_for_user(user_id);
        if defs.is_empty() {
            return "You have no scheduled scans.".to_string();
        }
        let mut out = String::from("📋 Your scheduled scans:");
        for def in defs {
            out.push_str(&format!(
                "\n• {} {} (next: {})",
                def.target_url,
                def.interval,
                def.next_due().format("%Y-%m-%d %H:%M UTC")
            ));
        }
        out
    }
}

fn sorry(topic: AdvisoryTopic) -> String {
    format!(
        "Sorry, I couldn't generate {} right now. Please try again later.",
        topic.describe()
    )
}
