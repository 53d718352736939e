//! Scan workflow: one inspection of one URL, stage by stage.
//!
//! Every stage announces itself (10%), does its work, announces completion
//! (100%), pushes a formatted report and pauses before the next stage so the
//! channel is not flooded. The first error moves the scan to `Failed`, emits a
//! final error event and ends the scan; nothing is retried.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use sitepulse_channels::Notifier;
use sitepulse_core::config::WorkflowConfig;
use sitepulse_core::error::{Result, SitePulseError};
use sitepulse_core::traits::PageFetcher;
use sitepulse_core::types::{ParsedPage, ScanProgressEvent};
use sitepulse_core::validate;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::links::{LinkSummary, repeated_hrefs};
use crate::meta::MetaReport;
use crate::tracker::LinkTracker;

/// Lifecycle of one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ScanState {
    Pending,
    MetaExtraction,
    LinkCategorization,
    LinkHealthCheck,
    Completed,
    Failed(String),
}

impl ScanState {
    pub fn name(&self) -> &'static str {
        match self {
            ScanState::Pending => "pending",
            ScanState::MetaExtraction => "meta_extraction",
            ScanState::LinkCategorization => "link_categorization",
            ScanState::LinkHealthCheck => "link_health_check",
            ScanState::Completed => "completed",
            ScanState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanState::Completed | ScanState::Failed(_))
    }

    fn successor(&self) -> Option<ScanState> {
        match self {
            ScanState::Pending => Some(ScanState::MetaExtraction),
            ScanState::MetaExtraction => Some(ScanState::LinkCategorization),
            ScanState::LinkCategorization => Some(ScanState::LinkHealthCheck),
            ScanState::LinkHealthCheck => Some(ScanState::Completed),
            ScanState::Completed | ScanState::Failed(_) => None,
        }
    }

    /// Stages only move forward one step; `Failed` is reachable from any
    /// non-terminal state.
    pub fn can_transition(&self, to: &ScanState) -> bool {
        match to {
            ScanState::Failed(_) => !self.is_terminal(),
            _ => self.successor().as_ref() == Some(to),
        }
    }
}

/// Findings of a completed scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub scan_id: String,
    pub url: String,
    pub meta: MetaReport,
    pub links: LinkSummary,
    pub broken: Vec<String>,
    pub duplicates: Vec<(String, u32)>,
    pub link_report: String,
    pub completed_at: DateTime<Utc>,
}

impl ScanReport {
    /// All stage reports in one text, as handed to the advisor.
    pub fn findings_text(&self) -> String {
        format!(
            "{}\n\n{}\n\n{}",
            self.meta.format(),
            self.links.format(),
            self.link_report
        )
    }
}

/// Mutable state of one run; lives only inside `ScanWorkflow::run`.
struct ScanRun {
    scan_id: String,
    channel_id: String,
    url: String,
    state: ScanState,
}

impl ScanRun {
    fn advance(&mut self, next: ScanState) -> Result<()> {
        if !self.state.can_transition(&next) {
            return Err(SitePulseError::Workflow {
                stage: self.state.name().to_string(),
                message: format!("illegal transition to {}", next.name()),
            });
        }
        tracing::debug!(
            "🔀 Scan {} {} → {}",
            self.scan_id,
            self.state.name(),
            next.name()
        );
        self.state = next;
        Ok(())
    }
}

pub struct ScanWorkflow {
    fetcher: Arc<dyn PageFetcher>,
    tracker: Arc<LinkTracker>,
    notifier: Arc<Notifier>,
    config: WorkflowConfig,
}

impl ScanWorkflow {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        tracker: Arc<LinkTracker>,
        notifier: Arc<Notifier>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            fetcher,
            tracker,
            notifier,
            config,
        }
    }

    pub fn tracker(&self) -> &Arc<LinkTracker> {
        &self.tracker
    }

    /// Run a scan of `target_url` with a fresh scan id, reporting to `channel_id`.
    pub async fn run(&self, target_url: &str, channel_id: &str) -> Result<ScanReport> {
        let scan_id = uuid::Uuid::new_v4().to_string();
        self.run_with_id(target_url, &scan_id, channel_id).await
    }

    pub async fn run_with_id(
        &self,
        target_url: &str,
        scan_id: &str,
        channel_id: &str,
    ) -> Result<ScanReport> {
        let url = validate::target_url(target_url)?;
        let channel_id = validate::identifier("channel id", channel_id)?;

        let mut run = ScanRun {
            scan_id: scan_id.to_string(),
            channel_id: channel_id.to_string(),
            url,
            state: ScanState::Pending,
        };
        tracing::info!("🚀 Scan {} started for {} (channel {})", run.scan_id, run.url, run.channel_id);

        let outcome = self.drive(&mut run).await;
        self.tracker.clear(&run.scan_id);

        match outcome {
            Ok(report) => {
                run.advance(ScanState::Completed)?;
                tracing::info!(
                    "🏁 Scan {} completed for {} ({} broken, {} duplicated)",
                    run.scan_id,
                    run.url,
                    report.broken.len(),
                    report.duplicates.len()
                );
                Ok(report)
            }
            Err(e) => {
                let stage = run.state.name().to_string();
                let message = e.user_message();
                run.advance(ScanState::Failed(message.clone()))?;
                tracing::error!("❌ Scan {} of {} failed during {stage}: {message}", run.scan_id, run.url);
                self.notifier.progress_detached(&ScanProgressEvent::failure(
                    &run.scan_id,
                    &run.channel_id,
                    format!("❌ Scan of {} failed during {stage}: {message}", run.url),
                ));
                Err(SitePulseError::Workflow { stage, message })
            }
        }
    }

    async fn drive(&self, run: &mut ScanRun) -> Result<ScanReport> {
        // Stage 1: fetch once, extract metadata.
        run.advance(ScanState::MetaExtraction)?;
        self.emit(run, 10, format!("🔍 Fetching {} and extracting metadata...", run.url));
        let page = self
            .bounded(
                Duration::from_secs(self.config.fetch_timeout_secs),
                "fetch",
                self.fetch_page(&run.url),
            )
            .await?;
        let meta = MetaReport::analyze(&page);
        self.emit(run, 100, "✅ Metadata extraction complete");
        self.notifier.report_detached(&run.channel_id, &run.url, &meta.format());
        self.pause().await;

        // Stage 2: categorize links.
        run.advance(ScanState::LinkCategorization)?;
        self.emit(run, 10, format!("🧭 Categorizing {} links...", page.links.len()));
        let links = LinkSummary::categorize(&page);
        self.emit(run, 100, "✅ Link categorization complete");
        self.notifier.report_detached(&run.channel_id, &run.url, &links.format());
        self.pause().await;

        // Stage 3: duplicates + health probes.
        run.advance(ScanState::LinkHealthCheck)?;
        let targets: Vec<String> = links
            .http_links()
            .into_iter()
            .take(self.config.max_links_checked)
            .collect();
        self.emit(run, 10, format!("🩺 Checking health of {} links...", targets.len()));
        self.bounded(
            Duration::from_secs(self.config.stage_timeout_secs),
            "link health check",
            self.check_links(&run.scan_id, &page, &links, targets),
        )
        .await?;
        let link_report = self.tracker.generate_report(&run.url, &run.scan_id);
        self.emit(run, 100, "✅ Link health check complete");
        self.notifier.report_detached(&run.channel_id, &run.url, &link_report);

        Ok(ScanReport {
            scan_id: run.scan_id.clone(),
            url: run.url.clone(),
            meta,
            links,
            broken: self.tracker.broken(&run.scan_id),
            duplicates: self.tracker.duplicates(&run.scan_id),
            link_report,
            completed_at: Utc::now(),
        })
    }

    async fn fetch_page(&self, url: &str) -> Result<ParsedPage> {
        let page = self.fetcher.fetch(url).await?;
        if page.status >= 400 {
            return Err(SitePulseError::Fetch(format!("{url} returned HTTP {}", page.status)));
        }
        Ok(page)
    }

    async fn check_links(
        &self,
        scan_id: &str,
        page: &ParsedPage,
        links: &LinkSummary,
        targets: Vec<String>,
    ) -> Result<()> {
        let http: HashSet<&str> = links
            .internal
            .iter()
            .chain(links.external.iter())
            .map(String::as_str)
            .collect();
        for (href, count) in repeated_hrefs(&page.links) {
            if !http.contains(href.as_str()) {
                continue;
            }
            for _ in 0..count {
                self.tracker.log_duplicate(scan_id, &href);
            }
        }

        let fetcher = Arc::clone(&self.fetcher);
        let results: Vec<(String, Result<u16>)> = futures::stream::iter(targets)
            .map(|href| {
                let fetcher = Arc::clone(&fetcher);
                async move {
                    let status = fetcher.probe(&href).await;
                    (href, status)
                }
            })
            .buffered(self.config.link_check_concurrency.max(1))
            .collect()
            .await;

        for (href, status) in results {
            match status {
                Ok(code) if code < 400 => {}
                Ok(code) => {
                    tracing::debug!("🔗 Broken link in scan {scan_id}: {href} (HTTP {code})");
                    self.tracker.log_broken(scan_id, &href);
                }
                Err(e) => {
                    tracing::debug!("🔗 Unreachable link in scan {scan_id}: {href} ({e})");
                    self.tracker.log_broken(scan_id, &href);
                }
            }
        }
        Ok(())
    }

    async fn bounded<T>(
        &self,
        limit: Duration,
        what: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| SitePulseError::Timeout(format!("{what} exceeded {}s", limit.as_secs())))?
    }

    fn emit(&self, run: &ScanRun, percent: u8, message: impl Into<String>) {
        let event = ScanProgressEvent::progress(&run.scan_id, &run.channel_id, percent, message);
        self.notifier.progress_detached(&event);
    }

    async fn pause(&self) {
        if self.config.stage_pause_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.stage_pause_ms)).await;
        }
    }
}
