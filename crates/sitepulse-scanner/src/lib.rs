//! # SitePulse Scanner
//! Drives one inspection of a URL through its stages and reports progress.
//!
//! ## Stages
//! ```text
//! Pending
//!   → MetaExtraction      fetch once, title/description/OG/H1 checks
//!   → LinkCategorization  internal / external / anchors / mailto / tel
//!   → LinkHealthCheck     duplicate tally + concurrent status probes
//!   → Completed
//! any stage ──error──→ Failed (terminal, final error event)
//! ```

pub mod fetch;
pub mod links;
pub mod meta;
pub mod tracker;
pub mod workflow;

pub use fetch::HttpPageFetcher;
pub use links::{LinkCategory, LinkSummary};
pub use meta::MetaReport;
pub use tracker::LinkTracker;
pub use workflow::{ScanReport, ScanState, ScanWorkflow};
