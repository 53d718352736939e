//! Scan-scoped broken-link and duplicate-link findings.
//!
//! Everything is keyed by scan id, so concurrent scans of the same site keep
//! separate findings. Callers clear a scan's entries when it finishes.

use dashmap::DashMap;
use std::collections::HashMap;

#[derive(Default)]
pub struct LinkTracker {
    broken: DashMap<String, Vec<String>>,
    duplicates: DashMap<String, HashMap<String, u32>>,
}

impl LinkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_broken(&self, scan_id: &str, url: &str) {
        self.broken
            .entry(scan_id.to_string())
            .or_default()
            .push(url.to_string());
    }

    /// Count one more occurrence of `url`.
    pub fn log_duplicate(&self, scan_id: &str, url: &str) {
        *self
            .duplicates
            .entry(scan_id.to_string())
            .or_default()
            .entry(url.to_string())
            .or_insert(0) += 1;
    }

    /// Broken links in the order they were logged.
    pub fn broken(&self, scan_id: &str) -> Vec<String> {
        self.broken
            .get(scan_id)
            .map(|v| v.value().clone())
            .unwrap_or_default()
    }

    /// Duplicate links with their counts, sorted by URL.
    pub fn duplicates(&self, scan_id: &str) -> Vec<(String, u32)> {
        let mut out: Vec<(String, u32)> = self
            .duplicates
            .get(scan_id)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    pub fn clear(&self, scan_id: &str) {
        self.broken.remove(scan_id);
        self.duplicates.remove(scan_id);
    }

    /// Number of scans that currently hold findings.
    pub fn active_scans(&self) -> usize {
        let mut ids: Vec<String> = self.broken.iter().map(|e| e.key().clone()).collect();
        ids.extend(self.duplicates.iter().map(|e| e.key().clone()));
        ids.sort();
        ids.dedup();
        ids.len()
    }

    pub fn generate_report(&self, url: &str, scan_id: &str) -> String {
        let broken = self.broken(scan_id);
        let duplicates = self.duplicates(scan_id);
        let mut out = format!("🔗 Link health report for {url}\n\n");

        out.push_str("Broken links:\n");
        if broken.is_empty() {
            out.push_str("✅ No broken links found\n");
        } else {
            for link in &broken {
                out.push_str(&format!("❌ {link}\n"));
            }
        }

        out.push_str("\nDuplicate links:\n");
        if duplicates.is_empty() {
            out.push_str("✅ No duplicate links found\n");
        } else {
            for (link, count) in &duplicates {
                out.push_str(&format!("🔁 {link} (x{count})\n"));
            }
        }

        out.push_str(&format!(
            "\nTotals: {} broken, {} duplicated",
            broken.len(),
            duplicates.len()
        ));
        out
    }
}
