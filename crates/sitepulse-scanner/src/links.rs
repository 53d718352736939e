//! Link categorization stage.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use sitepulse_core::types::{PageLink, ParsedPage};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkCategory {
    Internal,
    External,
    /// `#fragment` on the same page.
    Anchor,
    Mail,
    Phone,
    Script,
    Other,
}

impl LinkCategory {
    pub fn classify(href: &str, page_host: Option<&str>) -> Self {
        let lower = href.trim().to_lowercase();
        if lower.starts_with('#') {
            return LinkCategory::Anchor;
        }
        if lower.starts_with("mailto:") {
            return LinkCategory::Mail;
        }
        if lower.starts_with("tel:") {
            return LinkCategory::Phone;
        }
        if lower.starts_with("javascript:") {
            return LinkCategory::Script;
        }
        match Url::parse(href) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                let same_host = match (url.host_str(), page_host) {
                    (Some(h), Some(page)) => strip_www(h).eq_ignore_ascii_case(strip_www(page)),
                    _ => false,
                };
                if same_host {
                    LinkCategory::Internal
                } else {
                    LinkCategory::External
                }
            }
            _ => LinkCategory::Other,
        }
    }

    /// Whether links of this category can be probed over HTTP.
    pub fn is_http(&self) -> bool {
        matches!(self, LinkCategory::Internal | LinkCategory::External)
    }
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkSummary {
    pub url: String,
    pub total: usize,
    pub internal: Vec<String>,
    pub external: Vec<String>,
    pub anchors: usize,
    pub mail: usize,
    pub phone: usize,
    pub script: usize,
    pub other: usize,
    pub nofollow: usize,
    pub empty_text: usize,
}

impl LinkSummary {
    pub fn categorize(page: &ParsedPage) -> Self {
        let page_host = Url::parse(&page.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        let mut summary = LinkSummary {
            url: page.url.clone(),
            total: page.links.len(),
            ..Default::default()
        };

        for link in &page.links {
            match LinkCategory::classify(&link.href, page_host.as_deref()) {
                LinkCategory::Internal => summary.internal.push(link.href.clone()),
                LinkCategory::External => summary.external.push(link.href.clone()),
                LinkCategory::Anchor => summary.anchors += 1,
                LinkCategory::Mail => summary.mail += 1,
                LinkCategory::Phone => summary.phone += 1,
                LinkCategory::Script => summary.script += 1,
                LinkCategory::Other => summary.other += 1,
            }
            if link.is_nofollow() {
                summary.nofollow += 1;
            }
            if link.text.trim().is_empty() {
                summary.empty_text += 1;
            }
        }
        summary
    }

    /// Unique http(s) links in first-seen order.
    pub fn http_links(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.internal
            .iter()
            .chain(self.external.iter())
            .filter(|l| seen.insert(l.as_str()))
            .cloned()
            .collect()
    }

    pub fn format(&self) -> String {
        let unique_internal = unique_count(&self.internal);
        let unique_external = unique_count(&self.external);
        let mut out = format!("🧭 Links on {}\n\n", self.url);
        out.push_str(&format!("Total links: {}\n", self.total));
        out.push_str(&format!(
            "Internal: {} ({} unique)\n",
            self.internal.len(),
            unique_internal
        ));
        out.push_str(&format!(
            "External: {} ({} unique)\n",
            self.external.len(),
            unique_external
        ));
        out.push_str(&format!(
            "Anchors: {} · Email: {} · Phone: {} · Script: {} · Other: {}\n",
            self.anchors, self.mail, self.phone, self.script, self.other
        ));
        out.push_str(&format!("Nofollow: {}\n", self.nofollow));
        if self.empty_text > 0 {
            out.push_str(&format!("⚠️ {} link(s) without anchor text", self.empty_text));
        } else {
            out.push_str("✅ All links have anchor text");
        }
        out
    }
}

fn unique_count(links: &[String]) -> usize {
    links.iter().collect::<std::collections::HashSet<_>>().len()
}

/// Occurrence count of every href that appears more than once.
pub fn repeated_hrefs(links: &[PageLink]) -> Vec<(String, u32)> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for link in links {
        *counts.entry(link.href.as_str()).or_insert(0) += 1;
    }
    let mut repeated: Vec<(String, u32)> = counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(href, n)| (href.to_string(), n))
        .collect();
    repeated.sort();
    repeated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(href: &str, text: &str) -> PageLink {
        PageLink {
            href: href.into(),
            text: text.into(),
            rel: None,
        }
    }

    #[test]
    fn test_classify() {
        let host = Some("example.com");
        assert_eq!(LinkCategory::classify("https://example.com/a", host), LinkCategory::Internal);
        assert_eq!(LinkCategory::classify("https://www.example.com/a", host), LinkCategory::Internal);
        assert_eq!(LinkCategory::classify("https://other.org/", host), LinkCategory::External);
        assert_eq!(LinkCategory::classify("#top", host), LinkCategory::Anchor);
        assert_eq!(LinkCategory::classify("mailto:a@b.c", host), LinkCategory::Mail);
        assert_eq!(LinkCategory::classify("tel:+123", host), LinkCategory::Phone);
        assert_eq!(LinkCategory::classify("javascript:void(0)", host), LinkCategory::Script);
        assert_eq!(LinkCategory::classify("ftp://files.example.com", host), LinkCategory::Other);
    }

    #[test]
    fn test_categorize_page() {
        let page = ParsedPage {
            url: "https://example.com/".into(),
            status: 200,
            links: vec![
                link("https://example.com/about", "About"),
                link("https://example.com/about", "About us"),
                link("https://github.com/x", ""),
                link("#main", "Skip"),
                PageLink {
                    href: "https://ads.net/".into(),
                    text: "Ad".into(),
                    rel: Some("nofollow sponsored".into()),
                },
            ],
            ..Default::default()
        };
        let summary = LinkSummary::categorize(&page);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.internal.len(), 2);
        assert_eq!(summary.external.len(), 2);
        assert_eq!(summary.anchors, 1);
        assert_eq!(summary.nofollow, 1);
        assert_eq!(summary.empty_text, 1);
        assert_eq!(
            summary.http_links(),
            vec!["https://example.com/about", "https://github.com/x", "https://ads.net/"]
        );
        let text = summary.format();
        assert!(text.contains("Internal: 2 (1 unique)"));
        assert!(text.contains("1 link(s) without anchor text"));
    }

    #[test]
    fn test_repeated_hrefs() {
        let links = vec![
            link("https://a.com/x", "x"),
            link("https://a.com/y", "y"),
            link("https://a.com/x", "x again"),
            link("https://a.com/x", "x third"),
        ];
        assert_eq!(repeated_hrefs(&links), vec![("https://a.com/x".to_string(), 3)]);
    }
}
