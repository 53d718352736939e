//! Metadata stage: title, description, canonical, robots, Open Graph, headings.

use serde::{Deserialize, Serialize};
use sitepulse_core::types::ParsedPage;

const TITLE_MIN: usize = 30;
const TITLE_MAX: usize = 60;
const DESCRIPTION_MIN: usize = 70;
const DESCRIPTION_MAX: usize = 160;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaReport {
    pub url: String,
    pub status: u16,
    pub title: Option<String>,
    pub description: Option<String>,
    pub canonical: Option<String>,
    pub robots: Option<String>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_image: Option<String>,
    pub has_viewport: bool,
    pub h1: Vec<String>,
    /// Count of h1..h6.
    pub heading_counts: [usize; 6],
    pub images_total: usize,
    pub images_missing_alt: usize,
    pub issues: Vec<String>,
    /// 0–100, starts at 100 and loses points per issue.
    pub score: u8,
}

impl MetaReport {
    pub fn analyze(page: &ParsedPage) -> Self {
        let title = non_empty(page.title.as_deref());
        let description = non_empty(page.meta("description"));
        let robots = non_empty(page.meta("robots"));
        let og_title = non_empty(page.meta("og:title"));
        let og_description = non_empty(page.meta("og:description"));
        let og_image = non_empty(page.meta("og:image"));
        let h1: Vec<String> = page.headings_at(1).map(|h| h.text.clone()).collect();

        let mut heading_counts = [0usize; 6];
        for h in &page.headings {
            if (1..=6).contains(&h.level) {
                heading_counts[(h.level - 1) as usize] += 1;
            }
        }

        let images_missing_alt = page
            .images
            .iter()
            .filter(|img| img.alt.as_deref().is_none_or(|a| a.trim().is_empty()))
            .count();

        let mut issues = Vec::new();
        let mut penalty: u32 = 0;
        let mut flag = |points: u32, issue: String| {
            penalty += points;
            issues.push(issue);
        };

        match &title {
            None => flag(20, "Missing <title>".into()),
            Some(t) => {
                let len = t.chars().count();
                if len < TITLE_MIN {
                    flag(5, format!("Title is short ({len} chars, aim for {TITLE_MIN}-{TITLE_MAX})"));
                } else if len > TITLE_MAX {
                    flag(5, format!("Title is long ({len} chars, aim for {TITLE_MIN}-{TITLE_MAX})"));
                }
            }
        }
        match &description {
            None => flag(15, "Missing meta description".into()),
            Some(d) => {
                let len = d.chars().count();
                if len < DESCRIPTION_MIN {
                    flag(5, format!(
                        "Meta description is short ({len} chars, aim for {DESCRIPTION_MIN}-{DESCRIPTION_MAX})"
                    ));
                } else if len > DESCRIPTION_MAX {
                    flag(5, format!(
                        "Meta description is long ({len} chars, aim for {DESCRIPTION_MIN}-{DESCRIPTION_MAX})"
                    ));
                }
            }
        }
        match h1.len() {
            0 => flag(10, "No <h1> heading".into()),
            1 => {}
            n => flag(5, format!("{n} <h1> headings (use exactly one)")),
        }
        if page.canonical.is_none() {
            flag(5, "No canonical link".into());
        }
        if robots.as_deref().is_some_and(|r| r.to_lowercase().contains("noindex")) {
            flag(20, "Page is marked noindex".into());
        }
        if og_title.is_none() || og_description.is_none() || og_image.is_none() {
            flag(5, "Incomplete Open Graph tags (og:title, og:description, og:image)".into());
        }
        let has_viewport = page.meta("viewport").is_some();
        if !has_viewport {
            flag(10, "No viewport meta tag (mobile rendering)".into());
        }
        if images_missing_alt > 0 {
            flag(
                (images_missing_alt as u32).min(10),
                format!("{images_missing_alt} image(s) without alt text"),
            );
        }

        Self {
            url: page.url.clone(),
            status: page.status,
            title,
            description,
            canonical: page.canonical.clone(),
            robots,
            og_title,
            og_description,
            og_image,
            has_viewport,
            h1,
            heading_counts,
            images_total: page.images.len(),
            images_missing_alt,
            issues,
            score: 100u32.saturating_sub(penalty) as u8,
        }
    }

    pub fn format(&self) -> String {
        let mut out = format!("📄 Metadata for {} (HTTP {})\n\n", self.url, self.status);
        out.push_str(&format!("Title: {}\n", self.title.as_deref().unwrap_or("—")));
        out.push_str(&format!(
            "Description: {}\n",
            self.description.as_deref().unwrap_or("—")
        ));
        out.push_str(&format!(
            "Canonical: {}\n",
            self.canonical.as_deref().unwrap_or("—")
        ));
        if let Some(robots) = &self.robots {
            out.push_str(&format!("Robots: {robots}\n"));
        }
        out.push_str(&format!(
            "Headings: {}\n",
            self.heading_counts
                .iter()
                .enumerate()
                .map(|(i, n)| format!("h{}={n}", i + 1))
                .collect::<Vec<_>>()
                .join(" ")
        ));
        out.push_str(&format!(
            "Images: {} ({} missing alt)\n",
            self.images_total, self.images_missing_alt
        ));
        out.push_str(&format!("\nScore: {}/100\n", self.score));
        if self.issues.is_empty() {
            out.push_str("✅ No metadata issues found");
        } else {
            out.push_str("Issues:");
            for issue in &self.issues {
                out.push_str(&format!("\n⚠️ {issue}"));
            }
        }
        out
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
