//! Intent classification: keyword heuristics over lower-cased text.
//!
//! Keyword lists overlap, so the order of checks in [`classify`] decides
//! ties and must not be reshuffled:
//!
//! 0. schedule management, command form only: a recurrence phrase with a
//!    URL, or a message that opens with cancel/stop (or says "stop
//!    monitoring"). Anything looser could drop a schedule by accident.
//! 1. analysis verb + URL → `NewAnalysis`
//! 1b. list/show + schedules → `ListSchedules`
//! 2. with an active report: score → `ReportQuestion`, fix → `FixSuggestion`,
//!    link/404/error → `BrokenLinkHelp`
//! 3. tech/framework → `TechAdvice`
//! 4. seo/ranking/traffic → `GeneralSeo`
//! 5. `Unsupported`

use regex::Regex;
use serde::Serialize;
use sitepulse_scheduler::Interval;
use sitepulse_scheduler::interval::parse_recurrence;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelTarget {
    Url(String),
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    ScheduleScan { url: String, interval: Interval },
    CancelSchedule { target: CancelTarget },
    ListSchedules,
    NewAnalysis { url: String },
    ReportQuestion,
    FixSuggestion,
    BrokenLinkHelp,
    TechAdvice,
    GeneralSeo,
    Unsupported,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::ScheduleScan { .. } => "schedule_scan",
            Intent::CancelSchedule { .. } => "cancel_schedule",
            Intent::ListSchedules => "list_schedules",
            Intent::NewAnalysis { .. } => "new_analysis",
            Intent::ReportQuestion => "report_question",
            Intent::FixSuggestion => "fix_suggestion",
            Intent::BrokenLinkHelp => "broken_link_help",
            Intent::TechAdvice => "tech_advice",
            Intent::GeneralSeo => "general_seo",
            Intent::Unsupported => "unsupported",
        }
    }

    /// Intents that only make sense with an active report.
    pub fn needs_report(&self) -> bool {
        matches!(
            self,
            Intent::ReportQuestion | Intent::FixSuggestion | Intent::BrokenLinkHelp
        )
    }
}

/// Word-start keyword matcher: `link` also matches "links".
fn keywords(words: &[&str]) -> Option<Regex> {
    let alternation = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{alternation})")).ok()
}

static URL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)https?://\S+").ok());

static ANALYSIS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    keywords(&["analyze", "analyse", "analysis", "scan", "check", "audit", "inspect", "review", "crawl"])
});
static CANCEL_COMMAND: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:please\s+)?(?:cancel|stop|unschedule|unsubscribe)\b|\b(?:stop|cancel|end)\s+(?:monitoring|scanning|checking|watching|the\s+schedule|my\s+schedule|scheduled)",
    )
    .ok()
});
static LIST: LazyLock<Option<Regex>> = LazyLock::new(|| keywords(&["list", "show"]));
static SCHEDULE_WORD: LazyLock<Option<Regex>> =
    LazyLock::new(|| keywords(&["schedul", "monitors", "recurring"]));
static ALL_WORD: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\ball\b").ok());
static REPORT: LazyLock<Option<Regex>> =
    LazyLock::new(|| keywords(&["score", "rating", "rated", "grade", "result", "report"]));
static FIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| keywords(&["fix", "improv", "broken", "repair", "optimi", "better"]));
static LINKS: LazyLock<Option<Regex>> =
    LazyLock::new(|| keywords(&["link", "404", "error", "redirect", "dead"]));
static TECH: LazyLock<Option<Regex>> = LazyLock::new(|| {
    keywords(&[
        "tech", "framework", "react", "vue", "angular", "svelte", "next.js", "nextjs",
        "wordpress", "shopify", "javascript", "cms", "hosting", "stack",
    ])
});
static SEO: LazyLock<Option<Regex>> = LazyLock::new(|| {
    keywords(&["seo", "rank", "traffic", "keyword", "search engine", "google", "backlink", "serp", "visib"])
});

fn hit(re: &LazyLock<Option<Regex>>, text: &str) -> bool {
    re.as_ref().is_some_and(|r| r.is_match(text))
}

/// First `http(s)://` token, trailing punctuation trimmed.
pub fn extract_url(text: &str) -> Option<String> {
    let m = URL_RE.as_ref()?.find(text)?;
    let url = m
        .as_str()
        .trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']', '}', '"', '\'', '>']);
    url.split_once("://")
        .is_some_and(|(_, rest)| !rest.is_empty())
        .then(|| url.to_string())
}

pub fn classify(text: &str, has_active_report: bool) -> Intent {
    let lower = text.to_lowercase();
    let url = extract_url(text);

    // 0. schedule management
    if let Some(url) = &url {
        if let Some(interval) = parse_recurrence(&lower) {
            return Intent::ScheduleScan { url: url.clone(), interval };
        }
    }
    if hit(&CANCEL_COMMAND, &lower) {
        if let Some(url) = &url {
            return Intent::CancelSchedule { target: CancelTarget::Url(url.clone()) };
        }
        if hit(&ALL_WORD, &lower) {
            return Intent::CancelSchedule { target: CancelTarget::All };
        }
    }

    // 1. new analysis
    if let Some(url) = url {
        if hit(&ANALYSIS, &lower) {
            return Intent::NewAnalysis { url };
        }
    }
    if hit(&LIST, &lower) && hit(&SCHEDULE_WORD, &lower) {
        return Intent::ListSchedules;
    }

    // 2. report-scoped
    if has_active_report {
        if hit(&REPORT, &lower) {
            return Intent::ReportQuestion;
        }
        if hit(&FIX, &lower) {
            return Intent::FixSuggestion;
        }
        if hit(&LINKS, &lower) {
            return Intent::BrokenLinkHelp;
        }
    }

    // 3.–5.
    if hit(&TECH, &lower) {
        Intent::TechAdvice
    } else if hit(&SEO, &lower) {
        Intent::GeneralSeo
    } else {
        Intent::Unsupported
    }
}
