//! HTTP page fetcher backed by reqwest, HTML parsed with scraper.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use scraper::{ElementRef, Html, Selector};
use sitepulse_core::config::WorkflowConfig;
use sitepulse_core::error::{Result, SitePulseError};
use sitepulse_core::traits::PageFetcher;
use sitepulse_core::types::{Heading, PageImage, PageLink, ParsedPage};
use std::time::Duration;

pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(config: &WorkflowConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<ParsedPage> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SitePulseError::Fetch(format!("{url}: {e}")))?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| SitePulseError::Fetch(format!("{url}: reading body: {e}")))?;
        tracing::debug!("📥 Fetched {final_url} (HTTP {status}, {} bytes)", body.len());

        // `Html` is not Send, so parsing stays in a sync helper.
        let mut page = parse_html(&final_url, &body)?;
        page.status = status;
        Ok(page)
    }

    async fn probe(&self, url: &str) -> Result<u16> {
        let head = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| SitePulseError::Fetch(format!("{url}: {e}")))?;
        if head.status() != StatusCode::METHOD_NOT_ALLOWED {
            return Ok(head.status().as_u16());
        }
        let get = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SitePulseError::Fetch(format!("{url}: {e}")))?;
        Ok(get.status().as_u16())
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| SitePulseError::Fetch(format!("bad selector '{css}': {e}")))
}

fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse an HTML document into a [`ParsedPage`]. Relative hrefs and image
/// sources are resolved against `url`; `status` is left at 0.
pub fn parse_html(url: &str, html: &str) -> Result<ParsedPage> {
    let base = Url::parse(url).ok();
    let resolve = |raw: &str| -> String {
        let raw = raw.trim();
        if raw.starts_with('#') {
            return raw.to_string();
        }
        base.as_ref()
            .and_then(|b| b.join(raw).ok())
            .map(|u| u.to_string())
            .unwrap_or_else(|| raw.to_string())
    };

    let document = Html::parse_document(html);
    let mut page = ParsedPage {
        url: url.to_string(),
        ..Default::default()
    };

    page.title = document
        .select(&selector("title")?)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty());

    for el in document.select(&selector("meta")?) {
        let attrs = el.value();
        let key = attrs
            .attr("name")
            .or_else(|| attrs.attr("property"))
            .map(|k| k.trim().to_lowercase());
        if let (Some(key), Some(content)) = (key, attrs.attr("content")) {
            page.meta.entry(key).or_insert_with(|| content.trim().to_string());
        }
    }

    page.canonical = document
        .select(&selector("link[rel]")?)
        .find(|el| {
            el.value()
                .attr("rel")
                .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("canonical")))
        })
        .and_then(|el| el.value().attr("href"))
        .map(&resolve);

    for el in document.select(&selector("h1, h2, h3, h4, h5, h6")?) {
        let level = el.value().name()[1..].parse::<u8>().unwrap_or(0);
        page.headings.push(Heading { level, text: text_of(el) });
    }

    for el in document.select(&selector("a[href]")?) {
        let Some(href) = el.value().attr("href") else { continue };
        page.links.push(PageLink {
            href: resolve(href),
            text: text_of(el),
            rel: el.value().attr("rel").map(str::to_string),
        });
    }

    for el in document.select(&selector("img")?) {
        page.images.push(PageImage {
            src: el.value().attr("src").map(&resolve).unwrap_or_default(),
            alt: el.value().attr("alt").map(str::to_string),
        });
    }

    Ok(page)
}
