//! OpenAI-compatible advisor.
//!
//! Works with any endpoint exposing `POST {endpoint}/chat/completions`.

use async_trait::async_trait;
use serde_json::{Value, json};
use sitepulse_core::config::AdvisorConfig;
use sitepulse_core::error::{Result, SitePulseError};
use sitepulse_core::traits::Advisor;
use sitepulse_core::types::{AdvisoryRequest, AdvisoryTopic, ChatRole};
use std::time::Duration;

const BASE_PROMPT: &str = "You are SitePulse, a concise website health and SEO assistant. \
Answer in plain text suitable for a chat message. Be specific and practical.";

pub struct OpenAiAdvisor {
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiAdvisor {
    /// API key resolution: `config.api_key` > `OPENAI_API_KEY` > empty.
    pub fn from_config(config: &AdvisorConfig) -> Result<Self> {
        let api_key = if !config.api_key.is_empty() {
            config.api_key.clone()
        } else {
            std::env::var("OPENAI_API_KEY").unwrap_or_default()
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            client,
        })
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            req
        } else {
            req.header("Authorization", format!("Bearer {}", self.api_key))
        }
    }
}

fn topic_instructions(topic: AdvisoryTopic) -> &'static str {
    match topic {
        AdvisoryTopic::AnalysisSummary => {
            "Summarize the scan findings below in a short overview: the score, the three most \
             important problems and one quick win."
        }
        AdvisoryTopic::ReportQuestion => {
            "Answer the user's question using only the scan findings below."
        }
        AdvisoryTopic::FixSuggestion => {
            "Give step-by-step fixes for the problems in the scan findings below, most impactful first."
        }
        AdvisoryTopic::BrokenLinkHelp => {
            "Explain the broken and duplicate links in the findings below and how to repair or redirect them."
        }
        AdvisoryTopic::TechAdvice => {
            "Give technical advice on frameworks, hosting and rendering as they affect SEO and site health."
        }
        AdvisoryTopic::GeneralSeo => "Give general SEO advice.",
    }
}

/// Chat messages for one request: system prompt, history, then the question
/// with the findings attached.
pub fn build_messages(request: &AdvisoryRequest) -> Vec<Value> {
    let mut messages = vec![json!({
        "role": "system",
        "content": format!("{BASE_PROMPT}\n\n{}", topic_instructions(request.topic)),
    })];

    for entry in &request.history {
        let role = match entry.role {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        };
        messages.push(json!({ "role": role, "content": entry.content }));
    }

    let content = match &request.findings {
        Some(findings) => format!("Scan findings:\n{findings}\n\nQuestion: {}", request.question),
        None => request.question.clone(),
    };
    messages.push(json!({ "role": "user", "content": content }));
    messages
}

/// Pull `choices[0].message.content` out of a completion response.
pub fn parse_completion(body: &Value) -> Result<String> {
    let content = body["choices"]
        .get(0)
        .and_then(|c| c["message"]["content"].as_str())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| SitePulseError::Advisor("No content in completion response".into()))?;
    Ok(content.to_string())
}

#[async_trait]
impl Advisor for OpenAiAdvisor {
    fn name(&self) -> &str {
        "openai"
    }

    async fn advise(&self, request: &AdvisoryRequest) -> Result<String> {
        if self.api_key.is_empty() && self.endpoint.contains("api.openai.com") {
            return Err(SitePulseError::Advisor("OpenAI API key is not configured".into()));
        }

        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": build_messages(request),
        });
        let url = format!("{}/chat/completions", self.endpoint);
        let req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);

        let resp = self.apply_auth(req).send().await.map_err(|e| {
            SitePulseError::Advisor(format!("{} connection failed ({url}): {e}", self.name()))
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(SitePulseError::Advisor(format!(
                "{} API error {status}: {text}",
                self.name()
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| SitePulseError::Advisor(e.to_string()))?;
        let content = parse_completion(&json)?;
        tracing::debug!("🧠 Advisor replied ({:?}, {} chars)", request.topic, content.len());
        Ok(content)
    }
}
