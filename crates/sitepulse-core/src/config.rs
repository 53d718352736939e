//! SitePulse configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SitePulseError};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SitePulseConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub advisor: AdvisorConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl SitePulseConfig {
    /// Load config from the default path (~/.sitepulse/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SitePulseError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| SitePulseError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| SitePulseError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.check_interval_secs == 0 {
            return Err(SitePulseError::Config(
                "scheduler.check_interval_secs must be > 0".into(),
            ));
        }
        if self.workflow.link_check_concurrency == 0 {
            return Err(SitePulseError::Config(
                "workflow.link_check_concurrency must be > 0".into(),
            ));
        }
        if self.session.history_limit == 0 {
            return Err(SitePulseError::Config("session.history_limit must be > 0".into()));
        }
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the SitePulse home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sitepulse")
    }
}

/// Recurring scan scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often the due-check runs.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// Shortest interval a scan definition may use.
    #[serde(default = "default_min_interval")]
    pub min_interval_secs: u64,
}

fn default_check_interval() -> u64 { 3600 }
fn default_min_interval() -> u64 { 10 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            min_interval_secs: default_min_interval(),
        }
    }
}

/// Channel delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Sends go to `{webhook_base_url}/{token}`.
    #[serde(default = "default_webhook_base_url")]
    pub webhook_base_url: String,
    /// Shown as the sender of every message.
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
    #[serde(default = "default_delivery_timeout")]
    pub timeout_secs: u64,
    /// Extra attempts after the first failed one.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,
    /// Secondary endpoint tried once retries are exhausted.
    #[serde(default)]
    pub fallback_base_url: Option<String>,
}

fn default_webhook_base_url() -> String { "https://ping.telex.im/v1/webhooks".into() }
fn default_sender_name() -> String { "SitePulse".into() }
fn default_delivery_timeout() -> u64 { 10 }
fn default_max_retries() -> u32 { 3 }
fn default_retry_base_delay() -> u64 { 500 }

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            webhook_base_url: default_webhook_base_url(),
            sender_name: default_sender_name(),
            timeout_secs: default_delivery_timeout(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
            fallback_base_url: None,
        }
    }
}

/// Scan workflow tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Pause between stages so the channel can render each report.
    #[serde(default = "default_stage_pause")]
    pub stage_pause_ms: u64,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,
    #[serde(default = "default_link_concurrency")]
    pub link_check_concurrency: usize,
    #[serde(default = "default_max_links")]
    pub max_links_checked: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_stage_pause() -> u64 { 1500 }
fn default_fetch_timeout() -> u64 { 10 }
fn default_stage_timeout() -> u64 { 60 }
fn default_link_concurrency() -> usize { 8 }
fn default_max_links() -> usize { 100 }
fn default_user_agent() -> String { "SitePulse/0.2 (+https://github.com/sitepulse/sitepulse)".into() }

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            stage_pause_ms: default_stage_pause(),
            fetch_timeout_secs: default_fetch_timeout(),
            stage_timeout_secs: default_stage_timeout(),
            link_check_concurrency: default_link_concurrency(),
            max_links_checked: default_max_links(),
            user_agent: default_user_agent(),
        }
    }
}

/// Conversation sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_ttl_minutes() -> i64 { 30 }
fn default_history_limit() -> usize { 20 }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
            history_limit: default_history_limit(),
        }
    }
}

/// OpenAI-compatible advisory endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    #[serde(default = "default_advisor_endpoint")]
    pub endpoint: String,
    /// Falls back to `OPENAI_API_KEY` when empty.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_advisor_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_advisor_timeout")]
    pub timeout_secs: u64,
}

fn default_advisor_endpoint() -> String { "https://api.openai.com/v1".into() }
fn default_advisor_model() -> String { "gpt-4o-mini".into() }
fn default_temperature() -> f32 { 0.7 }
fn default_advisor_timeout() -> u64 { 30 }

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_advisor_endpoint(),
            api_key: String::new(),
            model: default_advisor_model(),
            temperature: default_temperature(),
            timeout_secs: default_advisor_timeout(),
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 { 3000 }
fn default_host() -> String { "127.0.0.1".into() }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}
