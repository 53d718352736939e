//! Error type shared across the workspace.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SitePulseError>;

#[derive(Debug, Error)]
pub enum SitePulseError {
    #[error("Config error: {0}")]
    Config(String),

    /// Rejected input: bad URL, bad interval, blank channel id.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Channel not registered: {0}")]
    ChannelNotRegistered(String),

    /// The transport reached the endpoint (or tried to) and the send failed.
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Scan failed during {stage}: {message}")]
    Workflow { stage: String, message: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Advisor error: {0}")]
    Advisor(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SitePulseError {
    /// Short, user-facing form of the error (no variant prefix).
    pub fn user_message(&self) -> String {
        match self {
            SitePulseError::Validation(m)
            | SitePulseError::Fetch(m)
            | SitePulseError::Delivery(m)
            | SitePulseError::Timeout(m)
            | SitePulseError::Advisor(m)
            | SitePulseError::Config(m) => m.clone(),
            SitePulseError::Workflow { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_error_display() {
        let err = SitePulseError::Workflow {
            stage: "meta_extraction".into(),
            message: "connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "Scan failed during meta_extraction: connection refused"
        );
        assert_eq!(err.user_message(), "connection refused");
    }

    #[test]
    fn test_io_error_converts() {
        fn open() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"))?;
            Ok(())
        }
        assert!(matches!(open(), Err(SitePulseError::Io(_))));
    }
}
