//! Input validation shared by the scheduler, the workflow and the gateway.

use reqwest::Url;

use crate::error::{Result, SitePulseError};

/// Accept only absolute http(s) URLs with a host. Returns the normalized form.
pub fn target_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SitePulseError::Validation("URL must not be empty".into()));
    }
    let url = Url::parse(trimmed)
        .map_err(|e| SitePulseError::Validation(format!("Invalid URL '{trimmed}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(SitePulseError::Validation(format!(
            "Unsupported URL scheme '{}' (use http or https)",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(SitePulseError::Validation(format!("URL has no host: '{trimmed}'")));
    }
    Ok(url.to_string())
}

/// Reject blank identifiers (user ids, channel ids).
pub fn identifier<'a>(kind: &str, raw: &'a str) -> Result<&'a str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SitePulseError::Validation(format!("{kind} must not be blank")));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_http_urls() {
        assert_eq!(target_url(" https://a.com ").unwrap(), "https://a.com/");
        assert_eq!(target_url("http://a.com/x?y=1").unwrap(), "http://a.com/x?y=1");
    }

    #[test]
    fn test_rejects_bad_urls() {
        for bad in ["", "a.com", "ftp://a.com", "mailto:x@y.z", "https://"] {
            assert!(
                matches!(target_url(bad), Err(SitePulseError::Validation(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_identifier() {
        assert_eq!(identifier("user id", " u1 ").unwrap(), "u1");
        assert!(identifier("user id", "  ").is_err());
    }
}
