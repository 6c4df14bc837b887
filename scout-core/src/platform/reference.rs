use std::fmt;
use std::str::FromStr;

use url::Url;

use super::error::PlatformError;

const FORMAT_MARKER: &str = "#format=";

/// Candidate reference for a platform format: `<page_url>#format=<format_id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformRef {
    pub page_url: String,
    pub format_id: String,
}

impl PlatformRef {
    pub fn new(page_url: impl Into<String>, format_id: impl Into<String>) -> Self {
        Self {
            page_url: page_url.into(),
            format_id: format_id.into(),
        }
    }
}

impl fmt::Display for PlatformRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.page_url, FORMAT_MARKER, self.format_id)
    }
}

impl FromStr for PlatformRef {
    type Err = PlatformError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (page_url, format_id) = value
            .rsplit_once(FORMAT_MARKER)
            .ok_or_else(|| PlatformError::InvalidReference(value.to_string()))?;
        let is_web_page = Url::parse(page_url)
            .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
            .unwrap_or(false);
        if !is_web_page || format_id.is_empty() || format_id.starts_with('-') {
            return Err(PlatformError::InvalidReference(value.to_string()));
        }
        Ok(Self::new(page_url, format_id))
    }
}
