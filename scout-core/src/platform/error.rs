use std::fmt;
use std::io;

use serde::Serialize;
use thiserror::Error;

/// Category of a platform-side failure, derived from the catalog tool's diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformFailure {
    Restricted,
    RateLimited,
    Processing,
}

impl PlatformFailure {
    pub fn message(&self) -> &'static str {
        match self {
            PlatformFailure::Restricted => "Video is age-restricted or private/deleted.",
            PlatformFailure::RateLimited => "Too many requests. Please try again later.",
            PlatformFailure::Processing => "Failed to process platform video.",
        }
    }
}

impl fmt::Display for PlatformFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

// Checked top to bottom, first hit wins. Rate limiting outranks restriction.
const FAILURE_SIGNATURES: &[(&str, PlatformFailure)] = &[
    ("429", PlatformFailure::RateLimited),
    ("too many requests", PlatformFailure::RateLimited),
    ("confirm you're not a bot", PlatformFailure::RateLimited),
    ("410", PlatformFailure::Restricted),
    ("private video", PlatformFailure::Restricted),
    ("video unavailable", PlatformFailure::Restricted),
    ("has been removed", PlatformFailure::Restricted),
    ("age-restricted", PlatformFailure::Restricted),
    ("confirm your age", PlatformFailure::Restricted),
    ("members-only", PlatformFailure::Restricted),
];

pub fn classify_failure(diagnostics: &str) -> PlatformFailure {
    let lower = diagnostics.to_lowercase();
    FAILURE_SIGNATURES
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, failure)| *failure)
        .unwrap_or(PlatformFailure::Processing)
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{failure}")]
    Catalog {
        failure: PlatformFailure,
        detail: String,
    },
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("catalog output could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid platform reference: {0}")]
    InvalidReference(String),
    #[error("platform io error: {0}")]
    Io(#[from] io::Error),
}

impl PlatformError {
    pub fn from_diagnostics(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        PlatformError::Catalog {
            failure: classify_failure(&detail),
            detail,
        }
    }

    pub fn failure(&self) -> PlatformFailure {
        match self {
            PlatformError::Catalog { failure, .. } => *failure,
            _ => PlatformFailure::Processing,
        }
    }
}

pub type PlatformResult<T> = Result<T, PlatformError>;
