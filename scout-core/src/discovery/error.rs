use thiserror::Error;

use crate::browser::BrowserError;
use crate::platform::PlatformError;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid page url: {0}")]
    InvalidUrl(String),
    #[error("no downloadable video found on this page; it might be encrypted (DRM) or unsupported")]
    NoMediaFound,
    #[error("failed to analyze page: {0}")]
    Browser(#[from] BrowserError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error("unsupported candidate kind: {0}")]
    UnknownKind(String),
}

impl From<tokio::task::JoinError> for DiscoveryError {
    fn from(err: tokio::task::JoinError) -> Self {
        DiscoveryError::Browser(BrowserError::from(err))
    }
}

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
