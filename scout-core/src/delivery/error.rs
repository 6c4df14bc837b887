use thiserror::Error;

use super::fetch::FetchError;
use crate::platform::PlatformError;
use crate::transcode::TranscodeError;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Failed to download video: {0}")]
    Download(#[from] FetchError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Transcode(#[from] TranscodeError),
    #[error("URL is required")]
    MissingReference,
    #[error("delivery is no longer accepting requests")]
    Unavailable,
}

pub type DeliveryResult<T> = Result<T, DeliveryError>;
