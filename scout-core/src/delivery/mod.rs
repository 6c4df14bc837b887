mod body;
mod error;
mod fetch;

use std::fmt;
use std::sync::Arc;

use tracing::info;
use url::Url;

pub use body::{collect, prepend, reader_stream, ByteStream};
pub use error::{DeliveryError, DeliveryResult};
pub use fetch::{FetchError, FetchResult, FetchedBody, HttpFetcher};

use crate::discovery::CandidateKind;
use crate::platform::{PlatformRef, PlatformResolver};
use crate::transcode::TranscodeSupervisor;

pub const DEFAULT_CONTENT_TYPE: &str = "video/mp4";
pub const DEFAULT_FILENAME: &str = "video.mp4";
pub const PLATFORM_FILENAME: &str = "platform_video.mp4";

const DIRECT_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv", "mov", "avi"];

/// A ready-to-send media response.
pub struct MediaDownload {
    pub filename: String,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

impl MediaDownload {
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }
}

impl fmt::Debug for MediaDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaDownload")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Routes a chosen candidate to the delivery strategy for its kind.
pub struct Dispatcher {
    fetcher: HttpFetcher,
    platform: Arc<PlatformResolver>,
    transcoder: Arc<TranscodeSupervisor>,
}

impl Dispatcher {
    pub fn new(fetcher: HttpFetcher, platform: Arc<PlatformResolver>, transcoder: Arc<TranscodeSupervisor>) -> Self {
        Self {
            fetcher,
            platform,
            transcoder,
        }
    }

    pub async fn download(&self, candidate_ref: &str, kind: CandidateKind) -> DeliveryResult<MediaDownload> {
        let candidate_ref = candidate_ref.trim();
        if candidate_ref.is_empty() {
            return Err(DeliveryError::MissingReference);
        }
        info!(reference = %candidate_ref, %kind, "delivery requested");
        match kind {
            CandidateKind::Direct => self.direct(candidate_ref).await,
            CandidateKind::Adaptive => self.adaptive(candidate_ref).await,
            CandidateKind::Platform => self.platform(candidate_ref).await,
        }
    }

    async fn direct(&self, url: &str) -> DeliveryResult<MediaDownload> {
        let fetched = self.fetcher.open(url).await?;
        Ok(MediaDownload {
            filename: direct_filename(url),
            content_type: fetched
                .content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            content_length: fetched.content_length,
            body: fetched.body,
        })
    }

    async fn adaptive(&self, url: &str) -> DeliveryResult<MediaDownload> {
        let artifact = self.transcoder.run(url).await?;
        let size = artifact.size();
        let body = artifact
            .into_stream(self.transcoder.cleanup_grace())
            .await
            .map_err(crate::transcode::TranscodeError::from)?;
        Ok(MediaDownload {
            filename: DEFAULT_FILENAME.to_string(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            content_length: Some(size),
            body,
        })
    }

    async fn platform(&self, reference: &str) -> DeliveryResult<MediaDownload> {
        let reference: PlatformRef = reference.parse()?;
        let body = self.platform.open_stream(&reference).await?;
        Ok(MediaDownload {
            filename: PLATFORM_FILENAME.to_string(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            content_length: None,
            body,
        })
    }
}

/// Last path segment when it carries a video extension, else the default name.
pub fn direct_filename(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| {
            name.rsplit_once('.')
                .map(|(stem, ext)| !stem.is_empty() && DIRECT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .filter(|name| !name.contains(['"', '/', '\\']))
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}
