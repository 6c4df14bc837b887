use std::io;
use std::time::Duration;

use thiserror::Error;

use super::diagnostics::FailureCause;
use super::job::TranscodeJob;
use crate::delivery::FetchError;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Invalid M3U8 stream - the file does not contain valid HLS playlist data.")]
    InvalidPlaylist { url: String },
    #[error("Invalid M3U8 stream URL. The stream may be expired, inaccessible, or not a valid HLS stream.")]
    PlaylistUnreachable {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("Failed to start video conversion ({program}): {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("Video conversion timed out after {} seconds.", .limit.as_secs())]
    TimedOut {
        limit: Duration,
        job: Box<TranscodeJob>,
    },
    #[error("{cause}")]
    Failed {
        cause: FailureCause,
        exit_code: Option<i32>,
    },
    #[error("Video conversion failed to create output file.")]
    MissingOutput,
    #[error("Video conversion produced invalid file. The stream may be corrupted or empty.")]
    ArtifactTooSmall { size: u64 },
    #[error("transcode io error: {0}")]
    Io(#[from] io::Error),
}

pub type TranscodeResult<T> = Result<T, TranscodeError>;
