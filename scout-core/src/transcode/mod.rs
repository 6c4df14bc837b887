mod diagnostics;
mod error;
mod job;
mod scratch;

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use diagnostics::{classify, FailureCause, DIAGNOSTIC_TABLE};
pub use error::{TranscodeError, TranscodeResult};
pub use job::{JobState, TranscodeJob};
pub use scratch::{ScratchArtifact, ScratchDir};

use crate::config::TranscodeSection;
use crate::delivery::{reader_stream, ByteStream, HttpFetcher};
use crate::process::describe;

const PLAYLIST_HEADER: &str = "#EXTM3U";
const STDERR_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A validated remux output, deleted when dropped.
#[derive(Debug)]
pub struct CompletedArtifact {
    artifact: ScratchArtifact,
    size: u64,
    job: TranscodeJob,
}

impl CompletedArtifact {
    pub fn path(&self) -> &Path {
        self.artifact.path()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn job(&self) -> &TranscodeJob {
        &self.job
    }

    /// Streams the artifact; the file is removed `grace` after the stream
    /// finishes or is dropped.
    pub async fn into_stream(self, grace: Duration) -> std::io::Result<ByteStream> {
        let CompletedArtifact { mut artifact, .. } = self;
        let file = tokio::fs::File::open(artifact.path()).await?;
        artifact.defer_removal(grace);
        Ok(reader_stream(file, artifact))
    }
}

/// Supervises ffmpeg remuxes of adaptive playlists into scratch artifacts.
pub struct TranscodeSupervisor {
    config: TranscodeSection,
    scratch: ScratchDir,
    fetcher: HttpFetcher,
}

impl TranscodeSupervisor {
    pub fn new(config: TranscodeSection, scratch: ScratchDir, fetcher: HttpFetcher) -> Self {
        Self {
            config,
            scratch,
            fetcher,
        }
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    pub fn cleanup_grace(&self) -> Duration {
        self.config.cleanup_grace()
    }

    /// Input options precede `-i` so they apply to the playlist, not the output.
    pub fn remux_args(&self, input_url: &str, output: &Path) -> Vec<String> {
        vec![
            "-y".into(),
            "-timeout".into(),
            self.config.io_timeout_us.to_string(),
            "-reconnect".into(),
            "1".into(),
            "-reconnect_streamed".into(),
            "1".into(),
            "-reconnect_delay_max".into(),
            self.config.reconnect_delay_max_seconds.to_string(),
            "-i".into(),
            input_url.into(),
            "-c".into(),
            "copy".into(),
            "-bsf:a".into(),
            "aac_adtstoasc".into(),
            "-f".into(),
            "mp4".into(),
            "-movflags".into(),
            "faststart".into(),
            output.display().to_string(),
        ]
    }

    /// Validates the playlist, remuxes it and checks the artifact. Every
    /// failure path leaves no file behind.
    pub async fn run(&self, input_url: &str) -> TranscodeResult<CompletedArtifact> {
        let artifact = self.scratch.allocate();
        let mut job = TranscodeJob::new(input_url, artifact.path().to_path_buf());
        info!(job = %job.id, url = %input_url, output = %job.output_path.display(), "transcode requested");

        if let Err(err) = self.validate(input_url).await {
            job.transition(JobState::Failed);
            warn!(job = %job.id, error = %err, "playlist validation failed");
            return Err(err);
        }
        job.transition(JobState::Running);

        let status = match self.execute(&job).await {
            Ok(Some(status)) => status,
            Ok(None) => {
                job.transition(JobState::TimedOut);
                return Err(TranscodeError::TimedOut {
                    limit: self.config.timeout(),
                    job: Box::new(job),
                });
            }
            Err(err) => {
                job.transition(JobState::Failed);
                return Err(err);
            }
        };

        let size = match tokio::fs::metadata(&job.output_path).await {
            Ok(metadata) => metadata.len(),
            Err(_) => {
                job.transition(JobState::Failed);
                warn!(job = %job.id, exit = ?status.code(), "ffmpeg exited without an output file");
                return Err(TranscodeError::MissingOutput);
            }
        };
        if size <= self.config.min_output_bytes {
            job.transition(JobState::Failed);
            warn!(job = %job.id, size, floor = self.config.min_output_bytes, "transcode artifact too small");
            return Err(TranscodeError::ArtifactTooSmall { size });
        }

        job.transition(JobState::Succeeded);
        info!(job = %job.id, size, elapsed_ms = job.elapsed().num_milliseconds(), "transcode finished");
        Ok(CompletedArtifact { artifact, size, job })
    }

    async fn validate(&self, input_url: &str) -> TranscodeResult<()> {
        let prefix = self
            .fetcher
            .fetch_prefix(input_url, self.config.validation_bytes, self.config.validation_timeout())
            .await
            .map_err(|source| TranscodeError::PlaylistUnreachable {
                url: input_url.to_string(),
                source,
            })?;
        if has_playlist_header(&prefix) {
            Ok(())
        } else {
            Err(TranscodeError::InvalidPlaylist {
                url: input_url.to_string(),
            })
        }
    }

    /// Returns the exit status of a successful ffmpeg run, or `None` when the
    /// process was killed at the deadline.
    async fn execute(&self, job: &TranscodeJob) -> TranscodeResult<Option<ExitStatus>> {
        let program = self.config.ffmpeg_path.clone();
        let args = self.remux_args(&job.input_url, &job.output_path);
        debug!(job = %job.id, command = %describe(&program, &args), "spawning ffmpeg");

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TranscodeError::Spawn {
                program: program.clone(),
                source,
            })?;
        let stderr_task = child.stderr.take().map(|stderr| tokio::spawn(drain(stderr)));

        let limit = self.config.timeout();
        let status = match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!(job = %job.id, ?limit, "ffmpeg exceeded its time limit; killing");
                if let Err(err) = child.kill().await {
                    warn!(job = %job.id, error = %err, "failed to kill ffmpeg");
                }
                if let Some(task) = stderr_task {
                    task.abort();
                }
                return Ok(None);
            }
        };

        let stderr = join_stderr(stderr_task).await;
        if status.success() {
            debug!(job = %job.id, "ffmpeg exited cleanly");
            return Ok(Some(status));
        }

        let cause = classify(&stderr, status.code().is_none());
        let tail: String = stderr.lines().rev().take(5).collect::<Vec<_>>().join(" | ");
        warn!(job = %job.id, exit = ?status.code(), ?cause, stderr = %tail, "ffmpeg failed");
        Err(TranscodeError::Failed {
            cause,
            exit_code: status.code(),
        })
    }
}

fn has_playlist_header(prefix: &[u8]) -> bool {
    let text = String::from_utf8_lossy(prefix);
    text.trim_start_matches('\u{feff}')
        .trim_start()
        .starts_with(PLAYLIST_HEADER)
}

async fn drain<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut buffer = Vec::new();
    if let Err(err) = reader.read_to_end(&mut buffer).await {
        debug!(error = %err, "failed to read ffmpeg diagnostics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

async fn join_stderr(task: Option<JoinHandle<String>>) -> String {
    let Some(task) = task else {
        return String::new();
    };
    match tokio::time::timeout(STDERR_JOIN_TIMEOUT, task).await {
        Ok(Ok(stderr)) => stderr,
        Ok(Err(err)) => {
            debug!(error = %err, "ffmpeg diagnostics task failed");
            String::new()
        }
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supervisor() -> TranscodeSupervisor {
        let dir = std::env::temp_dir();
        TranscodeSupervisor::new(
            TranscodeSection::default(),
            ScratchDir::create(dir).unwrap(),
            HttpFetcher::new("test-agent").unwrap(),
        )
    }

    #[test]
    fn builds_remux_command() {
        let args = supervisor().remux_args("https://cdn.example/master.m3u8", Path::new("/tmp/out.mp4"));
        assert_eq!(
            args.join(" "),
            "-y -timeout 60000000 -reconnect 1 -reconnect_streamed 1 -reconnect_delay_max 5 \
             -i https://cdn.example/master.m3u8 -c copy -bsf:a aac_adtstoasc -f mp4 \
             -movflags faststart /tmp/out.mp4"
        );
    }

    #[test]
    fn recognizes_playlist_header() {
        assert!(has_playlist_header(b"#EXTM3U\n#EXT-X-VERSION:3\n"));
        assert!(has_playlist_header("\u{feff}  \n#EXTM3U\n".as_bytes()));
        assert!(!has_playlist_header(b"<!DOCTYPE html><html>"));
        assert!(!has_playlist_header(b""));
    }
}
