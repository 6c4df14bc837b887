use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::agent::AuthenticatedAgent;
use super::error::{PlatformError, PlatformResult};
use super::reference::PlatformRef;
use crate::delivery::{prepend, reader_stream, ByteStream};
use crate::discovery::{CandidateKind, VideoCandidate};
use crate::process::{describe, CommandExecutor, SystemCommandExecutor};

/// Metadata the platform publishes for one video.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogEntry {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub thumbnails: Vec<CatalogThumbnail>,
    #[serde(default)]
    pub formats: Vec<PlatformFormat>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogThumbnail {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformFormat {
    pub format_id: String,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub format_note: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub filesize: Option<f64>,
    #[serde(default)]
    pub filesize_approx: Option<f64>,
}

fn codec_present(codec: &Option<String>) -> bool {
    codec
        .as_deref()
        .map(|codec| !codec.is_empty() && codec != "none")
        .unwrap_or(false)
}

impl PlatformFormat {
    pub fn has_video(&self) -> bool {
        codec_present(&self.vcodec)
    }

    pub fn has_audio(&self) -> bool {
        codec_present(&self.acodec)
    }

    pub fn container(&self) -> &str {
        self.ext.as_deref().unwrap_or("")
    }

    pub fn quality_label(&self) -> String {
        if let Some(note) = self.format_note.as_deref().filter(|note| !note.is_empty()) {
            return note.to_string();
        }
        match self.height {
            Some(height) => format!("{height}p"),
            None => "Unknown".to_string(),
        }
    }

    pub fn approximate_size(&self) -> Option<u64> {
        self.filesize
            .or(self.filesize_approx)
            .filter(|size| *size > 0.0)
            .map(|size| size as u64)
    }
}

impl CatalogEntry {
    /// Largest declared image, else the last listed, else the top-level field.
    pub fn best_thumbnail(&self) -> Option<&str> {
        let largest = self
            .thumbnails
            .iter()
            .filter_map(|thumb| {
                let area = u64::from(thumb.width?) * u64::from(thumb.height?);
                Some((area, thumb))
            })
            .max_by_key(|(area, _)| *area)
            .map(|(_, thumb)| thumb.url.as_str());
        largest
            .or_else(|| self.thumbnails.last().map(|thumb| thumb.url.as_str()))
            .or(self.thumbnail.as_deref())
    }

    pub fn to_candidates(&self, page_url: &str, preferred_containers: &[String]) -> Vec<VideoCandidate> {
        let thumbnail = self.best_thumbnail().map(str::to_string);
        select_formats(&self.formats, preferred_containers)
            .into_iter()
            .map(|format| {
                let reference = PlatformRef::new(page_url, format.format_id.clone());
                let mut candidate = VideoCandidate::new(reference.to_string(), CandidateKind::Platform);
                candidate.media_type = Some(match format.ext.as_deref() {
                    Some(ext) if !ext.is_empty() => format!("video/{ext}"),
                    _ => "video/mp4".to_string(),
                });
                candidate.quality_label = Some(format.quality_label());
                candidate.approximate_size_bytes = format.approximate_size();
                candidate.thumbnail_url = thumbnail.clone();
                candidate
            })
            .collect()
    }
}

/// Formats carrying both tracks in a preferred container; any format with
/// both tracks when none qualifies.
pub fn select_formats<'a>(formats: &'a [PlatformFormat], preferred_containers: &[String]) -> Vec<&'a PlatformFormat> {
    let muxed: Vec<&PlatformFormat> = formats
        .iter()
        .filter(|format| format.has_video() && format.has_audio())
        .collect();
    let preferred: Vec<&PlatformFormat> = muxed
        .iter()
        .copied()
        .filter(|format| {
            preferred_containers
                .iter()
                .any(|container| container.eq_ignore_ascii_case(format.container()))
        })
        .collect();
    if preferred.is_empty() {
        muxed
    } else {
        preferred
    }
}

/// Source of platform format listings and format byte streams.
#[async_trait]
pub trait FormatCatalog: Send + Sync {
    async fn query(&self, page_url: &str, agent: &AuthenticatedAgent) -> PlatformResult<CatalogEntry>;

    async fn open_stream(
        &self,
        page_url: &str,
        format_id: &str,
        agent: &AuthenticatedAgent,
    ) -> PlatformResult<ByteStream>;
}

/// `FormatCatalog` backed by the yt-dlp command line tool.
pub struct YtDlpCatalog {
    program: PathBuf,
    executor: Arc<dyn CommandExecutor>,
}

impl YtDlpCatalog {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self::with_executor(program, Arc::new(SystemCommandExecutor))
    }

    pub fn with_executor(program: impl Into<PathBuf>, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            program: program.into(),
            executor,
        }
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    fn build_args(&self, page_url: &str, format_id: Option<&str>, cookies: Option<&NamedTempFile>) -> Vec<String> {
        let mut args: Vec<String> = match format_id {
            Some(format_id) => vec![
                "-f".into(),
                format_id.into(),
                "-o".into(),
                "-".into(),
                "--no-part".into(),
                "--quiet".into(),
            ],
            None => vec!["--dump-json".into()],
        };
        args.extend(["--no-playlist".into(), "--no-warnings".into(), "--socket-timeout".into(), "15".into()]);
        if let Some(file) = cookies {
            args.push("--cookies".into());
            args.push(file.path().display().to_string());
        }
        args.push("--".into());
        args.push(page_url.to_string());
        args
    }
}

fn write_cookie_jar(agent: &AuthenticatedAgent) -> PlatformResult<Option<NamedTempFile>> {
    let Some(jar) = agent.to_netscape() else {
        return Ok(None);
    };
    let mut file = NamedTempFile::new()?;
    file.write_all(jar.as_bytes())?;
    file.flush()?;
    Ok(Some(file))
}

#[async_trait]
impl FormatCatalog for YtDlpCatalog {
    async fn query(&self, page_url: &str, agent: &AuthenticatedAgent) -> PlatformResult<CatalogEntry> {
        let cookies = write_cookie_jar(agent)?;
        let args = self.build_args(page_url, None, cookies.as_ref());
        debug!(command = %describe(&self.program_name(), &args), "querying format catalog");

        let mut command = Command::new(&self.program);
        command.args(&args).stdin(Stdio::null());
        let output = self
            .executor
            .run(&mut command)
            .await
            .map_err(|source| PlatformError::Spawn {
                program: self.program_name(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(url = %page_url, status = ?output.status.code(), %stderr, "format catalog query failed");
            return Err(PlatformError::from_diagnostics(stderr));
        }

        let entry: CatalogEntry = serde_json::from_slice(&output.stdout)?;
        info!(
            url = %page_url,
            title = entry.title.as_deref().unwrap_or(""),
            formats = entry.formats.len(),
            "format catalog resolved"
        );
        Ok(entry)
    }

    async fn open_stream(
        &self,
        page_url: &str,
        format_id: &str,
        agent: &AuthenticatedAgent,
    ) -> PlatformResult<ByteStream> {
        let cookies = write_cookie_jar(agent)?;
        let args = self.build_args(page_url, Some(format_id), cookies.as_ref());
        debug!(command = %describe(&self.program_name(), &args), "opening format stream");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PlatformError::Spawn {
                program: self.program_name(),
                source,
            })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| PlatformError::from_diagnostics("stream output unavailable"))?;
        let stderr = child.stderr.take().map(|stderr| tokio::spawn(drain(stderr)));

        // No bytes before exit means the tool refused; classify its stderr.
        let mut first = vec![0u8; 64 * 1024];
        let read = stdout.read(&mut first).await?;
        if read == 0 {
            let status = child.wait().await?;
            let diagnostics = match stderr {
                Some(task) => task.await.unwrap_or_default(),
                None => String::new(),
            };
            warn!(url = %page_url, format_id, status = ?status.code(), %diagnostics, "format stream produced no data");
            return Err(PlatformError::from_diagnostics(diagnostics));
        }
        first.truncate(read);

        info!(url = %page_url, format_id, "streaming platform format");
        let guard = StreamGuard {
            child,
            stderr,
            _cookies: cookies,
        };
        Ok(prepend(Bytes::from(first), reader_stream(stdout, guard)))
    }
}

async fn drain<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut buffer = Vec::new();
    if let Err(err) = reader.read_to_end(&mut buffer).await {
        debug!(error = %err, "failed to read tool diagnostics");
    }
    String::from_utf8_lossy(&buffer).trim().to_string()
}

/// Keeps the tool process and its cookie jar alive for the stream's lifetime.
struct StreamGuard {
    child: Child,
    stderr: Option<tokio::task::JoinHandle<String>>,
    _cookies: Option<NamedTempFile>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) if !status.success() => {
                warn!(status = ?status.code(), "platform stream tool exited with failure");
            }
            Ok(Some(_)) => {}
            Ok(None) => debug!("platform stream released before tool exit; killing"),
            Err(err) => debug!(error = %err, "failed to poll platform stream tool"),
        }
        if let Some(task) = self.stderr.take() {
            task.abort();
        }
    }
}
