use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use futures::StreamExt;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use scout_core::{ByteStream, CandidateKind};

use crate::{DisplayFallback, Result};

/// Baixa um candidato retornado pelo `discover`.
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Referência do candidato (URL ou `<página>#format=<id>`)
    #[arg(value_name = "REF")]
    pub reference: String,
    /// Tipo do candidato
    #[arg(long, value_enum)]
    pub kind: KindArg,
    /// Arquivo de destino (padrão: nome sugerido no diretório atual)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Direct,
    Adaptive,
    Platform,
}

impl From<KindArg> for CandidateKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Direct => CandidateKind::Direct,
            KindArg::Adaptive => CandidateKind::Adaptive,
            KindArg::Platform => CandidateKind::Platform,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DownloadReport {
    pub output: PathBuf,
    pub bytes: u64,
    pub content_type: String,
    pub declared_length: Option<u64>,
}

impl DisplayFallback for DownloadReport {
    fn display(&self) -> String {
        format!(
            "Salvo em {} ({} bytes, {})",
            self.output.display(),
            self.bytes,
            self.content_type
        )
    }
}

/// Writes `body` to `path`; a partial file is removed when the stream fails.
pub async fn write_stream(mut body: ByteStream, path: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                drop(file);
                if let Err(remove_err) = tokio::fs::remove_file(path).await {
                    warn!(path = %path.display(), error = %remove_err, "failed to remove partial download");
                }
                return Err(err.into());
            }
        };
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    info!(path = %path.display(), bytes = written, "download written");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;

    #[tokio::test]
    async fn writes_every_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.mp4");
        let chunks: Vec<std::io::Result<Bytes>> =
            vec![Ok(Bytes::from_static(b"abc")), Ok(Bytes::from_static(b"def"))];

        let written = write_stream(Box::pin(stream::iter(chunks)), &path).await.unwrap();

        assert_eq!(written, 6);
        assert_eq!(std::fs::read(&path).unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn failed_stream_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.mp4");
        let chunks: Vec<std::io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"abc")),
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "upstream closed")),
        ];

        let result = write_stream(Box::pin(stream::iter(chunks)), &path).await;

        assert!(result.is_err());
        assert!(!path.exists());
    }
}
