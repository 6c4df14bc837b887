use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde::Serialize;

use scout_core::ScoutConfig;

use crate::DisplayFallback;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Valida o arquivo de configuração e mostra os valores efetivos
    Check,
}

#[derive(Debug, Serialize)]
pub struct ConfigReport {
    pub path: PathBuf,
    pub scratch_dir: PathBuf,
    pub headless: bool,
    pub max_browser_sessions: usize,
    pub max_concurrent_transcodes: usize,
    pub settle_delay_ms: u64,
    pub transcode_timeout_seconds: u64,
    pub ffmpeg_path: String,
    pub ytdlp_path: String,
    pub platform_hosts: Vec<String>,
}

impl ConfigReport {
    pub fn new(path: &Path, config: &ScoutConfig) -> Self {
        Self {
            path: path.to_path_buf(),
            scratch_dir: config.scratch_dir(),
            headless: config.browser.headless,
            max_browser_sessions: config.limits.max_browser_sessions,
            max_concurrent_transcodes: config.limits.max_concurrent_transcodes,
            settle_delay_ms: config.discovery.settle_delay_ms,
            transcode_timeout_seconds: config.transcode.timeout_seconds,
            ffmpeg_path: config.transcode.ffmpeg_path.clone(),
            ytdlp_path: config.platform.ytdlp_path.clone(),
            platform_hosts: config.platform.hosts.clone(),
        }
    }
}

impl DisplayFallback for ConfigReport {
    fn display(&self) -> String {
        [
            format!("Configuração válida: {}", self.path.display()),
            format!("  - Scratch: {}", self.scratch_dir.display()),
            format!("  - Headless: {}", self.headless),
            format!(
                "  - Limites: {} sessões / {} conversões",
                self.max_browser_sessions, self.max_concurrent_transcodes
            ),
            format!("  - Espera após navegação: {} ms", self.settle_delay_ms),
            format!("  - Timeout ffmpeg: {} s ({})", self.transcode_timeout_seconds, self.ffmpeg_path),
            format!("  - yt-dlp: {} ({} hosts)", self.ytdlp_path, self.platform_hosts.len()),
        ]
        .join("\n")
    }
}
