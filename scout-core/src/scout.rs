use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::browser::{BrowserError, ChromiumLauncher, SessionLauncher};
use crate::config::ScoutConfig;
use crate::delivery::{DeliveryError, DeliveryResult, Dispatcher, FetchError, HttpFetcher, MediaDownload};
use crate::discovery::{CandidateKind, Discoverer, DiscoveryError, DiscoveryOptions, DiscoveryResult, VideoCandidate};
use crate::error::ConfigError;
use crate::platform::{FormatCatalog, PlatformResolver, YtDlpCatalog};
use crate::transcode::{ScratchDir, TranscodeSupervisor};

#[derive(Debug, Error)]
pub enum ScoutError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("failed to prepare scratch directory: {0}")]
    Scratch(#[source] std::io::Error),
    #[error("failed to build http client: {0}")]
    Http(#[from] FetchError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

pub type ScoutResult<T> = Result<T, ScoutError>;

/// Entry point wiring discovery and delivery behind admission limits.
pub struct MediaScout {
    discoverer: Discoverer,
    dispatcher: Dispatcher,
    sessions: Arc<Semaphore>,
    transcodes: Arc<Semaphore>,
}

impl MediaScout {
    /// Production wiring: chromium sessions and the yt-dlp catalog.
    pub fn from_config(config: ScoutConfig) -> ScoutResult<Self> {
        config.validate()?;
        let launcher: Arc<dyn SessionLauncher> = Arc::new(ChromiumLauncher::new(config.browser.clone())?);
        let catalog: Arc<dyn FormatCatalog> = Arc::new(YtDlpCatalog::new(&config.platform.ytdlp_path));
        Self::with_components(config, launcher, catalog)
    }

    pub fn with_components(
        config: ScoutConfig,
        launcher: Arc<dyn SessionLauncher>,
        catalog: Arc<dyn FormatCatalog>,
    ) -> ScoutResult<Self> {
        let scratch = ScratchDir::create(config.scratch_dir()).map_err(ScoutError::Scratch)?;
        debug!(scratch = %scratch.root().display(), "scratch directory ready");

        let fetcher = HttpFetcher::new(&config.browser.user_agent)?;
        let platform = Arc::new(PlatformResolver::new(
            launcher.clone(),
            catalog,
            &config.platform,
            &config.browser,
        ));
        let transcoder = Arc::new(TranscodeSupervisor::new(
            config.transcode.clone(),
            scratch,
            fetcher.clone(),
        ));
        let discoverer = Discoverer::new(launcher, DiscoveryOptions::from_config(&config))
            .with_platform(platform.clone());
        let dispatcher = Dispatcher::new(fetcher, platform, transcoder);

        info!(
            max_browser_sessions = config.limits.max_browser_sessions,
            max_concurrent_transcodes = config.limits.max_concurrent_transcodes,
            "media scout ready"
        );
        Ok(Self {
            discoverer,
            dispatcher,
            sessions: Arc::new(Semaphore::new(config.limits.max_browser_sessions)),
            transcodes: Arc::new(Semaphore::new(config.limits.max_concurrent_transcodes)),
        })
    }

    pub async fn discover(&self, page_url: &str) -> DiscoveryResult<Vec<VideoCandidate>> {
        let _permit = self
            .sessions
            .acquire()
            .await
            .map_err(|_| DiscoveryError::Browser(BrowserError::Closed))?;
        self.discoverer.discover(page_url).await
    }

    /// Platform deliveries hold a browser permit while the agent resolves;
    /// adaptive deliveries hold a transcode permit until the artifact is ready.
    pub async fn download(&self, candidate_ref: &str, kind: CandidateKind) -> DeliveryResult<MediaDownload> {
        let semaphore = match kind {
            CandidateKind::Direct => None,
            CandidateKind::Adaptive => Some(&self.transcodes),
            CandidateKind::Platform => Some(&self.sessions),
        };
        let _permit = match semaphore {
            Some(semaphore) => Some(
                semaphore
                    .acquire()
                    .await
                    .map_err(|_| DeliveryError::Unavailable)?,
            ),
            None => None,
        };
        self.dispatcher.download(candidate_ref, kind).await
    }

    pub fn available_sessions(&self) -> usize {
        self.sessions.available_permits()
    }

    pub fn available_transcodes(&self) -> usize {
        self.transcodes.available_permits()
    }
}
