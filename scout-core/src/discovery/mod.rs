mod classifier;
mod error;
mod observer;
mod page_scan;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

pub use classifier::{classify, is_master_manifest};
pub use error::{DiscoveryError, DiscoveryResult};
pub use observer::{NetworkObserver, ObserverStats, ADAPTIVE_MASTER_LABEL};
pub use page_scan::{fallback_playlists, PlaylistScan};
pub use types::{CandidateKind, CandidateSet, VideoCandidate};

use crate::browser::{PageSession, SessionLauncher};
use crate::config::ScoutConfig;
use crate::platform::PlatformResolver;

/// Media type assigned to playlists recovered from the DOM.
pub const FALLBACK_MEDIA_TYPE: &str = "application/x-mpegurl";

#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub navigation_timeout: Duration,
    pub settle_delay: Duration,
    pub min_direct_bytes: u64,
    pub scroll_before_settle: bool,
    pub placeholder_thumbnail: Option<String>,
}

impl DiscoveryOptions {
    pub fn from_config(config: &ScoutConfig) -> Self {
        Self {
            navigation_timeout: config.browser.navigation_timeout(),
            settle_delay: config.discovery.settle_delay(),
            min_direct_bytes: config.discovery.min_direct_bytes,
            scroll_before_settle: config.discovery.scroll_before_settle,
            placeholder_thumbnail: config.discovery.placeholder_thumbnail.clone(),
        }
    }
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self::from_config(&ScoutConfig::default())
    }
}

/// Turns a page URL into the media candidates it exposes.
pub struct Discoverer {
    launcher: Arc<dyn SessionLauncher>,
    platform: Option<Arc<PlatformResolver>>,
    options: DiscoveryOptions,
}

impl Discoverer {
    pub fn new(launcher: Arc<dyn SessionLauncher>, options: DiscoveryOptions) -> Self {
        Self {
            launcher,
            platform: None,
            options,
        }
    }

    pub fn with_platform(mut self, platform: Arc<PlatformResolver>) -> Self {
        self.platform = Some(platform);
        self
    }

    pub async fn discover(&self, page_url: &str) -> DiscoveryResult<Vec<VideoCandidate>> {
        let url = parse_page_url(page_url)?;

        if let Some(platform) = self.platform.as_ref().filter(|platform| platform.recognizes(&url)) {
            debug!(url = %url, "routing page to platform resolver");
            let mut candidates = platform.resolve(url.as_str()).await?;
            if candidates.is_empty() {
                return Err(DiscoveryError::NoMediaFound);
            }
            if let Some(placeholder) = &self.options.placeholder_thumbnail {
                for candidate in candidates.iter_mut().filter(|c| c.thumbnail_url.is_none()) {
                    candidate.thumbnail_url = Some(placeholder.clone());
                }
            }
            return Ok(candidates);
        }

        let mut session = self.launcher.open().await?;
        let collected = self.collect(session.as_mut(), url.as_str()).await;
        if let Err(err) = session.close().await {
            warn!(url = %url, error = %err, "failed to close discovery session");
        }

        let candidates = collected?;
        if candidates.is_empty() {
            info!(url = %url, "no media found");
            return Err(DiscoveryError::NoMediaFound);
        }
        info!(url = %url, candidates = candidates.len(), "discovery finished");
        Ok(candidates.into_vec())
    }

    async fn collect(&self, session: &mut dyn PageSession, page_url: &str) -> DiscoveryResult<CandidateSet> {
        let exchanges = session.subscribe().await?;
        let observer = tokio::spawn(NetworkObserver::new(self.options.min_direct_bytes).consume(exchanges));

        if let Err(err) = session.navigate(page_url, self.options.navigation_timeout).await {
            warn!(url = %page_url, error = %err, "navigation did not complete; continuing with captured traffic");
        }
        if self.options.scroll_before_settle {
            page_scan::scroll_to_bottom(session).await;
        }
        tokio::time::sleep(self.options.settle_delay).await;

        let thumbnail = page_scan::extract_thumbnail(session)
            .await
            .or_else(|| self.options.placeholder_thumbnail.clone());

        session.unsubscribe().await;
        let observer = observer.await?;
        let stats = observer.stats().clone();
        let mut candidates = observer.into_candidates();
        debug!(
            url = %page_url,
            exchanges = stats.exchanges,
            accepted = stats.accepted,
            "network pass finished"
        );

        if candidates.is_empty() {
            for playlist in page_scan::scan_for_playlists(session).await {
                let mut candidate = VideoCandidate::new(playlist, CandidateKind::Adaptive);
                candidate.media_type = Some(FALLBACK_MEDIA_TYPE.to_string());
                candidates.insert(candidate);
            }
            if !candidates.is_empty() {
                info!(url = %page_url, candidates = candidates.len(), "recovered playlists from page markup");
            }
        }

        candidates.apply_thumbnail(thumbnail.as_deref());
        Ok(candidates)
    }
}

fn parse_page_url(page_url: &str) -> DiscoveryResult<Url> {
    let trimmed = page_url.trim();
    if trimmed.is_empty() {
        return Err(DiscoveryError::InvalidUrl("URL is required".into()));
    }
    let url = Url::parse(trimmed).map_err(|err| DiscoveryError::InvalidUrl(format!("{trimmed}: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(DiscoveryError::InvalidUrl(format!(
            "{trimmed}: only http and https pages are supported"
        )));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_non_http_urls() {
        assert!(matches!(parse_page_url("  "), Err(DiscoveryError::InvalidUrl(_))));
        assert!(matches!(parse_page_url("ftp://host/file"), Err(DiscoveryError::InvalidUrl(_))));
        assert!(matches!(parse_page_url("not a url"), Err(DiscoveryError::InvalidUrl(_))));
        assert_eq!(
            parse_page_url("https://videos.example/page").unwrap().as_str(),
            "https://videos.example/page"
        );
    }
}
