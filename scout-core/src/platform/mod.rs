mod agent;
mod catalog;
mod error;
mod matcher;
mod reference;

use std::sync::Arc;

use tracing::info;
use url::Url;

pub use agent::{AgentResolver, AuthenticatedAgent};
pub use catalog::{
    select_formats, CatalogEntry, CatalogThumbnail, FormatCatalog, PlatformFormat, YtDlpCatalog,
};
pub use error::{classify_failure, PlatformError, PlatformFailure, PlatformResult};
pub use matcher::PlatformMatcher;
pub use reference::PlatformRef;

use crate::browser::SessionLauncher;
use crate::config::{BrowserConfig, PlatformSection};
use crate::delivery::ByteStream;
use crate::discovery::VideoCandidate;

/// Platform path: credentialed agent plus format catalog, for both
/// discovery and delivery.
pub struct PlatformResolver {
    matcher: PlatformMatcher,
    agents: AgentResolver,
    catalog: Arc<dyn FormatCatalog>,
    preferred_containers: Vec<String>,
}

impl PlatformResolver {
    pub fn new(
        launcher: Arc<dyn SessionLauncher>,
        catalog: Arc<dyn FormatCatalog>,
        platform: &PlatformSection,
        browser: &BrowserConfig,
    ) -> Self {
        Self {
            matcher: PlatformMatcher::new(platform.hosts.iter().cloned()),
            agents: AgentResolver::new(launcher, platform, browser),
            catalog,
            preferred_containers: platform.preferred_containers.clone(),
        }
    }

    pub fn recognizes(&self, url: &Url) -> bool {
        self.matcher.recognizes(url)
    }

    /// Lists the page's downloadable formats as platform candidates.
    pub async fn resolve(&self, page_url: &str) -> PlatformResult<Vec<VideoCandidate>> {
        let agent = self.agents.resolve(page_url).await;
        let entry = self.catalog.query(page_url, &agent).await?;
        let candidates = entry.to_candidates(page_url, &self.preferred_containers);
        info!(
            url = %page_url,
            authenticated = agent.is_authenticated(),
            formats = entry.formats.len(),
            candidates = candidates.len(),
            "platform formats resolved"
        );
        Ok(candidates)
    }

    /// Opens the format's byte stream under a freshly resolved agent.
    pub async fn open_stream(&self, reference: &PlatformRef) -> PlatformResult<ByteStream> {
        let recognized = Url::parse(&reference.page_url)
            .map(|url| self.recognizes(&url))
            .unwrap_or(false);
        if !recognized {
            return Err(PlatformError::InvalidReference(reference.to_string()));
        }
        let agent = self.agents.resolve(&reference.page_url).await;
        self.catalog
            .open_stream(&reference.page_url, &reference.format_id, &agent)
            .await
    }
}
