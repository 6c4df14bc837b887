pub mod browser;
pub mod config;
pub mod delivery;
pub mod discovery;
pub mod error;
pub mod platform;
pub mod process;
pub mod scout;
pub mod transcode;

pub use browser::{
    BrowserError, BrowserResult, ChromiumLauncher, ChromiumSession, Exchange, PageSession,
    SessionCookie, SessionLauncher,
};
pub use config::{
    load_scout_config, BrowserConfig, DiscoverySection, LimitsSection, PathsSection,
    PlatformSection, ScoutConfig, TranscodeSection,
};
pub use delivery::{
    ByteStream, DeliveryError, DeliveryResult, Dispatcher, FetchError, HttpFetcher, MediaDownload,
};
pub use discovery::{
    classify, CandidateKind, CandidateSet, Discoverer, DiscoveryError, DiscoveryOptions,
    DiscoveryResult, NetworkObserver, VideoCandidate,
};
pub use error::{ConfigError, Result};
pub use platform::{
    AgentResolver, AuthenticatedAgent, CatalogEntry, FormatCatalog, PlatformError,
    PlatformFailure, PlatformRef, PlatformResolver, YtDlpCatalog,
};
pub use scout::{MediaScout, ScoutError, ScoutResult};
pub use transcode::{
    CompletedArtifact, FailureCause, JobState, ScratchDir, TranscodeError, TranscodeJob,
    TranscodeResult, TranscodeSupervisor,
};
