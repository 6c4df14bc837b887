use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScoutConfig {
    pub paths: PathsSection,
    pub limits: LimitsSection,
    pub browser: BrowserConfig,
    pub discovery: DiscoverySection,
    pub platform: PlatformSection,
    pub transcode: TranscodeSection,
}

impl ScoutConfig {
    pub fn resolve_path<P: AsRef<Path>>(&self, candidate: P) -> PathBuf {
        let path = candidate.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.paths.base_dir).join(path)
        }
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.scratch_dir)
    }

    pub fn validate(&self) -> Result<()> {
        if self.browser.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("browser.user_agent must not be empty".into()));
        }
        if self.browser.navigation_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "browser.navigation_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.transcode.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "transcode.timeout_seconds must be greater than zero".into(),
            ));
        }
        if self.transcode.validation_bytes == 0 {
            return Err(ConfigError::Invalid(
                "transcode.validation_bytes must be greater than zero".into(),
            ));
        }
        if self.limits.max_browser_sessions == 0 || self.limits.max_concurrent_transcodes == 0 {
            return Err(ConfigError::Invalid(
                "limits must allow at least one concurrent job".into(),
            ));
        }
        if self.platform.hosts.is_empty() {
            return Err(ConfigError::Invalid("platform.hosts must not be empty".into()));
        }
        Ok(())
    }
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            paths: PathsSection::default(),
            limits: LimitsSection::default(),
            browser: BrowserConfig::default(),
            discovery: DiscoverySection::default(),
            platform: PlatformSection::default(),
            transcode: TranscodeSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    pub base_dir: String,
    pub scratch_dir: String,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            base_dir: ".".into(),
            scratch_dir: "temp".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsSection {
    pub max_browser_sessions: usize,
    pub max_concurrent_transcodes: usize,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_browser_sessions: 4,
            max_concurrent_transcodes: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    pub executable_path: Option<String>,
    pub headless: bool,
    pub sandbox: bool,
    pub user_agent: String,
    pub navigation_timeout_ms: u64,
    pub request_timeout_ms: u64,
    /// CDP resource types failed at the network layer.
    pub blocked_resource_types: Vec<String>,
    pub args: Vec<String>,
}

impl BrowserConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable_path: None,
            headless: true,
            sandbox: false,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into(),
            navigation_timeout_ms: 30_000,
            request_timeout_ms: 30_000,
            blocked_resource_types: vec!["Image".into(), "Font".into(), "Stylesheet".into()],
            args: vec![
                "--disable-dev-shm-usage".into(),
                "--disable-accelerated-2d-canvas".into(),
                "--no-first-run".into(),
                "--no-zygote".into(),
                "--disable-gpu".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverySection {
    pub settle_delay_ms: u64,
    pub min_direct_bytes: u64,
    pub scroll_before_settle: bool,
    pub placeholder_thumbnail: Option<String>,
}

impl DiscoverySection {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            settle_delay_ms: 5_000,
            min_direct_bytes: 2 * 1024 * 1024,
            scroll_before_settle: true,
            placeholder_thumbnail: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformSection {
    pub hosts: Vec<String>,
    pub ytdlp_path: String,
    pub preferred_containers: Vec<String>,
    pub consent_selectors: Vec<String>,
    pub consent_settle_ms: u64,
}

impl PlatformSection {
    pub fn consent_settle(&self) -> Duration {
        Duration::from_millis(self.consent_settle_ms)
    }
}

impl Default for PlatformSection {
    fn default() -> Self {
        Self {
            hosts: vec![
                "youtube.com".into(),
                "www.youtube.com".into(),
                "m.youtube.com".into(),
                "music.youtube.com".into(),
                "youtu.be".into(),
            ],
            ytdlp_path: "yt-dlp".into(),
            preferred_containers: vec!["mp4".into()],
            consent_selectors: vec![
                r#"button[aria-label="Accept all"]"#.into(),
                r#"button[aria-label="Agree to the use of cookies and other data for the purposes described"]"#.into(),
            ],
            consent_settle_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscodeSection {
    pub ffmpeg_path: String,
    pub timeout_seconds: u64,
    /// Per-connection timeout handed to ffmpeg, in microseconds.
    pub io_timeout_us: u64,
    pub reconnect_delay_max_seconds: u32,
    pub min_output_bytes: u64,
    pub validation_bytes: u64,
    pub validation_timeout_ms: u64,
    pub cleanup_grace_ms: u64,
}

impl TranscodeSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn validation_timeout(&self) -> Duration {
        Duration::from_millis(self.validation_timeout_ms)
    }

    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_millis(self.cleanup_grace_ms)
    }
}

impl Default for TranscodeSection {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".into(),
            timeout_seconds: 300,
            io_timeout_us: 60_000_000,
            reconnect_delay_max_seconds: 5,
            min_output_bytes: 1024,
            validation_bytes: 1024,
            validation_timeout_ms: 10_000,
            cleanup_grace_ms: 2_000,
        }
    }
}

pub fn load_scout_config<P: AsRef<Path>>(path: P) -> Result<ScoutConfig> {
    let config: ScoutConfig = load_toml(path)?;
    config.validate()?;
    Ok(config)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_fixture_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/scout.toml");
        let config = load_scout_config(path).expect("config should parse");
        assert_eq!(config.discovery.min_direct_bytes, 2 * 1024 * 1024);
        assert_eq!(config.transcode.timeout_seconds, 300);
        assert_eq!(config.transcode.min_output_bytes, 1024);
        assert!(config.platform.hosts.iter().any(|host| host == "youtu.be"));
        assert_eq!(config.browser.blocked_resource_types.len(), 3);
    }

    #[test]
    fn defaults_are_valid() {
        let config = ScoutConfig::default();
        config.validate().expect("defaults should validate");
        assert_eq!(config.discovery.settle_delay(), Duration::from_secs(5));
        assert_eq!(config.scratch_dir(), Path::new(".").join("temp"));
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut config = ScoutConfig::default();
        config.transcode.timeout_seconds = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
