use std::collections::HashSet;

use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::browser::PageSession;

const SCROLL_SCRIPT: &str = r#"
(() => {
    window.scrollTo(0, document.body ? document.body.scrollHeight : 0);
    return true;
})()
"#;

const THUMBNAIL_SCRIPT: &str = r#"
(() => {
    const og = document.querySelector('meta[property="og:image"]');
    if (og && og.content) {
        return og.content;
    }
    const video = document.querySelector('video');
    if (video && video.poster) {
        return video.poster;
    }
    return null;
})()
"#;

const PLAYLIST_SCAN_SCRIPT: &str = r#"
(() => {
    const sources = [];
    document.querySelectorAll('video, source').forEach(node => {
        if (node.src) {
            sources.push(String(node.src));
        }
    });
    const scriptMatches = [];
    document.querySelectorAll('script').forEach(script => {
        const text = script.textContent || '';
        const found = text.match(/https?:\/\/[^\s"']+\.m3u8[^\s"']*/g);
        if (found) {
            scriptMatches.push(...found);
        }
    });
    return { sources, script_matches: scriptMatches };
})()
"#;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistScan {
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub script_matches: Vec<String>,
}

/// Scrolls to the bottom so lazy players start issuing requests.
pub async fn scroll_to_bottom(session: &mut dyn PageSession) {
    if let Err(err) = session.evaluate(SCROLL_SCRIPT).await {
        debug!(error = %err, "scroll before settle failed");
    }
}

/// Page-level thumbnail: `og:image`, then the first video poster.
pub async fn extract_thumbnail(session: &mut dyn PageSession) -> Option<String> {
    match session.evaluate(THUMBNAIL_SCRIPT).await {
        Ok(value) => value
            .as_str()
            .map(str::trim)
            .filter(|thumbnail| !thumbnail.is_empty())
            .map(str::to_string),
        Err(err) => {
            debug!(error = %err, "thumbnail extraction failed");
            None
        }
    }
}

pub async fn scan_for_playlists(session: &mut dyn PageSession) -> Vec<String> {
    let value = match session.evaluate(PLAYLIST_SCAN_SCRIPT).await {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "DOM playlist scan failed");
            return Vec::new();
        }
    };
    match serde_json::from_value::<PlaylistScan>(value) {
        Ok(scan) => fallback_playlists(scan),
        Err(err) => {
            warn!(error = %err, "DOM playlist scan returned an unexpected payload");
            Vec::new()
        }
    }
}

/// Element sources mentioning a playlist, then script matches; http(s) only,
/// first occurrence kept.
pub fn fallback_playlists(scan: PlaylistScan) -> Vec<String> {
    let element_sources = scan.sources.into_iter().filter(|source| {
        let lower = source.to_lowercase();
        lower.contains(".m3u8") || lower.contains("hls")
    });
    let mut seen = HashSet::new();
    element_sources
        .chain(scan.script_matches)
        .map(|url| url.trim().to_string())
        .filter(|url| {
            Url::parse(url)
                .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
                .unwrap_or(false)
        })
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_playlist_sources_and_script_matches_in_order() {
        let scan = PlaylistScan {
            sources: vec![
                "https://cdn.example/hls/live.m3u8".into(),
                "https://cdn.example/poster-loop.mp4".into(),
                "blob:https://site.example/4f1c-hls".into(),
                "https://cdn.example/streams/hls/abc".into(),
            ],
            script_matches: vec![
                "https://cdn.example/hls/live.m3u8".into(),
                "https://other.example/master.m3u8?token=1".into(),
            ],
        };
        assert_eq!(
            fallback_playlists(scan),
            vec![
                "https://cdn.example/hls/live.m3u8".to_string(),
                "https://cdn.example/streams/hls/abc".to_string(),
                "https://other.example/master.m3u8?token=1".to_string(),
            ]
        );
    }

    #[test]
    fn empty_scan_yields_nothing() {
        assert!(fallback_playlists(PlaylistScan::default()).is_empty());
    }
}
