//! Extension-first classification of observed network exchanges.
//!
//! Extension checks run before content-type checks because servers routinely
//! mislabel media, and noise suppression runs before pattern matching so that
//! text or analytics endpoints never surface as playlists.

use super::types::CandidateKind;

const NOISE_EXTENSIONS: &[&str] = &["woff", "woff2", "ttf", "eot", "css", "js", "json", "xml", "txt"];
const DIRECT_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv", "mov", "avi"];
const PLAYLIST_EXTENSION: &str = "m3u8";
const SEGMENT_EXTENSION: &str = "ts";
const PLAYLIST_MARKERS: &[&str] = &["m3u8", "playlist", "master"];

const DIRECT_CONTENT_TYPES: &[&str] = &["video/mp4", "video/webm", "video/ogg"];
const PLAYLIST_CONTENT_TYPES: &[&str] = &["application/x-mpegurl", "application/vnd.apple.mpegurl"];
const NOISE_CONTENT_TYPES: &[&str] = &["font", "woff", "text/plain"];

pub fn classify(url: &str, content_type: Option<&str>) -> Option<CandidateKind> {
    let clean = strip_query(url).to_lowercase();
    let extension = extension_of(&clean);

    if let Some(ext) = extension {
        if NOISE_EXTENSIONS.contains(&ext) {
            return None;
        }
        if DIRECT_EXTENSIONS.contains(&ext) {
            return Some(CandidateKind::Direct);
        }
        if ext == PLAYLIST_EXTENSION {
            return Some(CandidateKind::Adaptive);
        }
        if ext == SEGMENT_EXTENSION {
            return None;
        }
    }

    if PLAYLIST_MARKERS.iter().any(|marker| clean.contains(marker)) {
        if extension == Some("txt") {
            return None;
        }
        return Some(CandidateKind::Adaptive);
    }

    let content_type = content_type?.to_lowercase();
    if DIRECT_CONTENT_TYPES
        .iter()
        .any(|family| content_type.contains(family))
    {
        return Some(CandidateKind::Direct);
    }
    if PLAYLIST_CONTENT_TYPES
        .iter()
        .any(|family| content_type.contains(family))
    {
        return Some(CandidateKind::Adaptive);
    }
    if NOISE_CONTENT_TYPES
        .iter()
        .any(|family| content_type.contains(family))
    {
        return None;
    }
    if content_type.starts_with("video/") && !content_type.contains("html") {
        return Some(CandidateKind::Direct);
    }
    None
}

/// True when an adaptive URL looks like a top-level manifest rather than a
/// rendition playlist.
pub fn is_master_manifest(url: &str) -> bool {
    let lower = url.to_lowercase();
    ["master", "playlist", "index"]
        .iter()
        .any(|token| lower.contains(token))
}

fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

fn extension_of(path: &str) -> Option<&str> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(classify("https://x/a.m3u8", None), Some(CandidateKind::Adaptive));
        assert_eq!(classify("https://x/a.mp4", None), Some(CandidateKind::Direct));
        assert_eq!(classify("https://x/clip.MOV?token=1", None), Some(CandidateKind::Direct));
        assert_eq!(classify("https://x/seg3.ts", None), None);
        assert_eq!(classify("a.m3u8", None), Some(CandidateKind::Adaptive));
        assert_eq!(classify("a.mp4", None), Some(CandidateKind::Direct));
        assert_eq!(classify("seg3.ts", None), None);
    }

    #[test]
    fn noise_extensions_win_over_content_type() {
        for content_type in [None, Some("video/mp4"), Some("application/vnd.apple.mpegurl")] {
            assert_eq!(classify("style.css", content_type), None);
            assert_eq!(classify("https://x/master/config.json", content_type), None);
            assert_eq!(classify("https://x/playlist.txt", content_type), None);
        }
    }

    #[test]
    fn segments_are_never_surfaced() {
        assert_eq!(classify("https://x/master/seg_001.ts", Some("video/mp2t")), None);
    }

    #[test]
    fn playlist_markers_without_extension() {
        assert_eq!(classify("https://x/hls/master?x=1", None), Some(CandidateKind::Adaptive));
        assert_eq!(classify("https://x/api/playlist", None), Some(CandidateKind::Adaptive));
    }

    #[test]
    fn falls_back_to_content_type() {
        assert_eq!(
            classify("stream?x=1", Some("application/vnd.apple.mpegurl")),
            Some(CandidateKind::Adaptive)
        );
        assert_eq!(
            classify("https://x/stream", Some("Application/X-MpegURL; charset=utf-8")),
            Some(CandidateKind::Adaptive)
        );
        assert_eq!(classify("https://x/media", Some("video/webm")), Some(CandidateKind::Direct));
        assert_eq!(classify("https://x/media", Some("video/x-flv")), Some(CandidateKind::Direct));
        assert_eq!(classify("https://x/media", Some("video/html-preview")), None);
        assert_eq!(classify("https://x/media", Some("font/woff2")), None);
        assert_eq!(classify("https://x/media", Some("text/plain")), None);
        assert_eq!(classify("https://x/media", Some("image/png")), None);
        assert_eq!(classify("https://x/media", None), None);
    }

    #[test]
    fn master_manifest_detection() {
        assert!(is_master_manifest("https://x/hls/Master.m3u8"));
        assert!(is_master_manifest("https://x/index.m3u8"));
        assert!(!is_master_manifest("https://x/720p/chunklist.m3u8"));
    }
}
