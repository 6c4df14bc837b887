use url::Url;

/// Recognizes page URLs served by the platform path.
#[derive(Debug, Clone)]
pub struct PlatformMatcher {
    hosts: Vec<String>,
}

impl PlatformMatcher {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|host| host.into().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn recognizes(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        if !self.hosts.iter().any(|known| *known == host) {
            return false;
        }
        has_video_reference(url)
    }
}

fn has_video_reference(url: &Url) -> bool {
    if url
        .query_pairs()
        .any(|(key, value)| key == "v" && !value.is_empty())
    {
        return true;
    }
    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|segment| !segment.is_empty()).collect())
        .unwrap_or_default();
    match segments.as_slice() {
        [_id] if url.host_str() == Some("youtu.be") => true,
        ["shorts" | "embed" | "live", _id, ..] => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlatformSection;

    fn matcher() -> PlatformMatcher {
        PlatformMatcher::new(PlatformSection::default().hosts)
    }

    fn recognizes(url: &str) -> bool {
        matcher().recognizes(&Url::parse(url).unwrap())
    }

    #[test]
    fn accepts_video_pages() {
        assert!(recognizes("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(recognizes("https://youtu.be/dQw4w9WgXcQ?t=5"));
        assert!(recognizes("https://m.youtube.com/shorts/abc123"));
        assert!(recognizes("https://www.youtube.com/embed/abc123"));
    }

    #[test]
    fn rejects_other_pages() {
        assert!(!recognizes("https://www.youtube.com/"));
        assert!(!recognizes("https://www.youtube.com/feed/trending"));
        assert!(!recognizes("https://videos.example/watch?v=abc"));
        assert!(!recognizes("https://youtu.be/"));
    }
}
