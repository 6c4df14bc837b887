use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DiscoveryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    Direct,
    Adaptive,
    Platform,
}

impl fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CandidateKind::Direct => "direct",
            CandidateKind::Adaptive => "adaptive",
            CandidateKind::Platform => "platform",
        };
        f.write_str(label)
    }
}

impl FromStr for CandidateKind {
    type Err = DiscoveryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "direct" => Ok(CandidateKind::Direct),
            "adaptive" | "m3u8" | "hls" => Ok(CandidateKind::Adaptive),
            "platform" | "youtube" => Ok(CandidateKind::Platform),
            other => Err(DiscoveryError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoCandidate {
    pub source_url: String,
    pub kind: CandidateKind,
    pub media_type: Option<String>,
    pub approximate_size_bytes: Option<u64>,
    pub quality_label: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl VideoCandidate {
    pub fn new(source_url: impl Into<String>, kind: CandidateKind) -> Self {
        Self {
            source_url: source_url.into(),
            kind,
            media_type: None,
            approximate_size_bytes: None,
            quality_label: None,
            thumbnail_url: None,
        }
    }

    pub fn size_label(&self) -> String {
        match (self.kind, self.approximate_size_bytes) {
            (CandidateKind::Adaptive, _) => "HLS Stream".to_string(),
            (_, Some(bytes)) => format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0),
            (_, None) => "Unknown".to_string(),
        }
    }
}

/// Insertion-ordered accumulator keyed by `source_url`; the first insert wins.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    entries: Vec<VideoCandidate>,
    seen: std::collections::HashSet<String>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn insert(&mut self, candidate: VideoCandidate) -> bool {
        if !self.seen.insert(candidate.source_url.clone()) {
            return false;
        }
        self.entries.push(candidate);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn apply_thumbnail(&mut self, thumbnail: Option<&str>) {
        let Some(thumbnail) = thumbnail else {
            return;
        };
        for candidate in &mut self.entries {
            candidate.thumbnail_url = Some(thumbnail.to_string());
        }
    }

    pub fn into_vec(self) -> Vec<VideoCandidate> {
        self.entries
    }
}
