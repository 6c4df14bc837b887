use clap::Args;
use serde::Serialize;

use scout_core::VideoCandidate;

use crate::DisplayFallback;

/// Analisa uma página e lista os vídeos baixáveis.
#[derive(Args, Debug, Clone)]
pub struct DiscoverArgs {
    /// URL da página (http ou https)
    #[arg(value_name = "URL")]
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct CandidateReport {
    pub page_url: String,
    pub candidates: Vec<CandidateRow>,
}

#[derive(Debug, Serialize)]
pub struct CandidateRow {
    pub reference: String,
    pub kind: String,
    pub quality: Option<String>,
    pub size: String,
    pub media_type: Option<String>,
    pub thumbnail: Option<String>,
}

impl CandidateReport {
    pub fn new(page_url: &str, candidates: &[VideoCandidate]) -> Self {
        Self {
            page_url: page_url.to_string(),
            candidates: candidates
                .iter()
                .map(|candidate| CandidateRow {
                    reference: candidate.source_url.clone(),
                    kind: candidate.kind.to_string(),
                    quality: candidate.quality_label.clone(),
                    size: candidate.size_label(),
                    media_type: candidate.media_type.clone(),
                    thumbnail: candidate.thumbnail_url.clone(),
                })
                .collect(),
        }
    }
}

impl DisplayFallback for CandidateReport {
    fn display(&self) -> String {
        if self.candidates.is_empty() {
            return format!("Nenhum vídeo encontrado em {}", self.page_url);
        }
        let mut lines = vec![format!("{} vídeo(s) em {}", self.candidates.len(), self.page_url)];
        for (index, row) in self.candidates.iter().enumerate() {
            lines.push(format!(
                "{:>2}. [{}] {} | {} | {}",
                index + 1,
                row.kind,
                row.quality.as_deref().unwrap_or("-"),
                row.size,
                row.reference
            ));
        }
        lines.join("\n")
    }
}
