use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, trace};

use crate::browser::Exchange;

use super::classifier::{classify, is_master_manifest};
use super::types::{CandidateKind, CandidateSet, VideoCandidate};

pub const ADAPTIVE_MASTER_LABEL: &str = "Adaptive";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObserverStats {
    pub exchanges: u64,
    pub skipped_status: u64,
    pub duplicates: u64,
    pub below_size_floor: u64,
    pub accepted: u64,
}

/// Classifies completed exchanges into a deduplicated candidate set.
#[derive(Debug, Clone)]
pub struct NetworkObserver {
    min_direct_bytes: u64,
    candidates: CandidateSet,
    stats: ObserverStats,
}

impl NetworkObserver {
    pub fn new(min_direct_bytes: u64) -> Self {
        Self {
            min_direct_bytes,
            candidates: CandidateSet::new(),
            stats: ObserverStats::default(),
        }
    }

    /// Drains `exchanges` in arrival order until every sender is dropped.
    pub async fn consume(mut self, mut exchanges: UnboundedReceiver<Exchange>) -> Self {
        while let Some(exchange) = exchanges.recv().await {
            self.observe(&exchange);
        }
        debug!(
            exchanges = self.stats.exchanges,
            accepted = self.stats.accepted,
            duplicates = self.stats.duplicates,
            below_size_floor = self.stats.below_size_floor,
            "network observer drained"
        );
        self
    }

    pub fn observe(&mut self, exchange: &Exchange) -> bool {
        self.stats.exchanges += 1;
        if (300..400).contains(&exchange.status) || !matches!(exchange.status, 200 | 206) {
            self.stats.skipped_status += 1;
            return false;
        }
        if self.candidates.contains(&exchange.url) {
            self.stats.duplicates += 1;
            return false;
        }
        let Some(kind) = classify(&exchange.url, exchange.content_type.as_deref()) else {
            return false;
        };

        let mut candidate = VideoCandidate::new(exchange.url.clone(), kind);
        candidate.media_type = exchange.content_type.clone();
        match kind {
            CandidateKind::Direct => {
                if let Some(length) = exchange.content_length {
                    if length < self.min_direct_bytes {
                        trace!(url = %exchange.url, length, "direct candidate below size floor");
                        self.stats.below_size_floor += 1;
                        return false;
                    }
                }
                candidate.approximate_size_bytes = exchange.content_length;
            }
            CandidateKind::Adaptive => {
                if is_master_manifest(&exchange.url) {
                    candidate.quality_label = Some(ADAPTIVE_MASTER_LABEL.to_string());
                }
            }
            CandidateKind::Platform => {}
        }

        debug!(url = %candidate.source_url, kind = %candidate.kind, "candidate captured");
        self.stats.accepted += 1;
        self.candidates.insert(candidate)
    }

    pub fn stats(&self) -> &ObserverStats {
        &self.stats
    }

    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    pub fn into_candidates(self) -> CandidateSet {
        self.candidates
    }
}
