use std::collections::BinaryHeap;
use std::cmp::Ordering;
use serde::{Deserialize, Serialize};
use crate::core::types::DocumentId;

// Upfront heap allocation; a larger `k` grows the heap as hits arrive
const MAX_PREALLOCATED_HITS: usize = 1024;

/// Search results container
#[derive(Debug, Clone)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub total_hits: usize,  // Matching documents before the limit was applied
    pub max_score: f32,
    pub took_ms: u64,
}

/// Document with relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: DocumentId,
    pub score: f32,
}

/// Result order: score descending, then doc_id ascending.
pub fn rank_order(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score.total_cmp(&a.score)
        .then_with(|| a.doc_id.cmp(&b.doc_id))
}

// Max-heap entry whose top is the worst hit currently kept
struct Ranked(SearchHit);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        rank_order(&self.0, &other.0)
    }
}

/// Top-K collector for efficient result collection
pub struct TopKCollector {
    heap: BinaryHeap<Ranked>,
    k: usize,
    pub total_collected: usize,  // Track total documents processed
}

impl TopKCollector {
    pub fn new(k: usize) -> Self {
        TopKCollector {
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(MAX_PREALLOCATED_HITS)),
            k,
            total_collected: 0,
        }
    }

    pub fn collect(&mut self, hit: SearchHit) {
        self.total_collected += 1;
        if self.k == 0 {
            return;
        }

        if self.heap.len() < self.k {
            self.heap.push(Ranked(hit));
            return;
        }

        let beats_worst = self.heap.peek()
            .map(|worst| rank_order(&hit, &worst.0) == Ordering::Less)
            .unwrap_or(true);
        if beats_worst {
            self.heap.pop();
            self.heap.push(Ranked(hit));
        }
    }

    /// Kept hits, best first.
    pub fn get_results(self) -> Vec<SearchHit> {
        self.heap.into_sorted_vec()
            .into_iter()
            .map(|ranked| ranked.0)
            .collect()
    }
}
