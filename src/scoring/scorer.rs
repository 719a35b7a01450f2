use crate::core::config::{ScorerKind, ScoringConfig};
use crate::index::posting::Posting;

/// Scorer trait
pub trait Scorer: Send + Sync {
    fn score(&self, posting: &Posting, term_stats: &TermStats, doc_stats: &DocStats) -> f32;

    fn name(&self) -> &str;
}

/// Corpus-wide statistics for one query term
#[derive(Debug, Clone, Copy)]
pub struct TermStats {
    pub doc_freq: u32,        // Number of live documents containing the term
}

/// Document statistics for scoring
#[derive(Debug, Clone, Copy)]
pub struct DocStats {
    pub doc_length: u32,      // Number of tokens in document
    pub avg_doc_length: f32,  // Average document length in collection
    pub total_docs: usize,    // Total number of documents
}

pub fn scorer_from_config(config: &ScoringConfig) -> Box<dyn Scorer> {
    match config.scorer {
        ScorerKind::Bm25 => Box::new(BM25Scorer { k1: config.k1, b: config.b }),
        ScorerKind::TfIdf => Box::new(TfIdfScorer::new(true)),
    }
}

/// TF-IDF Scorer
pub struct TfIdfScorer {
    pub normalize: bool,
}

impl TfIdfScorer {
    pub fn new(normalize: bool) -> Self {
        TfIdfScorer { normalize }
    }

    /// Smoothed so a term present in every document still scores above zero.
    pub fn idf(doc_freq: u32, total_docs: usize) -> f32 {
        ((total_docs as f32 + 1.0) / (doc_freq as f32 + 1.0)).ln() + 1.0
    }
}

impl Scorer for TfIdfScorer {
    fn score(&self, posting: &Posting, term_stats: &TermStats, doc_stats: &DocStats) -> f32 {
        let tf = if self.normalize && doc_stats.doc_length > 0 {
            posting.term_freq as f32 / doc_stats.doc_length as f32
        } else {
            posting.term_freq as f32
        };

        tf * Self::idf(term_stats.doc_freq, doc_stats.total_docs)
    }

    fn name(&self) -> &str {
        "tfidf"
    }
}

/// BM25 Scorer
pub struct BM25Scorer {
    pub k1: f32,  // Term frequency saturation (default: 1.2)
    pub b: f32,   // Length normalization strength (default: 0.75)
}

impl Default for BM25Scorer {
    fn default() -> Self {
        BM25Scorer {
            k1: 1.2,
            b: 0.75,
        }
    }
}

impl BM25Scorer {
    /// IDF: ln((N - df + 0.5) / (df + 0.5) + 1), never negative
    pub fn idf(doc_freq: u32, total_docs: usize) -> f32 {
        let n = total_docs as f32;
        let df = doc_freq as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }
}

impl Scorer for BM25Scorer {
    fn score(&self, posting: &Posting, term_stats: &TermStats, doc_stats: &DocStats) -> f32 {
        let tf = posting.term_freq as f32;
        let doc_len = doc_stats.doc_length as f32;
        let length_ratio = if doc_stats.avg_doc_length > 0.0 {
            doc_len / doc_stats.avg_doc_length
        } else {
            1.0
        };

        let idf = Self::idf(term_stats.doc_freq, doc_stats.total_docs);
        let numerator = idf * tf * (self.k1 + 1.0);
        let denominator = tf + self.k1 * (1.0 - self.b + self.b * length_ratio);

        numerator / denominator
    }

    fn name(&self) -> &str {
        "bm25"
    }
}
