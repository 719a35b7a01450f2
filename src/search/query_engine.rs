use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use crate::analysis::analyzer::Analyzer;
use crate::core::error::{Error, Result};
use crate::core::types::DocumentId;
use crate::index::document_store::DocumentStore;
use crate::index::posting_store::PostingStore;
use crate::scoring::scorer::{DocStats, Scorer, TermStats};
use crate::search::results::{SearchHit, SearchResults, TopKCollector};

/// Ranks documents against free-text queries.
///
/// Stateless apart from the analyzer and scorer: the caller hands in the
/// stores it read-locked, so every query sees one consistent generation.
pub struct QueryEngine {
    analyzer: Arc<Analyzer>,
    scorer: Box<dyn Scorer>,
}

impl QueryEngine {
    pub fn new(analyzer: Arc<Analyzer>, scorer: Box<dyn Scorer>) -> Self {
        QueryEngine { analyzer, scorer }
    }

    /// Distinct query terms in order of first appearance.
    pub fn query_terms(&self, query: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.analyzer.analyze(query)
            .into_iter()
            .filter(|token| seen.insert(token.text.clone()))
            .map(|token| token.text)
            .collect()
    }

    pub fn search(
        &self,
        documents: &DocumentStore,
        postings: &PostingStore,
        query: &str,
        limit: usize,
    ) -> Result<SearchResults> {
        if limit == 0 {
            return Err(Error::invalid_argument("search limit must be greater than zero"));
        }

        let start = Instant::now();
        let terms = self.query_terms(query);
        let total_docs = documents.len();
        let avg_doc_length = documents.average_length();

        let mut scores: HashMap<&DocumentId, f32> = HashMap::new();
        if total_docs > 0 {
            for term in &terms {
                let Some(list) = postings.lookup(term) else {
                    continue;
                };
                let term_stats = TermStats { doc_freq: list.doc_freq() };

                for posting in list.iter() {
                    let Some(stored) = documents.get(&posting.doc_id) else {
                        continue;
                    };
                    let doc_stats = DocStats {
                        doc_length: stored.length,
                        avg_doc_length,
                        total_docs,
                    };
                    let score = self.scorer.score(posting, &term_stats, &doc_stats);
                    *scores.entry(&posting.doc_id).or_insert(0.0) += score;
                }
            }
        }

        let mut collector = TopKCollector::new(limit.min(scores.len()));
        for (doc_id, score) in scores {
            collector.collect(SearchHit { doc_id: doc_id.clone(), score });
        }

        let total_hits = collector.total_collected;
        let hits = collector.get_results();
        let max_score = hits.first().map(|hit| hit.score).unwrap_or(0.0);

        Ok(SearchResults {
            hits,
            total_hits,
            max_score,
            took_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::core::types::Document;
    use crate::scoring::scorer::BM25Scorer;

    struct Fixture {
        documents: DocumentStore,
        postings: PostingStore,
        engine: QueryEngine,
    }

    impl Fixture {
        fn new() -> Self {
            let analyzer = Arc::new(Analyzer::standard());
            Fixture {
                documents: DocumentStore::new(),
                postings: PostingStore::new(),
                engine: QueryEngine::new(analyzer, Box::new(BM25Scorer::default())),
            }
        }

        fn add(&mut self, id: &str, text: &str) {
            let doc = Document::new(id, text);
            let tokens = Analyzer::standard().analyze(text);
            self.postings.index(&doc.id, &tokens);
            self.documents.put(doc, tokens.len() as u32);
        }

        fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
            self.engine.search(&self.documents, &self.postings, query, limit).unwrap().hits
        }
    }

    fn ids(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.doc_id.as_str()).collect()
    }

    #[test]
    fn test_zero_limit_rejected() {
        let fixture = Fixture::new();
        let err = fixture.engine
            .search(&fixture.documents, &fixture.postings, "anything", 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_only_matching_documents_returned() {
        let mut fixture = Fixture::new();
        fixture.add("a", "the quick brown fox");
        fixture.add("b", "the lazy dog");
        let hits = fixture.search("quick", 10);
        assert_eq!(ids(&hits), vec!["a"]);
        assert!(hits[0].score > 0.0);
    }

    #[test]
    fn test_shorter_document_ranks_first_for_common_term() {
        let mut fixture = Fixture::new();
        fixture.add("a", "the quick brown fox");
        fixture.add("b", "the lazy dog");
        let hits = fixture.search("the", 10);
        assert_eq!(ids(&hits), vec!["b", "a"]);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_equal_scores_ordered_by_id() {
        let mut fixture = Fixture::new();
        fixture.add("c", "same words");
        fixture.add("a", "same words");
        fixture.add("b", "same words");
        let hits = fixture.search("same", 2);
        assert_eq!(ids(&hits), vec!["a", "b"]);
    }

    #[test]
    fn test_repeated_query_terms_count_once() {
        let mut fixture = Fixture::new();
        fixture.add("a", "rust language");
        fixture.add("b", "python language");
        let once = fixture.search("rust", 10);
        let twice = fixture.search("rust RUST rust", 10);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_more_matching_terms_rank_higher() {
        let mut fixture = Fixture::new();
        fixture.add("a", "rust memory safety");
        fixture.add("b", "rust programming");
        fixture.add("c", "java programming");
        let hits = fixture.search("rust memory", 10);
        assert_eq!(ids(&hits)[0], "a");
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_empty_query_and_empty_index() {
        let mut fixture = Fixture::new();
        assert!(fixture.search("anything", 5).is_empty());
        fixture.add("a", "content");
        assert!(fixture.search("   ...   ", 5).is_empty());
    }

    #[test]
    fn test_huge_limit_returns_all_matches() {
        let mut fixture = Fixture::new();
        fixture.add("a", "the quick brown fox");
        fixture.add("b", "the lazy dog");
        assert_eq!(ids(&fixture.search("the", usize::MAX)), vec!["b", "a"]);
        assert_eq!(ids(&fixture.search("quick", 1usize << 50)), vec!["a"]);
    }

    #[test]
    fn test_total_hits_counts_before_limit() {
        let mut fixture = Fixture::new();
        for i in 0..5 {
            fixture.add(&format!("doc{}", i), "shared term");
        }
        let results = fixture.engine
            .search(&fixture.documents, &fixture.postings, "shared", 2)
            .unwrap();
        assert_eq!(results.total_hits, 5);
        assert_eq!(results.hits.len(), 2);
        assert_eq!(results.max_score, results.hits[0].score);
    }
}
