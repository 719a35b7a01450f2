use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use docdex::analysis::filters::stemmer::StemmerLanguage;
use docdex::core::config::{AnalyzerConfig, ScorerKind, ScoringConfig};
use docdex::{Config, Document, ErrorKind, FieldValue, IndexManager, IndexState, SearchHit};

fn ids(hits: &[SearchHit]) -> Vec<&str> {
    hits.iter().map(|hit| hit.doc_id.as_str()).collect()
}

fn fox_and_dog() -> IndexManager {
    let index = IndexManager::in_memory();
    index.add_document(Document::new("a", "the quick brown fox")).unwrap();
    index.add_document(Document::new("b", "the lazy dog")).unwrap();
    index
}

#[test]
fn test_quick_matches_only_fox() {
    let index = fox_and_dog();
    let hits = index.search("quick", 10).unwrap();
    assert_eq!(ids(&hits), vec!["a"]);
    assert!(hits[0].score > 0.0);
}

#[test]
fn test_common_term_prefers_shorter_document() {
    let index = fox_and_dog();
    let hits = index.search("the", 10).unwrap();
    assert_eq!(ids(&hits), vec!["b", "a"]);
    assert!(hits[0].score > hits[1].score);
}

#[test]
fn test_removed_document_disappears_from_results() {
    let index = fox_and_dog();
    index.remove_document("a").unwrap();
    assert!(index.search("quick", 10).unwrap().is_empty());
    assert_eq!(ids(&index.search("the", 10).unwrap()), vec!["b"]);
}

#[test]
fn test_index_info_after_two_adds() {
    let index = fox_and_dog();
    let info = index.get_index_info();
    assert_eq!(info.document_count, 2);
    assert!(info.version >= 2);
}

#[test]
fn test_zero_limit_is_invalid() {
    let index = fox_and_dog();
    let err = index.search("the", 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_limit_caps_results() {
    let index = IndexManager::in_memory();
    for i in 0..20 {
        index.add_document(Document::new(format!("doc{:02}", i), "shared words")).unwrap();
    }
    let results = index.search_results("shared", 5).unwrap();
    assert_eq!(results.hits.len(), 5);
    assert_eq!(results.total_hits, 20);
    assert_eq!(ids(&results.hits), vec!["doc00", "doc01", "doc02", "doc03", "doc04"]);
}

#[test]
fn test_remove_is_idempotent() {
    let index = fox_and_dog();
    index.remove_document("a").unwrap();
    let after_first = index.get_index_info();
    index.remove_document("a").unwrap();
    index.remove_document("never-added").unwrap();
    assert_eq!(index.get_index_info(), after_first);
}

#[test]
fn test_versions_strictly_increase() {
    let index = IndexManager::in_memory();
    let mut last = index.get_index_info().version;
    assert_eq!(last, 1);

    for i in 0..10 {
        index.add_document(Document::new(format!("d{}", i), format!("text number {}", i))).unwrap();
        let version = index.get_index_info().version;
        assert_eq!(version, last + 1);
        last = version;
    }
    index.update_document(Document::new("d3", "changed")).unwrap();
    index.remove_document("d4").unwrap();
    index.rebuild().unwrap();
    assert_eq!(index.get_index_info().version, last + 3);
}

#[test]
fn test_update_replaces_content() {
    let index = fox_and_dog();
    index.update_document(Document::new("a", "a slow green turtle")).unwrap();
    assert!(index.search("fox", 10).unwrap().is_empty());
    assert_eq!(ids(&index.search("turtle", 10).unwrap()), vec!["a"]);
    assert_eq!(index.get_index_info().document_count, 2);
}

#[test]
fn test_metadata_survives() {
    let index = IndexManager::in_memory();
    let doc = Document::new("m", "with metadata")
        .with_metadata("author", FieldValue::Text("ada".into()))
        .with_metadata("rank", FieldValue::Number(3.0));
    index.add_document(doc.clone()).unwrap();

    let stored = index.get_document("m").unwrap();
    assert_eq!(stored, doc);
    assert_eq!(stored.get_metadata("rank"), Some(&FieldValue::Number(3.0)));
}

#[test]
fn test_rebuild_preserves_ranking() {
    let index = IndexManager::in_memory();
    let texts = [
        "rust is a systems programming language",
        "python is a scripting language",
        "the rust compiler checks ownership",
        "garbage collection in java",
        "ownership and borrowing in rust",
        "language design and compilers",
    ];
    for (i, text) in texts.iter().enumerate() {
        index.add_document(Document::new(format!("t{}", i), *text)).unwrap();
    }
    index.update_document(Document::new("t1", "python is a dynamic scripting language")).unwrap();
    index.remove_document("t3").unwrap();

    let queries = ["rust", "language", "rust ownership", "compiler compilers", "java"];
    let before: HashMap<&str, Vec<SearchHit>> = queries.iter()
        .map(|q| (*q, index.search(q, 10).unwrap()))
        .collect();
    let info_before = index.get_index_info();

    index.rebuild().unwrap();

    for query in queries {
        assert_eq!(index.search(query, 10).unwrap(), before[query], "query {:?}", query);
    }
    let info_after = index.get_index_info();
    assert_eq!(info_after.document_count, info_before.document_count);
    assert_eq!(info_after.version, info_before.version + 1);
    assert_eq!(index.state(), IndexState::Ready);
}

#[test]
fn test_cancelled_rebuild_is_rolled_back() {
    let index = fox_and_dog();
    let info = index.get_index_info();
    let err = index.rebuild_with_cancellation(&AtomicBool::new(true)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RebuildFailed);
    assert_eq!(index.get_index_info(), info);
    assert_eq!(ids(&index.search("the", 10).unwrap()), vec!["b", "a"]);
}

#[test]
fn test_stemming_and_stop_words() {
    let config = Config {
        analyzer: AnalyzerConfig {
            remove_stop_words: true,
            stemmer: Some(StemmerLanguage::English),
            ..AnalyzerConfig::default()
        },
        ..Config::default()
    };
    let index = IndexManager::open(config).unwrap();
    index.add_document(Document::new("r", "the dog runs")).unwrap();
    index.add_document(Document::new("w", "the cat walked")).unwrap();

    assert_eq!(ids(&index.search("running", 10).unwrap()), vec!["r"]);
    assert_eq!(ids(&index.search("WALKING", 10).unwrap()), vec!["w"]);
    assert!(index.search("the", 10).unwrap().is_empty());
}

#[test]
fn test_tf_idf_scorer_selectable() {
    let config = Config {
        scoring: ScoringConfig {
            scorer: ScorerKind::TfIdf,
            ..ScoringConfig::default()
        },
        ..Config::default()
    };
    let index = IndexManager::open(config).unwrap();
    index.add_document(Document::new("a", "apple apple banana")).unwrap();
    index.add_document(Document::new("b", "apple banana banana")).unwrap();

    let hits = index.search("apple", 10).unwrap();
    assert_eq!(ids(&hits), vec!["a", "b"]);
    assert!(hits[0].score > hits[1].score);
}

#[test]
fn test_readers_see_monotonic_versions_during_writes() {
    let index = Arc::new(IndexManager::in_memory());
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let index = Arc::clone(&index);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut last_version = 0;
                let mut last_count = 0;
                while !done.load(Ordering::Acquire) {
                    let info = index.get_index_info();
                    assert!(info.version >= last_version);
                    assert!(info.document_count >= last_count);
                    last_version = info.version;
                    last_count = info.document_count;

                    for hit in index.search("payload", 50).unwrap() {
                        assert!(index.contains(hit.doc_id.as_str()));
                    }
                }
            })
        })
        .collect();

    for i in 0..200 {
        index.add_document(Document::new(format!("w{:03}", i), format!("payload {}", i))).unwrap();
    }
    done.store(true, Ordering::Release);
    for reader in readers {
        reader.join().unwrap();
    }

    let info = index.get_index_info();
    assert_eq!(info.document_count, 200);
    assert_eq!(info.version, 201);
}

#[test]
fn test_search_during_rebuild_sees_consistent_state() {
    let index = Arc::new(IndexManager::in_memory());
    for i in 0..300 {
        let text = format!("alpha beta {} gamma {}", i % 7, i % 13);
        index.add_document(Document::new(format!("r{:03}", i), text)).unwrap();
    }
    let baseline = index.search("alpha 3 5", 20).unwrap();

    let rebuilder = {
        let index = Arc::clone(&index);
        thread::spawn(move || {
            for _ in 0..5 {
                index.rebuild().unwrap();
            }
        })
    };
    for _ in 0..200 {
        assert_eq!(index.search("alpha 3 5", 20).unwrap(), baseline);
    }
    rebuilder.join().unwrap();

    assert_eq!(index.get_index_info().version, 301 + 5);
    assert_eq!(index.search("alpha 3 5", 20).unwrap(), baseline);
}

#[test]
fn test_readers_never_see_half_applied_update() {
    let index = Arc::new(IndexManager::in_memory());
    index.add_document(Document::new("x", "old term")).unwrap();
    index.add_document(Document::new("y", "unrelated filler")).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let index = Arc::clone(&index);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    let hits = index.search("old new", 10).unwrap();
                    assert_eq!(ids(&hits), vec!["x"]);
                    assert!(index.contains("x"));
                    let content = index.get_document("x").unwrap().content;
                    assert!(content == "old term" || content == "new term");
                }
            })
        })
        .collect();

    for i in 0..500 {
        let content = if i % 2 == 0 { "new term" } else { "old term" };
        index.update_document(Document::new("x", content)).unwrap();
    }
    done.store(true, Ordering::Release);
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(index.get_document("x").unwrap().content, "old term");
    assert_eq!(index.get_index_info().version, 3 + 500);
}
