use std::collections::{BTreeMap, HashMap};
use crate::analysis::token::Token;
use crate::core::error::{Error, Result};
use crate::core::types::DocumentId;
use crate::index::posting::{Posting, PostingList};

/// Postings of one document, grouped by term, ready to be merged into a store.
///
/// Building these is the expensive part of indexing and touches no shared
/// state, so rebuild prepares them in parallel.
#[derive(Debug, Clone)]
pub struct PreparedPostings {
    pub doc_id: DocumentId,
    pub token_count: u32,
    pub terms: Vec<(String, Posting)>, // Sorted by term
}

impl PreparedPostings {
    pub fn from_tokens(doc_id: DocumentId, tokens: &[Token]) -> Self {
        let mut term_positions: BTreeMap<&str, Vec<u32>> = BTreeMap::new();
        for token in tokens {
            term_positions.entry(token.text.as_str())
                .or_insert_with(Vec::new)
                .push(token.position);
        }

        let terms = term_positions.into_iter()
            .map(|(term, positions)| {
                let posting = Posting {
                    doc_id: doc_id.clone(),
                    term_freq: positions.len() as u32,
                    positions,
                };
                (term.to_string(), posting)
            })
            .collect();

        PreparedPostings {
            doc_id,
            token_count: tokens.len() as u32,
            terms,
        }
    }
}

/// Inverted index: term → posting list, plus a forward map so a document's
/// postings can be removed without scanning every term.
#[derive(Debug, Default)]
pub struct PostingStore {
    postings: HashMap<String, PostingList>,
    doc_terms: HashMap<DocumentId, Vec<String>>,
}

impl PostingStore {
    pub fn new() -> Self {
        PostingStore::default()
    }

    /// Index `tokens` for `doc_id`, replacing every posting the document had before.
    pub fn index(&mut self, doc_id: &DocumentId, tokens: &[Token]) -> usize {
        self.index_prepared(PreparedPostings::from_tokens(doc_id.clone(), tokens))
    }

    /// Returns the number of distinct terms indexed.
    pub fn index_prepared(&mut self, prepared: PreparedPostings) -> usize {
        self.remove_document(&prepared.doc_id);

        let mut terms = Vec::with_capacity(prepared.terms.len());
        for (term, posting) in prepared.terms {
            self.postings.entry(term.clone())
                .or_insert_with(PostingList::new)
                .add_posting(posting);
            terms.push(term);
        }

        let distinct = terms.len();
        if !terms.is_empty() {
            self.doc_terms.insert(prepared.doc_id, terms);
        }
        distinct
    }

    /// Drop `doc_id` from every list it appears in and prune emptied lists.
    pub fn remove_document(&mut self, doc_id: &DocumentId) -> bool {
        let Some(terms) = self.doc_terms.remove(doc_id) else {
            return false;
        };

        for term in terms {
            if let Some(list) = self.postings.get_mut(&term) {
                list.remove(doc_id);
                if list.is_empty() {
                    self.postings.remove(&term);
                }
            }
        }
        true
    }

    pub fn lookup(&self, term: &str) -> Option<&PostingList> {
        self.postings.get(term)
    }

    pub fn doc_freq(&self, term: &str) -> u32 {
        self.lookup(term).map(|list| list.doc_freq()).unwrap_or(0)
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    pub fn contains_document(&self, doc_id: &DocumentId) -> bool {
        self.doc_terms.contains_key(doc_id)
    }

    pub fn terms_of(&self, doc_id: &DocumentId) -> Option<&[String]> {
        self.doc_terms.get(doc_id).map(|terms| terms.as_slice())
    }

    /// Every list, sorted by term, for deterministic snapshots.
    pub fn lists(&self) -> Vec<(&str, &PostingList)> {
        let mut lists: Vec<(&str, &PostingList)> = self.postings.iter()
            .map(|(term, list)| (term.as_str(), list))
            .collect();
        lists.sort_by(|a, b| a.0.cmp(b.0));
        lists
    }

    /// Restore from exported lists, rejecting unsorted or empty ones.
    pub fn from_lists(lists: Vec<(String, PostingList)>) -> Result<Self> {
        let mut store = PostingStore::new();

        for (term, list) in lists {
            if list.is_empty() {
                return Err(Error::corrupted(format!("empty posting list for term '{}'", term)));
            }
            if !list.is_sorted() {
                return Err(Error::corrupted(format!("posting list for term '{}' is not sorted", term)));
            }
            for posting in list.iter() {
                if !posting.is_well_formed() {
                    return Err(Error::corrupted(format!(
                        "malformed posting for '{}' in term '{}': tf {} with positions {:?}",
                        posting.doc_id, term, posting.term_freq, posting.positions
                    )));
                }
                store.doc_terms.entry(posting.doc_id.clone())
                    .or_insert_with(Vec::new)
                    .push(term.clone());
            }
            if store.postings.insert(term.clone(), list).is_some() {
                return Err(Error::corrupted(format!("duplicate posting list for term '{}'", term)));
            }
        }

        Ok(store)
    }
}
