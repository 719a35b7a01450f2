use serde::{Deserialize, Serialize};
use crate::core::types::DocumentId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocumentId,
    pub term_freq: u32,       // Term frequency in document
    pub positions: Vec<u32>,  // Token positions, ascending
}

impl Posting {
    /// One position per occurrence, strictly ascending.
    pub fn is_well_formed(&self) -> bool {
        self.term_freq > 0
            && self.term_freq as usize == self.positions.len()
            && self.positions.windows(2).all(|w| w[0] < w[1])
    }
}

/// Posting list for a term
/// Note: Sorted by doc_id for efficient merging
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostingList {
    pub postings: Vec<Posting>,  // Sorted by doc_id
}

impl PostingList {
    pub fn new() -> Self {
        PostingList {
            postings: Vec::new(),
        }
    }

    pub fn add_posting(&mut self, posting: Posting) {
        match self.postings.binary_search_by(|p| p.doc_id.cmp(&posting.doc_id)) {
            Ok(pos) => {
                self.postings[pos] = posting;
            }
            Err(pos) => {
                self.postings.insert(pos, posting);
            }
        }
    }

    /// Returns true when a posting for `doc_id` was present.
    pub fn remove(&mut self, doc_id: &DocumentId) -> bool {
        match self.postings.binary_search_by(|p| p.doc_id.cmp(doc_id)) {
            Ok(pos) => {
                self.postings.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn get(&self, doc_id: &DocumentId) -> Option<&Posting> {
        self.postings
            .binary_search_by(|p| p.doc_id.cmp(doc_id))
            .ok()
            .map(|pos| &self.postings[pos])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Posting> {
        self.postings.iter()
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn doc_freq(&self) -> u32 {
        self.postings.len() as u32
    }

    pub fn total_freq(&self) -> u64 {
        self.postings.iter().map(|p| p.term_freq as u64).sum()
    }

    /// Strictly ascending by doc_id, no duplicates.
    pub fn is_sorted(&self) -> bool {
        self.postings.windows(2).all(|w| w[0].doc_id < w[1].doc_id)
    }
}
