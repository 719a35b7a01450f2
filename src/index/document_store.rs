use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::core::types::{Document, DocumentId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub document: Document,
    pub length: u32, // Number of analyzed tokens, used for length normalization
}

/// Live documents keyed by id. Iteration is in id order.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: BTreeMap<DocumentId, StoredDocument>,
    total_length: u64,
}

impl DocumentStore {
    pub fn new() -> Self {
        DocumentStore::default()
    }

    /// Insert or replace, returning the entry that was replaced.
    pub fn put(&mut self, document: Document, length: u32) -> Option<StoredDocument> {
        let replaced = self.documents.insert(
            document.id.clone(),
            StoredDocument { document, length },
        );
        self.total_length += length as u64;
        if let Some(old) = &replaced {
            self.total_length -= old.length as u64;
        }
        replaced
    }

    pub fn get(&self, id: &DocumentId) -> Option<&StoredDocument> {
        self.documents.get(id)
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.documents.contains_key(id)
    }

    /// Returns false when `id` was not present.
    pub fn delete(&mut self, id: &DocumentId) -> bool {
        match self.documents.remove(id) {
            Some(old) => {
                self.total_length -= old.length as u64;
                true
            }
            None => false,
        }
    }

    pub fn list(&self) -> impl Iterator<Item = &StoredDocument> {
        self.documents.values()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn average_length(&self) -> f32 {
        if self.documents.is_empty() {
            return 0.0;
        }
        self.total_length as f32 / self.documents.len() as f32
    }
}
