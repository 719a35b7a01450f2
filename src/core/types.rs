use serde::{Serialize, Deserialize};
use std::collections::HashMap;
use std::fmt;
use chrono::{DateTime, Utc};

/// Caller-assigned document identifier. Ordered lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        DocumentId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        DocumentId(id.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        DocumentId(id)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Date(DateTime<Utc>),
    Boolean(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub content: String,
    pub metadata: HashMap<String, FieldValue>,
}

impl Document {
    pub fn new(id: impl Into<DocumentId>, content: impl Into<String>) -> Self {
        Document {
            id: id.into(),
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.metadata.insert(name.into(), value);
        self
    }

    pub fn add_metadata(&mut self, name: String, value: FieldValue) {
        self.metadata.insert(name, value);
    }

    pub fn get_metadata(&self, name: &str) -> Option<&FieldValue> {
        self.metadata.get(name)
    }
}

/// Point-in-time view of the index counters, read under a single lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub document_count: usize,
    pub last_updated: DateTime<Utc>,
    /// Generation counter, starts at 1 and grows by one per structural change.
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Ready,
    Rebuilding,
}

impl IndexState {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            IndexState::Ready => 0,
            IndexState::Rebuilding => 1,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => IndexState::Rebuilding,
            _ => IndexState::Ready,
        }
    }
}
