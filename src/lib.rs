//! Embeddable full-text search core.
//!
//! Documents go in through [`IndexManager`], get tokenized by an
//! [`analysis::analyzer::Analyzer`], land in an inverted index and come back
//! out as BM25-ranked hits. With a storage path configured every mutation is
//! written to a WAL before it is applied, and periodic snapshots keep
//! recovery short.
//!
//! ```no_run
//! use docdex::{Config, Document, IndexManager};
//!
//! # fn main() -> docdex::Result<()> {
//! let index = IndexManager::open(Config::persistent("/tmp/docdex"))?;
//! index.add_document(Document::new("a", "the quick brown fox"))?;
//! for hit in index.search("fox", 10)? {
//!     println!("{} {:.3}", hit.doc_id, hit.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod storage;
pub mod analysis;
pub mod index;
pub mod scoring;
pub mod search;

pub use crate::core::config::{Config, DuplicatePolicy};
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::index_manager::{IndexManager, IndexStats};
pub use crate::core::types::{Document, DocumentId, FieldValue, IndexInfo, IndexState};
pub use crate::search::results::SearchHit;
