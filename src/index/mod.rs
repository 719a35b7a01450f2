pub mod posting;
pub mod posting_store;
pub mod document_store;
