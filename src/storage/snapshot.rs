//! Full-index snapshots.
//!
//! A snapshot holds every stored document, every posting list and the index
//! version. Files are `[bincode payload][magic "DDX1"][u32 CRC32 BE]` and are
//! written to a temp file, fsynced and renamed so a crash never exposes a
//! half-written snapshot under its final name.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, Result};
use crate::core::types::DocumentId;
use crate::index::document_store::{DocumentStore, StoredDocument};
use crate::index::posting::PostingList;
use crate::index::posting_store::PostingStore;
use crate::storage::layout::StorageLayout;

const SNAPSHOT_MAGIC: &[u8; 4] = b"DDX1";
const FORMAT_VERSION: u32 = 1;

/// Borrowed form used for writing, encodes identically to [`SnapshotData`].
#[derive(Serialize)]
struct SnapshotView<'a> {
    format_version: u32,
    version: u64,
    last_updated: DateTime<Utc>,
    documents: Vec<&'a StoredDocument>,
    postings: Vec<(&'a str, &'a PostingList)>,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotData {
    pub format_version: u32,
    pub version: u64,
    pub last_updated: DateTime<Utc>,
    pub documents: Vec<StoredDocument>,
    pub postings: Vec<(String, PostingList)>,
}

/// Stores rebuilt from a snapshot, already cross-checked.
pub struct LoadedSnapshot {
    pub version: u64,
    pub last_updated: DateTime<Utc>,
    pub documents: DocumentStore,
    pub postings: PostingStore,
}

pub fn write_snapshot(
    storage: &StorageLayout,
    version: u64,
    last_updated: DateTime<Utc>,
    documents: &DocumentStore,
    postings: &PostingStore,
) -> Result<()> {
    let view = SnapshotView {
        format_version: FORMAT_VERSION,
        version,
        last_updated,
        documents: documents.list().collect(),
        postings: postings.lists(),
    };
    let payload = bincode::serialize(&view)?;
    let crc = crc32fast::hash(&payload);

    let tmp_path = storage.snapshot_tmp_path(version);
    let path = storage.snapshot_path(version);
    let written = write_file(&tmp_path, &payload, crc).and_then(|()| fs::rename(&tmp_path, &path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    sync_dir(storage)?;

    tracing::info!(
        "Saved snapshot v{} ({} documents, {} terms, {} bytes, CRC32={:#010x})",
        version,
        documents.len(),
        postings.term_count(),
        payload.len(),
        crc
    );
    Ok(())
}

fn write_file(path: &Path, payload: &[u8], crc: u32) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(payload)?;
    file.write_all(SNAPSHOT_MAGIC)?;
    file.write_all(&crc.to_be_bytes())?;
    file.sync_all()
}

#[cfg(unix)]
fn sync_dir(storage: &StorageLayout) -> Result<()> {
    File::open(&storage.snapshots_dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_storage: &StorageLayout) -> Result<()> {
    Ok(())
}

pub fn read_snapshot(storage: &StorageLayout, version: u64) -> Result<LoadedSnapshot> {
    let path = storage.snapshot_path(version);
    let raw = fs::read(&path)?;

    if raw.len() < 8 || &raw[raw.len() - 8..raw.len() - 4] != SNAPSHOT_MAGIC {
        return Err(Error::corrupted(format!("snapshot {:?} has no checksum footer", path)));
    }
    let payload = &raw[..raw.len() - 8];
    let stored_crc = u32::from_be_bytes([
        raw[raw.len() - 4],
        raw[raw.len() - 3],
        raw[raw.len() - 2],
        raw[raw.len() - 1],
    ]);
    let computed_crc = crc32fast::hash(payload);
    if computed_crc != stored_crc {
        return Err(Error::corrupted(format!(
            "snapshot CRC32 mismatch: expected {:#010x}, got {:#010x} in {:?}",
            stored_crc, computed_crc, path
        )));
    }

    let data: SnapshotData = bincode::deserialize(payload)?;
    if data.format_version != FORMAT_VERSION {
        return Err(Error::corrupted(format!(
            "unsupported snapshot format {} in {:?}",
            data.format_version, path
        )));
    }
    if data.version != version {
        return Err(Error::corrupted(format!(
            "snapshot {:?} claims version {}",
            path, data.version
        )));
    }

    restore(data)
}

/// Rebuild both stores and check that they agree with each other.
fn restore(data: SnapshotData) -> Result<LoadedSnapshot> {
    let postings = PostingStore::from_lists(data.postings)?;

    let mut documents = DocumentStore::new();
    for stored in data.documents {
        let id = stored.document.id.clone();
        if id.is_blank() {
            return Err(Error::corrupted("snapshot contains a document with an empty id"));
        }
        if documents.put(stored.document, stored.length).is_some() {
            return Err(Error::corrupted(format!("duplicate document '{}' in snapshot", id)));
        }
    }

    // Sum of term frequencies must equal the stored token count
    let mut frequency_totals: HashMap<&DocumentId, u64> = HashMap::new();
    for (_, list) in postings.lists() {
        for posting in list.iter() {
            *frequency_totals.entry(&posting.doc_id).or_insert(0) += posting.term_freq as u64;
        }
    }
    for (doc_id, total) in &frequency_totals {
        let stored = documents.get(doc_id).ok_or_else(|| {
            Error::corrupted(format!("postings reference missing document '{}'", doc_id))
        })?;
        if stored.length as u64 != *total {
            return Err(Error::corrupted(format!(
                "document '{}' has length {} but {} indexed occurrences",
                doc_id, stored.length, total
            )));
        }
    }
    if let Some(orphan) = documents.list().find(|d| d.length > 0 && !frequency_totals.contains_key(&d.document.id)) {
        return Err(Error::corrupted(format!(
            "document '{}' has no postings",
            orphan.document.id
        )));
    }

    Ok(LoadedSnapshot {
        version: data.version,
        last_updated: data.last_updated,
        documents,
        postings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::Analyzer;
    use crate::core::error::ErrorKind;
    use crate::core::types::Document;

    fn stores() -> (DocumentStore, PostingStore) {
        let analyzer = Analyzer::standard();
        let mut documents = DocumentStore::new();
        let mut postings = PostingStore::new();
        for (id, text) in [("a", "the quick brown fox"), ("b", "the lazy dog"), ("c", "...")] {
            let doc = Document::new(id, text);
            let tokens = analyzer.analyze(text);
            postings.index(&doc.id, &tokens);
            documents.put(doc, tokens.len() as u32);
        }
        (documents, postings)
    }

    fn layout() -> (tempfile::TempDir, StorageLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        (dir, layout)
    }

    #[test]
    fn test_write_then_read() {
        let (_dir, layout) = layout();
        let (documents, postings) = stores();
        let now = Utc::now();
        write_snapshot(&layout, 7, now, &documents, &postings).unwrap();

        let loaded = read_snapshot(&layout, 7).unwrap();
        assert_eq!(loaded.version, 7);
        assert_eq!(loaded.last_updated, now);
        assert_eq!(loaded.documents.len(), 3);
        assert_eq!(loaded.postings.lists(), postings.lists());
        assert!(!layout.snapshot_tmp_path(7).exists());
    }

    #[test]
    fn test_failed_write_leaves_no_temp_file() {
        let (_dir, layout) = layout();
        let (documents, postings) = stores();
        // A directory squatting on the final name makes the rename fail
        fs::create_dir(layout.snapshot_path(4)).unwrap();
        fs::write(layout.snapshot_path(4).join("occupied"), b"x").unwrap();

        assert!(write_snapshot(&layout, 4, Utc::now(), &documents, &postings).is_err());
        assert!(!layout.snapshot_tmp_path(4).exists());

        // And when the temp file itself cannot be created
        fs::remove_dir_all(&layout.snapshots_dir).unwrap();
        assert!(write_snapshot(&layout, 5, Utc::now(), &documents, &postings).is_err());
        assert!(!layout.snapshot_tmp_path(5).exists());
    }

    #[test]
    fn test_flipped_byte_detected() {
        let (_dir, layout) = layout();
        let (documents, postings) = stores();
        write_snapshot(&layout, 2, Utc::now(), &documents, &postings).unwrap();

        let path = layout.snapshot_path(2);
        let mut bytes = fs::read(&path).unwrap();
        bytes[10] ^= 0x55;
        fs::write(&path, bytes).unwrap();

        let err = read_snapshot(&layout, 2).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
    }

    #[test]
    fn test_truncated_file_detected() {
        let (_dir, layout) = layout();
        let (documents, postings) = stores();
        write_snapshot(&layout, 2, Utc::now(), &documents, &postings).unwrap();

        let path = layout.snapshot_path(2);
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        assert!(read_snapshot(&layout, 2).is_err());
    }

    #[test]
    fn test_renamed_file_version_mismatch() {
        let (_dir, layout) = layout();
        let (documents, postings) = stores();
        write_snapshot(&layout, 2, Utc::now(), &documents, &postings).unwrap();
        fs::rename(layout.snapshot_path(2), layout.snapshot_path(9)).unwrap();

        let err = read_snapshot(&layout, 9).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
    }

    #[test]
    fn test_postings_without_document_rejected() {
        let (documents, postings) = stores();
        let data = SnapshotData {
            format_version: FORMAT_VERSION,
            version: 3,
            last_updated: Utc::now(),
            documents: documents.list()
                .filter(|d| d.document.id.as_str() != "a")
                .cloned()
                .collect(),
            postings: postings.lists()
                .into_iter()
                .map(|(term, list)| (term.to_string(), list.clone()))
                .collect(),
        };
        let err = restore(data).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
    }
}
