use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Instant;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock, RwLockUpgradableReadGuard, RwLockWriteGuard};
use rayon::prelude::*;
use crate::analysis::analyzer::Analyzer;
use crate::core::config::{Config, DuplicatePolicy};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Document, DocumentId, IndexInfo, IndexState};
use crate::index::document_store::DocumentStore;
use crate::index::posting_store::{PostingStore, PreparedPostings};
use crate::scoring::scorer::scorer_from_config;
use crate::search::query_engine::QueryEngine;
use crate::search::results::{SearchHit, SearchResults};
use crate::storage::file_lock::FileLock;
use crate::storage::layout::StorageLayout;
use crate::storage::snapshot::{read_snapshot, write_snapshot, LoadedSnapshot};
use crate::storage::wal::{Operation, SyncMode, WalEntry, WAL};

/// Everything a reader needs, swapped as one unit under the write lock.
struct IndexInner {
    documents: DocumentStore,
    postings: PostingStore,
    version: u64,
    last_updated: DateTime<Utc>,
}

impl IndexInner {
    fn empty() -> Self {
        IndexInner {
            documents: DocumentStore::new(),
            postings: PostingStore::new(),
            version: 1,
            last_updated: Utc::now(),
        }
    }

    fn upsert(&mut self, document: Document, prepared: PreparedPostings, version: u64, timestamp: DateTime<Utc>) {
        let length = prepared.token_count;
        self.postings.index_prepared(prepared);
        self.documents.put(document, length);
        self.version = version;
        self.last_updated = timestamp;
    }

    fn remove(&mut self, id: &DocumentId, version: u64, timestamp: DateTime<Utc>) {
        self.postings.remove_document(id);
        self.documents.delete(id);
        self.version = version;
        self.last_updated = timestamp;
    }

    fn replay(&mut self, analyzer: &Analyzer, entry: WalEntry) -> Result<()> {
        match entry.operation {
            Operation::Upsert(document) => {
                let tokens = analyzer.analyze(&document.content);
                let prepared = PreparedPostings::from_tokens(document.id.clone(), &tokens);
                self.upsert(document, prepared, entry.version, entry.timestamp);
            }
            Operation::Remove(id) => self.remove(&id, entry.version, entry.timestamp),
            Operation::Rebuild => {
                let never = AtomicBool::new(false);
                *self = self.regenerate(analyzer, &never, entry.version, entry.timestamp)?;
            }
        }
        Ok(())
    }

    /// Fresh stores holding the same documents, re-analyzed. Analysis runs in
    /// parallel; assembly happens in id order and checks `cancel` between
    /// documents.
    fn regenerate(
        &self,
        analyzer: &Analyzer,
        cancel: &AtomicBool,
        version: u64,
        timestamp: DateTime<Utc>,
    ) -> Result<IndexInner> {
        let cancelled = || Error::new(ErrorKind::Internal, "rebuild cancelled".to_string());

        let stored: Vec<_> = self.documents.list().collect();
        let prepared: Vec<PreparedPostings> = stored
            .par_iter()
            .map(|stored| {
                if cancel.load(Ordering::Relaxed) {
                    return Err(cancelled());
                }
                let tokens = analyzer.analyze(&stored.document.content);
                Ok(PreparedPostings::from_tokens(stored.document.id.clone(), &tokens))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut documents = DocumentStore::new();
        let mut postings = PostingStore::new();
        for (stored, prepared) in stored.into_iter().zip(prepared) {
            if cancel.load(Ordering::Relaxed) {
                return Err(cancelled());
            }
            documents.put(stored.document.clone(), prepared.token_count);
            postings.index_prepared(prepared);
        }

        Ok(IndexInner {
            documents,
            postings,
            version,
            last_updated: timestamp,
        })
    }
}

impl From<LoadedSnapshot> for IndexInner {
    fn from(snapshot: LoadedSnapshot) -> Self {
        IndexInner {
            documents: snapshot.documents,
            postings: snapshot.postings,
            version: snapshot.version,
            last_updated: snapshot.last_updated,
        }
    }
}

/// On-disk side of a persistent index.
struct Persistence {
    layout: StorageLayout,
    wal: WAL,
    sync_mode: SyncMode,
    snapshots_retained: usize,
    checkpoint_interval: u64,
    _lock: FileLock,
}

impl Persistence {
    fn log(&mut self, version: u64, timestamp: DateTime<Utc>, operation: Operation) -> Result<()> {
        self.wal.append(&WalEntry { version, timestamp, operation })
    }

    fn checkpoint_due(&self) -> bool {
        self.checkpoint_interval > 0 && self.wal.records() >= self.checkpoint_interval
    }

    fn write_snapshot(&self, inner: &IndexInner) -> Result<()> {
        write_snapshot(&self.layout, inner.version, inner.last_updated, &inner.documents, &inner.postings)
    }

    /// Start a fresh WAL for `version` and drop files no retained snapshot needs.
    fn rotate(&mut self, version: u64) -> Result<()> {
        self.wal.sync()?;
        self.wal = WAL::create(&self.layout, version, self.sync_mode)?;
        self.prune()
    }

    fn prune(&self) -> Result<()> {
        let snapshots = self.layout.list_snapshots()?;
        let keep_from = snapshots.len().saturating_sub(self.snapshots_retained);
        for version in &snapshots[..keep_from] {
            fs::remove_file(self.layout.snapshot_path(*version))?;
        }

        let Some(oldest_kept) = snapshots.get(keep_from) else {
            return Ok(());
        };
        for base in self.layout.list_wals()? {
            if base < *oldest_kept && base != self.wal.base_version {
                fs::remove_file(self.layout.wal_path(base))?;
            }
        }
        Ok(())
    }

    fn checkpoint(&mut self, inner: &IndexInner) -> Result<()> {
        self.write_snapshot(inner)?;
        self.rotate(inner.version)
    }

    /// Make a rebuilt generation durable before it goes live.
    ///
    /// The WAL marker is the commit point: it replays as a rebuild, so
    /// versions stay contiguous even when recovery has to start from an
    /// older snapshot. If the snapshot cannot be written the marker is taken
    /// back; if it cannot be taken back the rebuild counts as committed.
    fn commit_rebuild(&mut self, rebuilt: &IndexInner) -> Result<()> {
        let rollback_to = self.wal.position;
        self.log(rebuilt.version, rebuilt.last_updated, Operation::Rebuild)?;

        if let Err(e) = self.write_snapshot(rebuilt) {
            return match self.wal.truncate(rollback_to) {
                Ok(()) => Err(e),
                Err(undo) => {
                    tracing::warn!(
                        "Rebuild marker v{} could not be taken back ({}), committing without snapshot: {}",
                        rebuilt.version,
                        undo,
                        e
                    );
                    Ok(())
                }
            };
        }

        if let Err(e) = self.rotate(rebuilt.version) {
            tracing::warn!("WAL rotation after rebuild failed, keeping previous WAL: {}", e);
        }
        Ok(())
    }
}

impl Drop for Persistence {
    fn drop(&mut self) {
        if let Err(e) = self.wal.sync() {
            tracing::warn!("Failed to sync WAL {:?} on close: {}", self.wal.path, e);
        }
    }
}

/// Counters beyond [`IndexInfo`], for monitoring.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub document_count: usize,
    pub term_count: usize,
    pub average_document_length: f32,
    pub version: u64,
    pub state: IndexState,
    pub persistent: bool,
}

/// Flips the index back to `Ready` however the rebuild ends.
struct RebuildingState<'a>(&'a AtomicU8);

impl<'a> RebuildingState<'a> {
    fn enter(state: &'a AtomicU8) -> Self {
        state.store(IndexState::Rebuilding.as_u8(), Ordering::Release);
        RebuildingState(state)
    }
}

impl Drop for RebuildingState<'_> {
    fn drop(&mut self) {
        self.0.store(IndexState::Ready.as_u8(), Ordering::Release);
    }
}

/// Single-index search core.
///
/// Structural mutations (`add`, `remove`, `update`, `rebuild`, `checkpoint`)
/// are serialized through the upgradable read lock; each one only takes the
/// exclusive lock for the in-memory apply, so readers observe either the
/// state before or the state after a mutation, never a mix.
pub struct IndexManager {
    config: Config,
    analyzer: Arc<Analyzer>,
    query_engine: QueryEngine,
    inner: RwLock<IndexInner>,
    state: AtomicU8,
    persistence: Option<Mutex<Persistence>>,
}

impl IndexManager {
    /// Memory-only index with default configuration.
    pub fn in_memory() -> Self {
        let config = Config::default();
        let analyzer = Arc::new(Analyzer::from_config(&config.analyzer));
        Self::assemble(config, analyzer, IndexInner::empty(), None)
    }

    /// Open the index described by `config`, recovering persisted state when
    /// `storage_path` is set.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let analyzer = Arc::new(Analyzer::from_config(&config.analyzer));

        let Some(path) = config.storage_path.clone() else {
            return Ok(Self::assemble(config, analyzer, IndexInner::empty(), None));
        };

        let (inner, persistence) = Self::recover(&config, &analyzer, &path)?;
        Ok(Self::assemble(config, analyzer, inner, Some(persistence)))
    }

    fn assemble(
        config: Config,
        analyzer: Arc<Analyzer>,
        inner: IndexInner,
        persistence: Option<Persistence>,
    ) -> Self {
        let query_engine = QueryEngine::new(analyzer.clone(), scorer_from_config(&config.scoring));
        IndexManager {
            config,
            analyzer,
            query_engine,
            inner: RwLock::new(inner),
            state: AtomicU8::new(IndexState::Ready.as_u8()),
            persistence: persistence.map(Mutex::new),
        }
    }

    // 1. Lock the directory
    // 2. Load the newest snapshot that passes its checksum and cross-checks
    // 3. Replay every WAL record newer than that snapshot, in version order
    // 4. Checkpoint if anything had to be repaired or replayed
    fn recover(config: &Config, analyzer: &Analyzer, path: &Path) -> Result<(IndexInner, Persistence)> {
        let start = Instant::now();
        let layout = StorageLayout::new(path.to_path_buf())?;
        let lock = FileLock::acquire(&layout)?;

        let snapshots = layout.list_snapshots()?;
        let mut loaded = None;
        let mut rejected = Vec::new();
        for &version in snapshots.iter().rev() {
            match read_snapshot(&layout, version) {
                Ok(snapshot) => {
                    loaded = Some(snapshot);
                    break;
                }
                Err(e) => {
                    tracing::warn!("Rejected snapshot v{}: {}", version, e);
                    rejected.push(version);
                }
            }
        }
        if loaded.is_none() && !snapshots.is_empty() {
            return Err(Error::corrupted(format!(
                "none of the {} snapshots in {:?} is readable",
                snapshots.len(),
                layout.snapshots_dir
            )));
        }
        // Keep bad snapshots for inspection, out of the way of the next open
        for version in &rejected {
            let path = layout.snapshot_path(*version);
            fs::rename(&path, path.with_extension("bin.corrupt"))?;
        }
        let highest_rejected = rejected.first().copied();

        let fresh = loaded.is_none();
        let mut inner = loaded.map(IndexInner::from).unwrap_or_else(IndexInner::empty);
        let snapshot_version = inner.version;

        let wals = layout.list_wals()?;
        let mut replayed = 0u64;
        let mut damaged = false;
        let mut stranded: &[u64] = &[];
        'wals: for (i, &base) in wals.iter().enumerate() {
            let wal_path = layout.wal_path(base);
            let replay = WAL::read_entries(&wal_path)?;
            for entry in replay.entries {
                if entry.version <= inner.version {
                    continue;
                }
                if entry.version != inner.version + 1 {
                    tracing::warn!(
                        "WAL gap: expected v{}, found v{} in {:?}",
                        inner.version + 1,
                        entry.version,
                        wal_path
                    );
                    stranded = &wals[i..];
                    break 'wals;
                }
                inner.replay(analyzer, entry)?;
                replayed += 1;
            }

            if replay.truncated {
                damaged = true;
                // Only the newest WAL can end in a crash-torn frame; older
                // damaged files are left as they are
                if i + 1 == wals.len() {
                    WAL::open(&layout, base, config.sync_mode)?.truncate(replay.valid_len)?;
                    tracing::warn!("Cut torn tail of {:?} at byte {}", wal_path, replay.valid_len);
                }
            }
        }

        // Records past a gap cannot be applied, but they were acknowledged:
        // move them out of the way instead of letting a checkpoint reuse the file
        for &base in stranded {
            let wal_path = layout.wal_path(base);
            tracing::warn!("Setting aside WAL {:?}, its records cannot be replayed", wal_path);
            fs::rename(&wal_path, wal_path.with_extension("log.stranded"))?;
            damaged = true;
        }

        // Versions handed out before a lost snapshot must not be reissued
        if let Some(rejected) = highest_rejected {
            if rejected > inner.version {
                inner.version = rejected;
            }
        }

        let mut persistence = Persistence {
            wal: WAL::open(&layout, snapshot_version, config.sync_mode)?,
            layout,
            sync_mode: config.sync_mode,
            snapshots_retained: config.snapshots_retained,
            checkpoint_interval: config.checkpoint_interval,
            _lock: lock,
        };

        if fresh || replayed > 0 || damaged || highest_rejected.is_some() {
            persistence.checkpoint(&inner)?;
        }

        tracing::info!(
            "Opened index at {:?}: v{} ({} documents, snapshot v{}, {} WAL records replayed) in {:?}",
            path,
            inner.version,
            inner.documents.len(),
            snapshot_version,
            replayed,
            start.elapsed()
        );
        Ok((inner, persistence))
    }

    fn validate(document: &Document) -> Result<()> {
        if document.id.is_blank() {
            return Err(Error::invalid_document("document id must not be empty"));
        }
        if document.content.is_empty() {
            return Err(Error::invalid_document(format!(
                "document '{}' has no content",
                document.id
            )));
        }
        Ok(())
    }

    fn log(&self, version: u64, timestamp: DateTime<Utc>, operation: impl FnOnce() -> Operation) -> Result<()> {
        match &self.persistence {
            Some(persistence) => persistence.lock().log(version, timestamp, operation()),
            None => Ok(()),
        }
    }

    /// Checkpoint once enough WAL records piled up. The mutation that
    /// triggered it is already durable, so a failure here is only logged.
    fn maybe_checkpoint(&self, guard: RwLockWriteGuard<'_, IndexInner>) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let mut persistence = persistence.lock();
        if !persistence.checkpoint_due() {
            return;
        }

        let guard = RwLockWriteGuard::downgrade_to_upgradable(guard);
        if let Err(e) = persistence.checkpoint(&guard) {
            tracing::warn!("Automatic checkpoint at v{} failed: {}", guard.version, e);
        }
    }

    pub fn add_document(&self, document: Document) -> Result<()> {
        let reject_existing = self.config.duplicate_policy == DuplicatePolicy::Reject;
        self.upsert(document, reject_existing)
    }

    /// Replace the document with the same id, inserting it if absent.
    pub fn update_document(&self, document: Document) -> Result<()> {
        self.upsert(document, false)
    }

    fn upsert(&self, document: Document, reject_existing: bool) -> Result<()> {
        Self::validate(&document)?;

        let guard = self.inner.upgradable_read();
        let existed = guard.documents.contains(&document.id);
        if existed && reject_existing {
            return Err(Error::new(
                ErrorKind::AlreadyExists,
                format!("document '{}' already exists", document.id),
            ));
        }

        let tokens = self.analyzer.analyze(&document.content);
        let prepared = PreparedPostings::from_tokens(document.id.clone(), &tokens);
        let version = guard.version + 1;
        let timestamp = Utc::now();
        self.log(version, timestamp, || Operation::Upsert(document.clone()))?;

        let mut inner = RwLockUpgradableReadGuard::upgrade(guard);
        tracing::debug!(
            "{} document '{}' ({} tokens) at v{}",
            if existed { "Updated" } else { "Added" },
            document.id,
            tokens.len(),
            version
        );
        inner.upsert(document, prepared, version, timestamp);
        self.maybe_checkpoint(inner);
        Ok(())
    }

    /// Remove a document. Removing an unknown id is a no-op and does not
    /// bump the version; only a WAL write failure can make this fail.
    pub fn remove_document(&self, id: &str) -> Result<()> {
        let id = DocumentId::from(id);
        let guard = self.inner.upgradable_read();
        if !guard.documents.contains(&id) {
            return Ok(());
        }

        let version = guard.version + 1;
        let timestamp = Utc::now();
        self.log(version, timestamp, || Operation::Remove(id.clone()))?;

        let mut inner = RwLockUpgradableReadGuard::upgrade(guard);
        tracing::debug!("Removed document '{}' at v{}", id, version);
        inner.remove(&id, version, timestamp);
        self.maybe_checkpoint(inner);
        Ok(())
    }

    pub fn rebuild(&self) -> Result<()> {
        self.rebuild_with_cancellation(&AtomicBool::new(false))
    }

    /// Recompute every posting from the stored documents.
    ///
    /// The new stores are built next to the live ones and swapped in only
    /// after they are complete (and, for a persistent index, logged and
    /// snapshotted).
    /// Setting `cancel` aborts between documents; a cancelled or failed
    /// rebuild leaves the index exactly as it was.
    pub fn rebuild_with_cancellation(&self, cancel: &AtomicBool) -> Result<()> {
        let guard = self.inner.upgradable_read();
        let _state = RebuildingState::enter(&self.state);
        let start = Instant::now();

        let result = guard
            .regenerate(&self.analyzer, cancel, guard.version + 1, Utc::now())
            .and_then(|rebuilt| {
                if let Some(persistence) = &self.persistence {
                    persistence.lock().commit_rebuild(&rebuilt)?;
                }
                Ok(rebuilt)
            });
        let rebuilt = match result {
            Ok(rebuilt) => rebuilt,
            Err(e) => {
                tracing::warn!("Rebuild of v{} abandoned: {}", guard.version, e);
                return Err(Error::rebuild_failed(&e));
            }
        };

        let mut inner = RwLockUpgradableReadGuard::upgrade(guard);
        *inner = rebuilt;
        Self::log_rebuilt(&inner, start);
        Ok(())
    }

    fn log_rebuilt(inner: &IndexInner, start: Instant) {
        tracing::info!(
            "Rebuilt index to v{} ({} documents, {} terms) in {:?}",
            inner.version,
            inner.documents.len(),
            inner.postings.term_count(),
            start.elapsed()
        );
    }

    /// Write a snapshot of the current state and truncate the WAL.
    /// A memory-only index has nothing to do.
    pub fn checkpoint(&self) -> Result<()> {
        let Some(persistence) = &self.persistence else {
            return Ok(());
        };
        let guard = self.inner.upgradable_read();
        persistence.lock().checkpoint(&guard)
    }

    pub fn get_index_info(&self) -> IndexInfo {
        let inner = self.inner.read();
        IndexInfo {
            document_count: inner.documents.len(),
            last_updated: inner.last_updated,
            version: inner.version,
        }
    }

    pub fn stats(&self) -> IndexStats {
        let inner = self.inner.read();
        IndexStats {
            document_count: inner.documents.len(),
            term_count: inner.postings.term_count(),
            average_document_length: inner.documents.average_length(),
            version: inner.version,
            state: self.state(),
            persistent: self.persistence.is_some(),
        }
    }

    pub fn state(&self) -> IndexState {
        IndexState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        Ok(self.search_results(query, limit)?.hits)
    }

    /// Like [`IndexManager::search`], with hit counts and timing.
    pub fn search_results(&self, query: &str, limit: usize) -> Result<SearchResults> {
        let inner = self.inner.read();
        self.query_engine.search(&inner.documents, &inner.postings, query, limit)
    }

    pub fn get_document(&self, id: &str) -> Result<Document> {
        let inner = self.inner.read();
        inner.documents
            .get(&DocumentId::from(id))
            .map(|stored| stored.document.clone())
            .ok_or_else(|| Error::not_found(format!("document '{}' not found", id)))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().documents.contains(&DocumentId::from(id))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
