use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::core::types::{DocumentId, Document};
use crate::storage::layout::StorageLayout;
use crate::core::error::Result;

/// Largest frame accepted on replay; anything bigger is treated as corruption.
const MAX_ENTRY_BYTES: usize = 64 * 1024 * 1024;
const BATCH_SYNC_BYTES: u64 = 1024 * 1024;

/// Write-ahead log for durability
///
/// Frames are `[u32 len LE][u32 CRC32 LE][bincode WalEntry]`. A record is
/// appended before its mutation is applied in memory.
pub struct WAL {
    pub file: File,
    pub path: PathBuf,
    pub base_version: u64,
    pub position: u64,
    pub sync_mode: SyncMode,
    records: u64,
    unsynced_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    Immediate,  // fsync after every write
    Batch,      // fsync once a megabyte has accumulated
    None,       // Let OS handle it
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Index version this mutation produces.
    pub version: u64,
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    Upsert(Document),
    Remove(DocumentId),
    /// Postings recomputed from the stored documents.
    Rebuild,
}

/// Outcome of reading one WAL file.
#[derive(Debug, Default)]
pub struct WalReplay {
    pub entries: Vec<WalEntry>,
    /// Length of the prefix made of intact frames.
    pub valid_len: u64,
    /// True when reading stopped on a torn or corrupt frame instead of EOF.
    pub truncated: bool,
}

impl WAL {
    /// Open the WAL for `base_version` for appending, keeping existing records.
    pub fn open(storage: &StorageLayout, base_version: u64, sync_mode: SyncMode) -> Result<Self> {
        let path = storage.wal_path(base_version);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let position = file.metadata()?.len();

        Ok(WAL {
            file,
            path,
            base_version,
            position,
            sync_mode,
            records: 0,
            unsynced_bytes: 0,
        })
    }

    /// Start an empty WAL for `base_version`, discarding any previous file.
    pub fn create(storage: &StorageLayout, base_version: u64, sync_mode: SyncMode) -> Result<Self> {
        let path = storage.wal_path(base_version);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        file.sync_all()?;
        drop(file);
        Self::open(storage, base_version, sync_mode)
    }

    pub fn append(&mut self, entry: &WalEntry) -> Result<()> {
        let payload = bincode::serialize(entry)?;
        let crc = crc32fast::hash(&payload);

        let mut frame = Vec::with_capacity(8 + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&payload);

        if let Err(e) = self.write_frame(&frame) {
            // Drop whatever part of the frame reached the file
            let _ = self.file.set_len(self.position);
            return Err(e.into());
        }

        self.position += frame.len() as u64;
        self.records += 1;
        Ok(())
    }

    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.file.write_all(frame)?;
        self.unsynced_bytes += frame.len() as u64;
        match self.sync_mode {
            SyncMode::Immediate => {
                self.file.sync_data()?;
                self.unsynced_bytes = 0;
            }
            SyncMode::Batch if self.unsynced_bytes >= BATCH_SYNC_BYTES => {
                self.file.sync_data()?;
                self.unsynced_bytes = 0;
            }
            _ => {}
        }
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        self.unsynced_bytes = 0;
        Ok(())
    }

    /// Cut the file back to `len` bytes, dropping a torn tail or a record
    /// that has to be taken back.
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        self.file.sync_all()?;
        self.position = len;
        Ok(())
    }

    /// Records appended through this handle.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Read every intact record, stopping at the first torn or corrupt frame.
    pub fn read_entries(path: &Path) -> Result<WalReplay> {
        let mut replay = WalReplay::default();
        if !path.exists() {
            return Ok(replay);
        }

        let mut reader = BufReader::new(File::open(path)?);
        loop {
            let mut header = [0u8; 8];
            match read_full(&mut reader, &mut header)? {
                0 => break,
                8 => {}
                _ => {
                    tracing::warn!("WAL {:?}: torn frame header at byte {}", path, replay.valid_len);
                    replay.truncated = true;
                    break;
                }
            }

            let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
            let stored_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
            if len > MAX_ENTRY_BYTES {
                tracing::warn!("WAL {:?}: implausible frame length {} at byte {}", path, len, replay.valid_len);
                replay.truncated = true;
                break;
            }

            let mut payload = vec![0u8; len];
            if read_full(&mut reader, &mut payload)? != len {
                tracing::warn!("WAL {:?}: torn frame payload at byte {}", path, replay.valid_len);
                replay.truncated = true;
                break;
            }
            if crc32fast::hash(&payload) != stored_crc {
                tracing::warn!("WAL {:?}: CRC mismatch at byte {}", path, replay.valid_len);
                replay.truncated = true;
                break;
            }

            match bincode::deserialize::<WalEntry>(&payload) {
                Ok(entry) => replay.entries.push(entry),
                Err(e) => {
                    tracing::warn!("WAL {:?}: undecodable entry at byte {}: {}", path, replay.valid_len, e);
                    replay.truncated = true;
                    break;
                }
            }
            replay.valid_len += 8 + len as u64;
        }

        Ok(replay)
    }
}

/// Like `read_exact`, but reports how many bytes were available at EOF.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
