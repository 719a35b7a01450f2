use std::fs;
use std::path::{Path, PathBuf};
use crate::core::error::Result;

/// Directory structure for data files
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,       // Root directory
    pub snapshots_dir: PathBuf,  // Full index snapshots (.bin files)
    pub wal_dir: PathBuf,        // Write-ahead log location
}

impl StorageLayout {
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        let snapshots_dir = base_dir.join("snapshots");
        let wal_dir = base_dir.join("wal");

        fs::create_dir_all(&snapshots_dir)?;
        fs::create_dir_all(&wal_dir)?;

        Ok(StorageLayout {
            base_dir,
            snapshots_dir,
            wal_dir,
        })
    }

    pub fn snapshot_path(&self, version: u64) -> PathBuf {
        self.snapshots_dir.join(format!("snapshot_{:020}.bin", version))
    }

    pub fn snapshot_tmp_path(&self, version: u64) -> PathBuf {
        self.snapshots_dir.join(format!("snapshot_{:020}.bin.tmp", version))
    }

    /// WAL holding the mutations applied after snapshot `base_version`.
    pub fn wal_path(&self, base_version: u64) -> PathBuf {
        self.wal_dir.join(format!("wal_{:020}.log", base_version))
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base_dir.join(".lock")
    }

    /// Snapshot versions on disk, ascending.
    pub fn list_snapshots(&self) -> Result<Vec<u64>> {
        list_sequences(&self.snapshots_dir, "snapshot_", "bin")
    }

    /// WAL base versions on disk, ascending.
    pub fn list_wals(&self) -> Result<Vec<u64>> {
        list_sequences(&self.wal_dir, "wal_", "log")
    }
}

fn list_sequences(dir: &Path, prefix: &str, extension: &str) -> Result<Vec<u64>> {
    let mut sequences = Vec::new();

    if dir.exists() {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some(extension) {
                continue;
            }
            let sequence = path.file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.strip_prefix(prefix))
                .and_then(|digits| digits.parse::<u64>().ok());
            if let Some(sequence) = sequence {
                sequences.push(sequence);
            }
        }
    }

    sequences.sort_unstable();
    Ok(sequences)
}
