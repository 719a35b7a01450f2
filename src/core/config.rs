use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::analysis::filters::stemmer::StemmerLanguage;
use crate::core::error::{Error, Result};
use crate::storage::wal::SyncMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding snapshots and the WAL. `None` keeps the index in memory only.
    pub storage_path: Option<PathBuf>,
    pub analyzer: AnalyzerConfig,
    pub scoring: ScoringConfig,
    pub sync_mode: SyncMode,
    pub snapshots_retained: usize,
    /// WAL records between automatic checkpoints, 0 disables them.
    pub checkpoint_interval: u64,
    pub duplicate_policy: DuplicatePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub max_token_length: usize,
    pub remove_stop_words: bool,
    pub stemmer: Option<StemmerLanguage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScorerKind {
    Bm25,
    TfIdf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub scorer: ScorerKind,
    pub k1: f32, // term frequency saturation
    pub b: f32,  // length normalization strength
}

/// What `add_document` does when the id is already live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    Upsert,
    Reject,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: None,
            analyzer: AnalyzerConfig::default(),
            scoring: ScoringConfig::default(),
            sync_mode: SyncMode::Immediate,
            snapshots_retained: 2,
            checkpoint_interval: 10_000,
            duplicate_policy: DuplicatePolicy::Upsert,
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            max_token_length: 255,
            remove_stop_words: false,
            stemmer: None,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            scorer: ScorerKind::Bm25,
            k1: 1.2,
            b: 0.75,
        }
    }
}

impl Config {
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Config {
            storage_path: Some(path.into()),
            ..Config::default()
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.analyzer.max_token_length == 0 {
            return Err(Error::invalid_argument("analyzer.max_token_length must be positive"));
        }
        if !(self.scoring.k1 >= 0.0 && self.scoring.k1.is_finite()) {
            return Err(Error::invalid_argument(format!(
                "scoring.k1 must be a finite non-negative number, got {}",
                self.scoring.k1
            )));
        }
        if !(0.0..=1.0).contains(&self.scoring.b) {
            return Err(Error::invalid_argument(format!(
                "scoring.b must be within [0, 1], got {}",
                self.scoring.b
            )));
        }
        if self.snapshots_retained == 0 {
            return Err(Error::invalid_argument("snapshots_retained must be at least 1"));
        }
        Ok(())
    }
}
