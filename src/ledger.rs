//! Retry ledger for videos that failed a stage.
//!
//! The scan checkpoint moves past failed videos, so without the ledger they
//! are never seen again. When enabled, each failure is recorded here and the
//! video is fed back into the next run until it succeeds or runs out of
//! attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vidrelay_common::{Stage, VideoId, VideoRecord};

use crate::error::LedgerError;

/// One failed video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub record: VideoRecord,
    pub stage: Stage,
    pub error: String,
    pub attempts: u32,
    pub last_attempt_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    entries: Vec<LedgerEntry>,
}

/// JSON-backed ledger of failed videos.
#[derive(Debug)]
pub struct RetryLedger {
    path: PathBuf,
    max_attempts: u32,
    entries: Vec<LedgerEntry>,
}

impl RetryLedger {
    /// Load the ledger at `path`. A missing or corrupt file yields an empty ledger.
    pub fn load(path: impl Into<PathBuf>, max_attempts: u32) -> Self {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<LedgerFile>(&bytes) {
                Ok(file) => file.entries,
                Err(e) => {
                    tracing::warn!("Ignoring corrupt retry ledger {:?}: {}", path, e);
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read retry ledger {:?}: {}", path, e);
                Vec::new()
            }
        };

        Self {
            path,
            max_attempts,
            entries,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records that still have attempts left.
    pub fn due(&self) -> Vec<VideoRecord> {
        self.entries
            .iter()
            .filter(|e| e.attempts < self.max_attempts)
            .map(|e| e.record.clone())
            .collect()
    }

    /// Record a failed attempt. Returns `false` when the video was given up on.
    pub fn record_failure(
        &mut self,
        record: &VideoRecord,
        stage: Stage,
        error: &str,
        at: DateTime<Utc>,
    ) -> bool {
        let attempts = match self.entries.iter_mut().find(|e| e.record.id == record.id) {
            Some(entry) => {
                entry.attempts += 1;
                entry.stage = stage;
                entry.error = error.to_string();
                entry.last_attempt_at = at;
                entry.attempts
            }
            None => {
                self.entries.push(LedgerEntry {
                    record: record.clone(),
                    stage,
                    error: error.to_string(),
                    attempts: 1,
                    last_attempt_at: at,
                });
                1
            }
        };

        if attempts >= self.max_attempts {
            tracing::error!(
                video_id = %record.id,
                %stage,
                attempts,
                "Giving up on video after {} attempts: {}",
                attempts,
                error
            );
            self.entries.retain(|e| e.record.id != record.id);
            return false;
        }

        true
    }

    /// Forget a video that finally succeeded.
    pub fn record_success(&mut self, id: &VideoId) {
        self.entries.retain(|e| &e.record.id != id);
    }

    /// Persist atomically.
    pub fn save(&self) -> Result<(), LedgerError> {
        let file = LedgerFile {
            entries: self.entries.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&file).map_err(|e| LedgerError {
            path: self.path.clone(),
            source: e.into(),
        })?;
        vidrelay_common::paths::write_atomic(&self.path, &bytes).map_err(|source| LedgerError {
            path: self.path.clone(),
            source,
        })
    }
}
