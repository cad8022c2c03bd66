//! The scan checkpoint: one timestamp, overwritten after each completed run.
//!
//! Every video published at or before the checkpoint has already been
//! considered. The file holds a single RFC 3339 line and is replaced
//! atomically, so a crash can never leave a half-written value behind.

use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};

use crate::error::CheckpointError;

/// Durable store for the scan checkpoint.
pub trait CheckpointStore: Send + Sync {
    /// The stored checkpoint, or the first-run default. Never fails.
    fn read(&self) -> DateTime<Utc>;

    /// Persist a new checkpoint atomically.
    fn write(&self, at: DateTime<Utc>) -> Result<(), CheckpointError>;
}

/// Checkpoint kept in a single text file.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
    lookback: Duration,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>, lookback: Duration) -> Self {
        Self {
            path: path.into(),
            lookback,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored value, if there is a readable one.
    pub fn stored(&self) -> Option<DateTime<Utc>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read checkpoint {:?}: {}", self.path, e);
                return None;
            }
        };

        match parse_checkpoint(&content) {
            Some(at) => Some(at),
            None => {
                tracing::warn!(
                    "Ignoring unparsable checkpoint {:?}: {:?}",
                    self.path,
                    content.trim()
                );
                None
            }
        }
    }

    /// The checkpoint as of `now`: stored value or `now - lookback`.
    pub fn read_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.stored().unwrap_or_else(|| now - self.lookback)
    }

    /// Forget the stored checkpoint so the next run uses the lookback window.
    pub fn reset(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn read(&self) -> DateTime<Utc> {
        self.read_at(Utc::now())
    }

    fn write(&self, at: DateTime<Utc>) -> Result<(), CheckpointError> {
        let line = format!("{}\n", format_checkpoint(at));
        vidrelay_common::paths::write_atomic(&self.path, line.as_bytes()).map_err(|source| {
            CheckpointError {
                path: self.path.clone(),
                source,
            }
        })?;
        tracing::debug!("Checkpoint written to {:?}: {}", self.path, at);
        Ok(())
    }
}

/// Parse a stored checkpoint line (RFC 3339 with any offset).
pub fn parse_checkpoint(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Format a checkpoint the way it is stored.
pub fn format_checkpoint(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
