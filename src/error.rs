//! Error types for each pipeline stage.
//!
//! Enumeration, checkpoint and ledger errors are fatal to a run. Fetch,
//! transform and publish errors belong to a single video and are caught at
//! the orchestrator boundary.

use std::path::PathBuf;
use vidrelay_common::VideoId;

/// Credential acquisition failed.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no credentials at {}: run the authorization flow once and save the authorized-user JSON there, or set VIDRELAY_ACCESS_TOKEN", path.display())]
    MissingCredentials { path: PathBuf },

    #[error("invalid credential file {}: {message}", path.display())]
    InvalidCredentials { path: PathBuf, message: String },

    #[error("token refresh failed: {0}")]
    Refresh(String),

    #[error("failed to persist refreshed credentials: {0}")]
    Persist(#[from] vidrelay_common::Error),
}

/// Listing new videos failed. Always fatal: there is no partial result.
#[derive(Debug, thiserror::Error)]
pub enum EnumerationError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode API response: {0}")]
    Decode(String),

    #[error("listing did not end within {pages} pages; raise pipeline.max_pages or move the checkpoint forward")]
    Backlog { pages: u32 },
}

/// Downloading one video failed.
#[derive(Debug, thiserror::Error)]
#[error("failed to fetch {video_id}: {cause}")]
pub struct FetchError {
    pub video_id: VideoId,
    pub cause: String,
}

impl FetchError {
    pub fn new(video_id: VideoId, cause: impl Into<String>) -> Self {
        Self {
            video_id,
            cause: cause.into(),
        }
    }
}

/// Transforming one video failed.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("overlay unavailable: {0}")]
    Overlay(#[source] vidrelay_av::Error),

    #[error("source {} has no video stream or zero duration", path.display())]
    EmptySource { path: PathBuf },

    #[error("media processing failed: {0}")]
    Media(#[from] vidrelay_av::Error),

    #[error("output mismatch: {0}")]
    OutputMismatch(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transform task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Publishing one video failed.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upload rejected with {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("upload session was not returned by the server")]
    MissingSession,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persisting the checkpoint failed.
#[derive(Debug, thiserror::Error)]
#[error("failed to write checkpoint {}: {source}", path.display())]
pub struct CheckpointError {
    pub path: PathBuf,
    #[source]
    pub source: vidrelay_common::Error,
}

/// Persisting the retry ledger failed.
#[derive(Debug, thiserror::Error)]
#[error("failed to write retry ledger {}: {source}", path.display())]
pub struct LedgerError {
    pub path: PathBuf,
    #[source]
    pub source: vidrelay_common::Error,
}

/// A run aborted before completing.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("enumeration failed: {0}")]
    Enumeration(#[from] EnumerationError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
