//! Core type definitions for the relay pipeline.
//!
//! This module defines the records that flow between pipeline stages. Enums
//! are serialized in snake_case so they read naturally in TOML config and in
//! the persisted retry ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::ids::{RemoteId, VideoId};

/// A video discovered on the source channel.
///
/// Immutable once enumerated; later stages only read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: VideoId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Thumbnail URL or local path.
    #[serde(default)]
    pub thumbnail: Option<String>,
    pub published_at: DateTime<Utc>,
}

/// A media file on local disk, traceable to the video it came from.
///
/// The asset owns its file: dropping it removes the file unless
/// [`LocalAsset::retain`] was called. This makes cleanup hold on every exit
/// path of a pipeline item, including early returns on failure.
#[derive(Debug)]
pub struct LocalAsset {
    path: PathBuf,
    video_id: VideoId,
    retained: bool,
}

impl LocalAsset {
    /// Take ownership of the file at `path`.
    pub fn new(video_id: VideoId, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            video_id,
            retained: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn video_id(&self) -> &VideoId {
        &self.video_id
    }

    /// Keep the file on disk when the asset is dropped.
    pub fn retain(&mut self) {
        self.retained = true;
    }

    pub fn is_retained(&self) -> bool {
        self.retained
    }

    /// Size of the file in bytes, or 0 if it cannot be read.
    pub fn size(&self) -> u64 {
        std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }
}

impl Drop for LocalAsset {
    fn drop(&mut self) {
        if self.retained {
            return;
        }
        // Already gone is fine: a failed stage may never have created it.
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Pipeline stage at which an item can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Download,
    Transform,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download => write!(f, "download"),
            Self::Transform => write!(f, "transform"),
            Self::Publish => write!(f, "publish"),
        }
    }
}

/// Lifecycle of a single video through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ItemState {
    Discovered,
    Downloaded,
    Transformed,
    Published { remote_id: RemoteId },
    Failed { stage: Stage, error: String },
}

impl ItemState {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovered => write!(f, "discovered"),
            Self::Downloaded => write!(f, "downloaded"),
            Self::Transformed => write!(f, "transformed"),
            Self::Published { remote_id } => write!(f, "published ({})", remote_id),
            Self::Failed { stage, error } => write!(f, "failed at {}: {}", stage, error),
        }
    }
}

/// Visibility of an uploaded video on the destination platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
}

impl Visibility {
    /// Value expected by the platform's `privacyStatus` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_local_asset_removes_file_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.mp4");
        std::fs::write(&path, b"data").unwrap();

        let asset = LocalAsset::new(VideoId::from("abc"), &path);
        assert_eq!(asset.size(), 4);
        drop(asset);

        assert!(!path.exists());
    }

    #[test]
    fn test_local_asset_retained_survives_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.mp4");
        std::fs::write(&path, b"data").unwrap();

        let mut asset = LocalAsset::new(VideoId::from("abc"), &path);
        asset.retain();
        assert!(asset.is_retained());
        drop(asset);

        assert!(path.exists());
    }

    #[test]
    fn test_local_asset_missing_file_drop_is_quiet() {
        let asset = LocalAsset::new(VideoId::from("gone"), "/nonexistent/gone.mp4");
        assert_eq!(asset.size(), 0);
        drop(asset);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Download.to_string(), "download");
        assert_eq!(Stage::Transform.to_string(), "transform");
        assert_eq!(Stage::Publish.to_string(), "publish");
    }

    #[test]
    fn test_item_state_outcomes() {
        assert!(!ItemState::Discovered.is_published());
        assert!(ItemState::Published {
            remote_id: RemoteId::new("r1")
        }
        .is_published());
        let failed = ItemState::Failed {
            stage: Stage::Transform,
            error: "boom".into(),
        };
        assert!(!failed.is_published());
        assert_eq!(failed.to_string(), "failed at transform: boom");
    }

    #[test]
    fn test_visibility_serde() {
        let v: Visibility = serde_json::from_str("\"unlisted\"").unwrap();
        assert_eq!(v, Visibility::Unlisted);
        assert_eq!(Visibility::default().as_str(), "public");
    }

    #[test]
    fn test_video_record_defaults_on_deserialize() {
        let json = r#"{"id":"v1","title":"T","published_at":"2024-05-01T10:00:00Z"}"#;
        let record: VideoRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, VideoId::from("v1"));
        assert!(record.tags.is_empty());
        assert!(record.thumbnail.is_none());
        assert_eq!(
            record.published_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
        );
    }
}
