//! Shared test harness for pipeline integration tests.
//!
//! Provides in-memory fakes for every pipeline seam plus [`TestHarness`],
//! which wires them into an [`Orchestrator`] over a temporary directory.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use tempfile::TempDir;

use vidrelay::checkpoint::CheckpointStore;
use vidrelay::config::PublishConfig;
use vidrelay::error::{
    CheckpointError, EnumerationError, FetchError, PublishError, TransformError,
};
use vidrelay::fetch::MediaFetcher;
use vidrelay::ledger::RetryLedger;
use vidrelay::orchestrator::{Orchestrator, RunSettings};
use vidrelay::publish::{PublishMetadata, Publisher};
use vidrelay::source::{normalize_listing, VideoSource};
use vidrelay::transform::Transformer;
use vidrelay_common::{LocalAsset, RemoteId, VideoId, VideoRecord};

/// Fixed reference instant for scenarios.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
}

pub fn record(id: &str, published_at: DateTime<Utc>) -> VideoRecord {
    VideoRecord {
        id: VideoId::from(id),
        title: format!("Video {}", id),
        description: format!("Description of {}", id),
        tags: vec!["relay".to_string()],
        thumbnail: None,
        published_at,
    }
}

/// Source channel with a fixed catalogue.
#[derive(Default)]
pub struct FakeSource {
    pub videos: Mutex<Vec<VideoRecord>>,
    pub fail: Mutex<bool>,
    pub calls: Mutex<Vec<DateTime<Utc>>>,
}

impl FakeSource {
    pub fn with(videos: Vec<VideoRecord>) -> Self {
        Self {
            videos: Mutex::new(videos),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl VideoSource for FakeSource {
    async fn list_new_videos(
        &self,
        _channel_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<VideoRecord>, EnumerationError> {
        self.calls.lock().push(since);
        if *self.fail.lock() {
            return Err(EnumerationError::Api {
                status: 403,
                message: "quotaExceeded".to_string(),
            });
        }
        Ok(normalize_listing(self.videos.lock().clone(), since))
    }
}

/// Writes a small file per video, failing for selected ids.
pub struct FakeFetcher {
    pub dir: PathBuf,
    pub failing: Mutex<HashSet<String>>,
    pub fetched: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            failing: Mutex::new(HashSet::new()),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_for(&self, id: &str) {
        self.failing.lock().insert(id.to_string());
    }

    pub fn heal(&self, id: &str) {
        self.failing.lock().remove(id);
    }
}

#[async_trait::async_trait]
impl MediaFetcher for FakeFetcher {
    async fn fetch(&self, record: &VideoRecord) -> Result<LocalAsset, FetchError> {
        self.fetched.lock().push(record.id.to_string());
        if self.failing.lock().contains(record.id.as_str()) {
            return Err(FetchError::new(record.id.clone(), "HTTP Error 403: Forbidden"));
        }
        let path = self.dir.join(format!("{}.mp4", record.id));
        std::fs::write(&path, b"raw").map_err(|e| FetchError::new(record.id.clone(), e.to_string()))?;
        Ok(LocalAsset::new(record.id.clone(), path))
    }
}

/// Produces `processed_<id>.mp4`, or fails every call when `fail_all` is set.
pub struct FakeTransformer {
    pub dir: PathBuf,
    pub fail_all: Mutex<bool>,
    pub transformed: Mutex<Vec<String>>,
}

impl FakeTransformer {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            fail_all: Mutex::new(false),
            transformed: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl Transformer for FakeTransformer {
    async fn transform(&self, raw: &LocalAsset) -> Result<LocalAsset, TransformError> {
        self.transformed.lock().push(raw.video_id().to_string());
        if *self.fail_all.lock() {
            return Err(TransformError::Overlay(vidrelay_av::Error::file_not_found(
                "logo.png",
            )));
        }
        let path = self.dir.join(format!("processed_{}.mp4", raw.video_id()));
        std::fs::copy(raw.path(), &path)?;
        Ok(LocalAsset::new(raw.video_id().clone(), path))
    }
}

/// Records uploads; assigns `remote-<id>` ids.
#[derive(Default)]
pub struct FakePublisher {
    pub failing: Mutex<HashSet<String>>,
    pub published: Mutex<Vec<(String, PublishMetadata)>>,
}

#[async_trait::async_trait]
impl Publisher for FakePublisher {
    async fn publish(
        &self,
        asset: &LocalAsset,
        metadata: &PublishMetadata,
    ) -> Result<RemoteId, PublishError> {
        let id = asset.video_id().to_string();
        if self.failing.lock().contains(&id) {
            return Err(PublishError::Rejected {
                status: 400,
                message: "invalid video".to_string(),
            });
        }
        assert!(asset.path().exists(), "published asset must exist on disk");
        self.published.lock().push((id.clone(), metadata.clone()));
        Ok(RemoteId::new(format!("remote-{}", id)))
    }
}

/// Checkpoint kept in memory; counts writes.
pub struct MemoryCheckpoint {
    pub at: Mutex<DateTime<Utc>>,
    pub writes: Mutex<u32>,
}

impl MemoryCheckpoint {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            at: Mutex::new(at),
            writes: Mutex::new(0),
        }
    }

    pub fn get(&self) -> DateTime<Utc> {
        *self.at.lock()
    }
}

impl CheckpointStore for MemoryCheckpoint {
    fn read(&self) -> DateTime<Utc> {
        self.get()
    }

    fn write(&self, at: DateTime<Utc>) -> Result<(), CheckpointError> {
        *self.at.lock() = at;
        *self.writes.lock() += 1;
        Ok(())
    }
}

pub fn settings() -> RunSettings {
    RunSettings {
        channel_id: "UC-test".to_string(),
        max_videos: 50,
        concurrency: 1,
        keep_artifacts: false,
        publish: PublishConfig::default(),
    }
}

/// All fakes wired together over a temporary directory.
pub struct TestHarness {
    pub dir: TempDir,
    pub source: Arc<FakeSource>,
    pub fetcher: Arc<FakeFetcher>,
    pub transformer: Arc<FakeTransformer>,
    pub publisher: Arc<FakePublisher>,
    pub checkpoint: Arc<MemoryCheckpoint>,
}

impl TestHarness {
    pub fn new(videos: Vec<VideoRecord>, checkpoint: DateTime<Utc>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self {
            source: Arc::new(FakeSource::with(videos)),
            fetcher: Arc::new(FakeFetcher::new(dir.path())),
            transformer: Arc::new(FakeTransformer::new(dir.path())),
            publisher: Arc::new(FakePublisher::default()),
            checkpoint: Arc::new(MemoryCheckpoint::new(checkpoint)),
            dir,
        }
    }

    pub fn orchestrator(&self, settings: RunSettings) -> Orchestrator {
        Orchestrator::new(
            self.source.clone(),
            self.fetcher.clone(),
            self.transformer.clone(),
            self.publisher.clone(),
            self.checkpoint.clone(),
            settings,
        )
    }

    pub fn orchestrator_with_ledger(&self, settings: RunSettings, max_attempts: u32) -> Orchestrator {
        let ledger = RetryLedger::load(self.ledger_path(), max_attempts);
        self.orchestrator(settings).with_ledger(ledger)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.dir.path().join("retry_ledger.json")
    }

    pub fn published_ids(&self) -> Vec<String> {
        self.publisher
            .published
            .lock()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Media files left in the working directory.
    pub fn leftover_media(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".mp4"))
            .collect();
        names.sort();
        names
    }
}

pub fn hours(h: i64) -> Duration {
    Duration::hours(h)
}
