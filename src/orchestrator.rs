//! One relay pass: enumerate, then fetch, transform and publish each video.
//!
//! Failures of a single video are caught here and never stop the batch.
//! Only enumeration and persisting the checkpoint or ledger abort a run.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;
use vidrelay_common::{ItemState, Stage, VideoRecord};

use crate::checkpoint::CheckpointStore;
use crate::config::{Config, PublishConfig};
use crate::error::RunError;
use crate::fetch::MediaFetcher;
use crate::ledger::RetryLedger;
use crate::publish::{PublishMetadata, Publisher};
use crate::source::VideoSource;
use crate::transform::Transformer;

/// Run-level state, logged as the run progresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Enumerating,
    Processing,
    Completed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Enumerating => write!(f, "enumerating"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Orchestrator knobs taken from config.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub channel_id: String,
    pub max_videos: usize,
    pub concurrency: usize,
    pub keep_artifacts: bool,
    pub publish: PublishConfig,
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            channel_id: config.channel_id.clone(),
            max_videos: config.pipeline.max_videos,
            concurrency: config.pipeline.concurrency,
            keep_artifacts: config.pipeline.keep_artifacts,
            publish: config.publish.clone(),
        }
    }
}

/// Videos selected for a run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub since: DateTime<Utc>,
    /// Oldest first, capped by `max_videos` (see [`cap_batch`]).
    pub candidates: Vec<VideoRecord>,
    /// Candidates left for a later run by the batch cap.
    pub deferred: usize,
}

/// Final state of one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub record: VideoRecord,
    pub state: ItemState,
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub previous_checkpoint: DateTime<Utc>,
    pub checkpoint: DateTime<Utc>,
    pub outcomes: Vec<ItemOutcome>,
    pub deferred: usize,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.state.is_published()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

pub struct Orchestrator {
    source: Arc<dyn VideoSource>,
    fetcher: Arc<dyn MediaFetcher>,
    transformer: Arc<dyn Transformer>,
    publisher: Arc<dyn Publisher>,
    checkpoint: Arc<dyn CheckpointStore>,
    ledger: Option<Mutex<RetryLedger>>,
    settings: RunSettings,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn VideoSource>,
        fetcher: Arc<dyn MediaFetcher>,
        transformer: Arc<dyn Transformer>,
        publisher: Arc<dyn Publisher>,
        checkpoint: Arc<dyn CheckpointStore>,
        settings: RunSettings,
    ) -> Self {
        Self {
            source,
            fetcher,
            transformer,
            publisher,
            checkpoint,
            ledger: None,
            settings,
        }
    }

    /// Feed failed videos back into later runs.
    pub fn with_ledger(mut self, ledger: RetryLedger) -> Self {
        self.ledger = Some(Mutex::new(ledger));
        self
    }

    /// Enumerate and select candidates without side effects.
    pub async fn plan(&self) -> Result<RunPlan, RunError> {
        let since = self.checkpoint.read();
        tracing::debug!(phase = %RunPhase::Enumerating, "Checkpoint is {}", since);

        let listed = self
            .source
            .list_new_videos(&self.settings.channel_id, since)
            .await?;
        tracing::info!("Found {} new video(s) since {}", listed.len(), since);

        let retries = match &self.ledger {
            Some(ledger) => ledger.lock().due(),
            None => Vec::new(),
        };
        if !retries.is_empty() {
            tracing::info!("Retrying {} previously failed video(s)", retries.len());
        }

        let max = self.settings.max_videos.max(1);
        let (candidates, deferred) = cap_batch(merge_candidates(listed, retries), max);
        if deferred > 0 {
            tracing::warn!(
                "Batch capped at {} of {} video(s); {} left for the next run",
                candidates.len(),
                max,
                deferred
            );
        }

        Ok(RunPlan {
            since,
            candidates,
            deferred,
        })
    }

    /// Run one pass with `started_at` as the run start.
    pub async fn run_at(&self, started_at: DateTime<Utc>) -> Result<RunReport, RunError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id);
        self.run_inner(run_id, started_at).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, started_at: DateTime<Utc>) -> Result<RunReport, RunError> {
        tracing::info!(phase = %RunPhase::Idle, "Starting run at {}", started_at);

        let plan = self.plan().await?;
        let since = plan.since;

        // With a capped batch, only move past what was actually considered.
        let target = match (plan.deferred, plan.candidates.last()) {
            (0, _) | (_, None) => started_at,
            (_, Some(newest)) => newest.published_at,
        };
        let checkpoint = since.max(target);

        tracing::info!(
            phase = %RunPhase::Processing,
            "Processing {} video(s) with concurrency {}",
            plan.candidates.len(),
            self.settings.concurrency.max(1)
        );

        let outcomes: Vec<ItemOutcome> = stream::iter(plan.candidates.into_iter().map(|r| self.process(r)))
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        // The ledger must hold this run's failures before the checkpoint
        // moves past them.
        if let Some(ledger) = &self.ledger {
            let mut ledger = ledger.lock();
            for outcome in &outcomes {
                match &outcome.state {
                    ItemState::Failed { stage, error } => {
                        ledger.record_failure(&outcome.record, *stage, error, started_at);
                    }
                    _ => ledger.record_success(&outcome.record.id),
                }
            }
            ledger.save()?;
        }

        self.checkpoint.write(checkpoint)?;
        tracing::info!(phase = %RunPhase::Completed, "Checkpoint advanced to {}", checkpoint);

        let report = RunReport {
            run_id,
            started_at,
            previous_checkpoint: since,
            checkpoint,
            outcomes,
            deferred: plan.deferred,
        };
        tracing::info!(
            "Run finished: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        );
        Ok(report)
    }

    /// Drive one video to a terminal state.
    async fn process(&self, record: VideoRecord) -> ItemOutcome {
        let span = tracing::info_span!("item", video_id = %record.id);
        let state = self.process_inner(&record).instrument(span).await;
        ItemOutcome { record, state }
    }

    async fn process_inner(&self, record: &VideoRecord) -> ItemState {
        tracing::info!("Processing {:?} ({})", record.title, ItemState::Discovered);

        let mut raw = match self.fetcher.fetch(record).await {
            Ok(asset) => asset,
            Err(e) => return failed(record, Stage::Download, e.to_string()),
        };
        if self.settings.keep_artifacts {
            raw.retain();
        }
        tracing::debug!("{} {:?}", ItemState::Downloaded, raw.path());

        let mut processed = match self.transformer.transform(&raw).await {
            Ok(asset) => asset,
            Err(e) => return failed(record, Stage::Transform, e.to_string()),
        };
        if self.settings.keep_artifacts {
            processed.retain();
        }
        // The raw download is no longer needed.
        drop(raw);
        tracing::debug!("{} {:?}", ItemState::Transformed, processed.path());

        let metadata = PublishMetadata::from_record(record, &self.settings.publish);
        match self.publisher.publish(&processed, &metadata).await {
            Ok(remote_id) => {
                tracing::info!(%remote_id, "Published");
                ItemState::Published { remote_id }
            }
            Err(e) => failed(record, Stage::Publish, e.to_string()),
        }
    }
}

fn failed(record: &VideoRecord, stage: Stage, error: String) -> ItemState {
    tracing::error!(video_id = %record.id, %stage, "Failed: {}", error);
    ItemState::Failed { stage, error }
}

/// Cut an oldest-first batch down to `max`, returning it with the deferred count.
///
/// Videos sharing a publish instant stay together: the cut moves back to
/// the start of a group that would be split, since the checkpoint can only
/// express "everything up to this instant". A single group larger than
/// `max` is taken whole.
pub fn cap_batch(mut candidates: Vec<VideoRecord>, max: usize) -> (Vec<VideoRecord>, usize) {
    if candidates.len() <= max {
        return (candidates, 0);
    }

    let boundary = candidates[max].published_at;
    let mut cut = max;
    while cut > 0 && candidates[cut - 1].published_at == boundary {
        cut -= 1;
    }
    if cut == 0 {
        cut = candidates
            .iter()
            .take_while(|r| r.published_at == boundary)
            .count();
    }

    let deferred = candidates.split_off(cut);
    (candidates, deferred.len())
}

/// Combine fresh listings with due retries: unique ids, oldest first.
///
/// A fresh listing wins over a ledger copy of the same video.
pub fn merge_candidates(listed: Vec<VideoRecord>, retries: Vec<VideoRecord>) -> Vec<VideoRecord> {
    let mut seen = HashSet::new();
    let mut merged: Vec<VideoRecord> = listed
        .into_iter()
        .chain(retries)
        .filter(|r| seen.insert(r.id.clone()))
        .collect();
    merged.sort_by(|a, b| {
        a.published_at
            .cmp(&b.published_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use vidrelay_common::{RemoteId, VideoId};

    fn rec(id: &str, title: &str, hours: i64) -> VideoRecord {
        VideoRecord {
            id: VideoId::from(id),
            title: title.to_string(),
            description: String::new(),
            tags: vec![],
            thumbnail: None,
            published_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::hours(hours),
        }
    }

    #[test]
    fn test_merge_prefers_listing_and_sorts() {
        let listed = vec![rec("b", "fresh", 2), rec("c", "c", 3)];
        let retries = vec![rec("b", "stale", 2), rec("a", "a", 1)];

        let merged = merge_candidates(listed, retries);
        let ids: Vec<&str> = merged.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(merged[1].title, "fresh");
    }

    #[test]
    fn test_cap_batch_keeps_equal_instants_together() {
        let batch = vec![rec("a", "a", 1), rec("b", "b", 2), rec("c", "c", 2), rec("d", "d", 3)];

        let (kept, deferred) = cap_batch(batch.clone(), 2);
        let ids: Vec<&str> = kept.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
        assert_eq!(deferred, 3);

        let (kept, deferred) = cap_batch(batch.clone(), 3);
        assert_eq!(kept.len(), 3);
        assert_eq!(deferred, 1);

        let (kept, deferred) = cap_batch(batch, 10);
        assert_eq!((kept.len(), deferred), (4, 0));
    }

    #[test]
    fn test_cap_batch_takes_oversized_group_whole() {
        let batch = vec![rec("a", "a", 1), rec("b", "b", 1), rec("c", "c", 1), rec("d", "d", 2)];

        let (kept, deferred) = cap_batch(batch, 2);
        let ids: Vec<&str> = kept.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(deferred, 1);
    }

    #[test]
    fn test_report_counts() {
        let report = RunReport {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            previous_checkpoint: Utc::now(),
            checkpoint: Utc::now(),
            outcomes: vec![
                ItemOutcome {
                    record: rec("a", "a", 1),
                    state: ItemState::Published {
                        remote_id: RemoteId::new("x"),
                    },
                },
                ItemOutcome {
                    record: rec("b", "b", 2),
                    state: ItemState::Failed {
                        stage: Stage::Download,
                        error: "boom".into(),
                    },
                },
            ],
            deferred: 0,
        };
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(RunPhase::Enumerating.to_string(), "enumerating");
    }
}
