//! Discovery of new videos on the source channel.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use vidrelay_common::VideoRecord;

use crate::error::EnumerationError;

/// Lists videos published on a channel after a checkpoint.
#[async_trait::async_trait]
pub trait VideoSource: Send + Sync {
    /// Videos published strictly after `since`, oldest first.
    ///
    /// Either the complete listing or an error; never a partial result.
    async fn list_new_videos(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<VideoRecord>, EnumerationError>;
}

/// Keep records newer than `since`, drop duplicates, sort oldest first.
///
/// The first copy of an id wins. Ties on the publish instant are broken by
/// id so the order is stable across runs.
pub fn normalize_listing(records: Vec<VideoRecord>, since: DateTime<Utc>) -> Vec<VideoRecord> {
    let mut seen = HashSet::new();
    let mut records: Vec<VideoRecord> = records
        .into_iter()
        .filter(|r| r.published_at > since)
        .filter(|r| seen.insert(r.id.clone()))
        .collect();
    records.sort_by(|a, b| {
        a.published_at
            .cmp(&b.published_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    records
}
