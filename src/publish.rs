//! Republishing: metadata shaping and the publisher seam.

use vidrelay_common::{LocalAsset, RemoteId, VideoRecord, Visibility};

use crate::config::{DescriptionMode, PublishConfig};
use crate::error::PublishError;

/// Platform limit on title length, in characters.
pub const MAX_TITLE_CHARS: usize = 100;

/// Platform limit on description length, in bytes.
pub const MAX_DESCRIPTION_BYTES: usize = 5000;

/// Platform limit on the combined length of all tags, in characters.
pub const MAX_TAGS_CHARS: usize = 500;

/// Metadata for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub visibility: Visibility,
    /// Source thumbnail to copy, if enabled.
    pub thumbnail: Option<String>,
}

impl PublishMetadata {
    /// Build upload metadata from a source record and publish settings.
    pub fn from_record(record: &VideoRecord, config: &PublishConfig) -> Self {
        let common = config.common_description.as_deref().unwrap_or("").trim();
        let description = match config.description_mode {
            DescriptionMode::Source => record.description.clone(),
            DescriptionMode::Common => common.to_string(),
            DescriptionMode::Append if record.description.trim().is_empty() => common.to_string(),
            DescriptionMode::Append if common.is_empty() => record.description.clone(),
            DescriptionMode::Append => format!("{}\n\n{}", record.description.trim_end(), common),
        };

        let mut tags = record.tags.clone();
        tags.extend(config.extra_tags.iter().cloned());

        Self {
            title: clean_title(&record.title),
            description: clean_description(&description),
            tags: fit_tags(tags),
            category_id: config.category_id.clone(),
            visibility: config.visibility,
            thumbnail: if config.copy_thumbnail {
                record.thumbnail.clone()
            } else {
                None
            },
        }
    }
}

/// Remove characters the platform rejects and cap the length.
fn clean_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .take(MAX_TITLE_CHARS)
        .collect();
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        "Untitled".to_string()
    } else {
        cleaned
    }
}

fn clean_description(description: &str) -> String {
    let cleaned: String = description.chars().filter(|c| *c != '<' && *c != '>').collect();
    truncate_bytes(&cleaned, MAX_DESCRIPTION_BYTES).to_string()
}

/// Truncate to at most `max` bytes on a char boundary.
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Dedupe tags (case-insensitively) and keep them within the total budget.
///
/// Tags containing spaces count two extra characters, since the platform
/// quotes them.
fn fit_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    let mut used = 0usize;

    for tag in tags {
        let tag: String = tag.chars().filter(|c| *c != '<' && *c != '>').collect();
        let tag = tag.trim().to_string();
        if tag.is_empty() || !seen.insert(tag.to_lowercase()) {
            continue;
        }

        let cost = tag.chars().count() + if tag.contains(' ') { 2 } else { 0 };
        let separator = if out.is_empty() { 0 } else { 1 };
        if used + separator + cost > MAX_TAGS_CHARS {
            break;
        }
        used += separator + cost;
        out.push(tag);
    }

    out
}

/// Uploads a transformed asset to the destination platform.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        asset: &LocalAsset,
        metadata: &PublishMetadata,
    ) -> Result<RemoteId, PublishError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vidrelay_common::VideoId;

    fn record() -> VideoRecord {
        VideoRecord {
            id: VideoId::from("v1"),
            title: "My <b>great</b> video".into(),
            description: "Original description".into(),
            tags: vec!["cats".into(), "Cats".into(), "funny cats".into()],
            thumbnail: Some("https://i.ytimg.com/vi/v1/hqdefault.jpg".into()),
            published_at: Utc::now(),
        }
    }

    #[test]
    fn test_source_mode_passes_through() {
        let meta = PublishMetadata::from_record(&record(), &PublishConfig::default());
        assert_eq!(meta.title, "My bgreat/b video");
        assert_eq!(meta.description, "Original description");
        assert_eq!(meta.tags, vec!["cats".to_string(), "funny cats".to_string()]);
        assert_eq!(meta.category_id, "22");
        assert_eq!(meta.visibility, Visibility::Public);
        assert!(meta.thumbnail.is_none());
    }

    #[test]
    fn test_common_and_append_modes() {
        let mut cfg = PublishConfig {
            description_mode: DescriptionMode::Common,
            common_description: Some("Follow us!".into()),
            ..PublishConfig::default()
        };
        assert_eq!(
            PublishMetadata::from_record(&record(), &cfg).description,
            "Follow us!"
        );

        cfg.description_mode = DescriptionMode::Append;
        assert_eq!(
            PublishMetadata::from_record(&record(), &cfg).description,
            "Original description\n\nFollow us!"
        );

        let mut empty = record();
        empty.description.clear();
        assert_eq!(
            PublishMetadata::from_record(&empty, &cfg).description,
            "Follow us!"
        );
    }

    #[test]
    fn test_extra_tags_and_thumbnail() {
        let cfg = PublishConfig {
            extra_tags: vec!["relay".into(), "CATS".into()],
            copy_thumbnail: true,
            visibility: Visibility::Unlisted,
            ..PublishConfig::default()
        };
        let meta = PublishMetadata::from_record(&record(), &cfg);
        assert_eq!(meta.tags, vec!["cats", "funny cats", "relay"]);
        assert_eq!(meta.visibility, Visibility::Unlisted);
        assert!(meta.thumbnail.is_some());
    }

    #[test]
    fn test_title_limits() {
        let mut r = record();
        r.title = "x".repeat(150);
        assert_eq!(
            PublishMetadata::from_record(&r, &PublishConfig::default())
                .title
                .chars()
                .count(),
            MAX_TITLE_CHARS
        );

        r.title = "<>".into();
        assert_eq!(
            PublishMetadata::from_record(&r, &PublishConfig::default()).title,
            "Untitled"
        );
    }

    #[test]
    fn test_description_truncated_on_char_boundary() {
        let mut r = record();
        r.description = "é".repeat(3000); // 6000 bytes
        let meta = PublishMetadata::from_record(&r, &PublishConfig::default());
        assert!(meta.description.len() <= MAX_DESCRIPTION_BYTES);
        assert_eq!(meta.description.chars().count(), 2500);
    }

    #[test]
    fn test_tag_budget() {
        let tags: Vec<String> = (0..100).map(|i| format!("tag{:03}xxxxx", i)).collect();
        let fitted = fit_tags(tags);
        let total: usize = fitted.iter().map(|t| t.len()).sum::<usize>() + fitted.len() - 1;
        assert!(total <= MAX_TAGS_CHARS);
        assert!(fitted.len() < 100);
        assert_eq!(fitted[0], "tag000xxxxx");
    }
}
