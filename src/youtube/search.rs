use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use vidrelay_common::{VideoId, VideoRecord};

use super::types::{SearchListResponse, Snippet, VideoListResponse, KIND_VIDEO};
use super::{check_status, YouTubeClient, PAGE_SIZE};
use crate::error::EnumerationError;
use crate::source::{normalize_listing, VideoSource};

impl YouTubeClient {
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, EnumerationError> {
        let credential = self.credentials.credential().await?;
        let response = self
            .api
            .get(self.api_url(path))
            .header(reqwest::header::AUTHORIZATION, credential.bearer())
            .query(query)
            .send()
            .await
            .map_err(EnumerationError::Transport)?;

        let response = check_status(response)
            .await
            .map_err(|(status, message)| EnumerationError::Api { status, message })?;

        let body = response.bytes().await.map_err(EnumerationError::Transport)?;
        serde_json::from_slice(&body).map_err(|e| EnumerationError::Decode(format!("{}: {}", path, e)))
    }

    /// Every video search hit after `since`, following page tokens.
    async fn search_all(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<(String, Snippet)>, EnumerationError> {
        let published_after = since.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut hits = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0u32;

        loop {
            if pages == self.max_pages {
                return Err(EnumerationError::Backlog { pages });
            }

            let mut query = vec![
                ("part", "snippet".to_string()),
                ("channelId", channel_id.to_string()),
                ("order", "date".to_string()),
                ("publishedAfter", published_after.clone()),
                ("maxResults", PAGE_SIZE.to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let page: SearchListResponse = self.get_json("/search", &query).await?;
            pages += 1;

            for item in page.items {
                if item.id.kind != KIND_VIDEO {
                    tracing::trace!("Skipping non-video search result ({})", item.id.kind);
                    continue;
                }
                match item.id.video_id {
                    Some(id) if !id.is_empty() => hits.push((id, item.snippet)),
                    _ => tracing::warn!("Video search result without an id; skipping"),
                }
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!("Search returned {} video(s) over {} page(s)", hits.len(), pages);
        Ok(hits)
    }

    /// Full snippets (untruncated description, tags) for the given ids.
    async fn hydrate(&self, ids: &[String]) -> Result<HashMap<String, Snippet>, EnumerationError> {
        let mut snippets = HashMap::new();
        for chunk in ids.chunks(PAGE_SIZE as usize) {
            let query = [
                ("part", "snippet".to_string()),
                ("id", chunk.join(",")),
                ("maxResults", PAGE_SIZE.to_string()),
            ];
            let resp: VideoListResponse = self.get_json("/videos", &query).await?;
            for video in resp.items {
                snippets.insert(video.id, video.snippet);
            }
        }
        Ok(snippets)
    }
}

fn to_record(id: String, snippet: Snippet) -> VideoRecord {
    let thumbnail = snippet.thumbnails.best_url();
    VideoRecord {
        id: VideoId::from(id),
        title: snippet.title,
        description: snippet.description,
        tags: snippet.tags,
        thumbnail,
        published_at: snippet.published_at,
    }
}

#[async_trait::async_trait]
impl VideoSource for YouTubeClient {
    async fn list_new_videos(
        &self,
        channel_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<VideoRecord>, EnumerationError> {
        tracing::info!("Listing videos on channel {} published after {}", channel_id, since);

        let hits = self.search_all(channel_id, since).await?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = hits.iter().map(|(id, _)| id.clone()).collect();
        let mut full = self.hydrate(&ids).await?;

        let records = hits
            .into_iter()
            .map(|(id, search_snippet)| {
                // Videos that vanished between the two calls keep the search data.
                let snippet = full.remove(&id).unwrap_or(search_snippet);
                to_record(id, snippet)
            })
            .collect();

        Ok(normalize_listing(records, since))
    }
}
