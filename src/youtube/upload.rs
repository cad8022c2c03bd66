use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use tokio_util::io::ReaderStream;
use vidrelay_common::{LocalAsset, RemoteId};

use super::types::{InsertSnippet, InsertStatus, InsertedVideo, VideoInsert};
use super::{check_status, YouTubeClient};
use crate::error::PublishError;
use crate::publish::{PublishMetadata, Publisher};

const VIDEO_MIME: &str = "video/mp4";

impl YouTubeClient {
    /// Open a resumable upload session and return its URI.
    async fn start_upload_session(
        &self,
        bearer: &str,
        metadata: &PublishMetadata,
        size: u64,
    ) -> Result<String, PublishError> {
        let body = VideoInsert {
            snippet: InsertSnippet {
                title: &metadata.title,
                description: &metadata.description,
                tags: &metadata.tags,
                category_id: &metadata.category_id,
            },
            status: InsertStatus {
                privacy_status: metadata.visibility.as_str(),
            },
        };

        let response = self
            .api
            .post(self.upload_url("/videos"))
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .header(AUTHORIZATION, bearer)
            .header("X-Upload-Content-Type", VIDEO_MIME)
            .header("X-Upload-Content-Length", size.to_string())
            .json(&body)
            .send()
            .await?;

        let response = check_status(response)
            .await
            .map_err(|(status, message)| PublishError::Rejected { status, message })?;

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(PublishError::MissingSession)
    }

    /// Stream the whole file into an open session.
    async fn send_media(&self, bearer: &str, session: &str, asset: &LocalAsset) -> Result<RemoteId, PublishError> {
        let file = tokio::fs::File::open(asset.path()).await?;
        let size = file.metadata().await?.len();
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        let response = self
            .upload
            .put(session)
            .header(AUTHORIZATION, bearer)
            .header(CONTENT_TYPE, VIDEO_MIME)
            .header(CONTENT_LENGTH, size)
            .body(body)
            .send()
            .await?;

        let response = check_status(response)
            .await
            .map_err(|(status, message)| PublishError::Rejected { status, message })?;

        let inserted: InsertedVideo = response.json().await?;
        Ok(RemoteId::new(inserted.id))
    }

    /// Copy a thumbnail from a URL onto an uploaded video.
    async fn set_thumbnail(&self, bearer: &str, video: &RemoteId, url: &str) -> Result<(), String> {
        let image = self
            .api
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| format!("download {}: {}", url, e))?;
        let content_type = image
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = image.bytes().await.map_err(|e| e.to_string())?;

        let response = self
            .api
            .post(self.upload_url("/thumbnails/set"))
            .query(&[("videoId", video.as_str())])
            .header(AUTHORIZATION, bearer)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        check_status(response)
            .await
            .map(|_| ())
            .map_err(|(status, message)| format!("{}: {}", status, message))
    }
}

#[async_trait::async_trait]
impl Publisher for YouTubeClient {
    async fn publish(
        &self,
        asset: &LocalAsset,
        metadata: &PublishMetadata,
    ) -> Result<RemoteId, PublishError> {
        let bearer = self.credentials.credential().await?.bearer();
        let size = tokio::fs::metadata(asset.path()).await?.len();

        tracing::info!(
            video_id = %asset.video_id(),
            "Uploading {:?} ({} bytes) as {:?}",
            asset.path(),
            size,
            metadata.title
        );

        let session = self.start_upload_session(&bearer, metadata, size).await?;
        let remote = self.send_media(&bearer, &session, asset).await?;

        if let Some(url) = metadata.thumbnail.as_deref() {
            if url.starts_with("http://") || url.starts_with("https://") {
                if let Err(e) = self.set_thumbnail(&bearer, &remote, url).await {
                    tracing::warn!(
                        video_id = %asset.video_id(),
                        remote_id = %remote,
                        "Failed to copy thumbnail: {}",
                        e
                    );
                }
            }
        }

        Ok(remote)
    }
}
