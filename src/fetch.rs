//! Downloading source videos with yt-dlp.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use vidrelay_common::paths::raw_asset_name;
use vidrelay_common::{LocalAsset, VideoRecord};

use crate::error::FetchError;

/// Retrieves the raw media of a video to local storage.
#[async_trait::async_trait]
pub trait MediaFetcher: Send + Sync {
    /// One attempt; no internal retries.
    async fn fetch(&self, record: &VideoRecord) -> Result<LocalAsset, FetchError>;
}

/// Fetcher that shells out to `yt-dlp`.
pub struct YtDlpFetcher {
    program: PathBuf,
    download_dir: PathBuf,
    watch_url_template: String,
}

impl YtDlpFetcher {
    pub fn new(program: impl Into<PathBuf>, download_dir: impl Into<PathBuf>, watch_url_template: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            download_dir: download_dir.into(),
            watch_url_template: watch_url_template.into(),
        }
    }

    /// Deterministic destination for a video.
    pub fn output_path(&self, record: &VideoRecord) -> PathBuf {
        self.download_dir.join(raw_asset_name(&record.id))
    }

    fn args(&self, url: &str, output: &Path) -> Vec<String> {
        vec![
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--force-overwrites".to_string(),
            "-f".to_string(),
            "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best".to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "-o".to_string(),
            output_template(output),
            url.to_string(),
        ]
    }
}

/// yt-dlp treats `-o` as a template; `%` must be doubled to stay literal.
fn output_template(path: &Path) -> String {
    path.to_string_lossy().replace('%', "%%")
}

#[async_trait::async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(&self, record: &VideoRecord) -> Result<LocalAsset, FetchError> {
        let fail = |cause: String| FetchError::new(record.id.clone(), cause);

        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|e| fail(format!("create {:?}: {}", self.download_dir, e)))?;

        let output_path = self.output_path(record);
        match tokio::fs::remove_file(&output_path).await {
            Ok(()) => tracing::debug!("Removed stale download {:?}", output_path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(fail(format!("remove stale {:?}: {}", output_path, e))),
        }

        // From here on the asset owns the path, so any failure cleans up.
        let asset = LocalAsset::new(record.id.clone(), &output_path);
        let url = self.watch_url_template.replace("{id}", record.id.as_str());

        tracing::info!(video_id = %record.id, "Downloading {} to {:?}", url, output_path);

        let output = Command::new(&self.program)
            .args(self.args(&url, &output_path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| fail(format!("failed to run {:?}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(video_id = %record.id, "yt-dlp stderr: {}", stderr);
            let last = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("unknown error");
            return Err(fail(format!("yt-dlp exited with {}: {}", output.status, last.trim())));
        }

        let size = asset.size();
        if size == 0 {
            return Err(fail(format!("no media written to {:?}", output_path)));
        }

        tracing::info!(video_id = %record.id, "Downloaded {} bytes", size);
        Ok(asset)
    }
}
