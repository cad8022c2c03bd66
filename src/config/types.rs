use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use vidrelay_av::{Corner, EncodeSettings};
use vidrelay_common::Visibility;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Source channel whose uploads are relayed.
    #[serde(default)]
    pub channel_id: String,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub transform: TransformConfig,

    #[serde(default)]
    pub encode: EncodeConfig,

    #[serde(default)]
    pub publish: PublishConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub youtube: YouTubeConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Where raw downloads and processed outputs are written.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Where derived overlay images are cached (default: `<download_dir>/.cache`).
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: PathBuf,

    #[serde(default = "default_ledger_file")]
    pub ledger_file: PathBuf,
}

impl PathsConfig {
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| self.download_dir.join(".cache"))
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("/tmp/downloads")
}
fn default_checkpoint_file() -> PathBuf {
    PathBuf::from("last_checked.txt")
}
fn default_ledger_file() -> PathBuf {
    PathBuf::from("retry_ledger.json")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            cache_dir: None,
            checkpoint_file: default_checkpoint_file(),
            ledger_file: default_ledger_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransformConfig {
    /// Canonical overlay image. Never modified.
    #[serde(default = "default_overlay_path")]
    pub overlay_path: PathBuf,

    /// Overlay height in pixels after scaling.
    #[serde(default = "default_overlay_height")]
    pub overlay_height: u32,

    #[serde(default)]
    pub corner: Corner,

    /// Distance from the anchored edges in pixels.
    #[serde(default = "default_margin")]
    pub margin: u32,

    #[serde(default = "default_closing_segment_path")]
    pub closing_segment_path: PathBuf,

    /// Allowed gap between expected and actual output duration, in seconds.
    #[serde(default = "default_duration_tolerance")]
    pub duration_tolerance_secs: f64,
}

fn default_overlay_path() -> PathBuf {
    PathBuf::from("logo.png")
}
fn default_overlay_height() -> u32 {
    50
}
fn default_margin() -> u32 {
    8
}
fn default_closing_segment_path() -> PathBuf {
    PathBuf::from("end_video.mp4")
}
fn default_duration_tolerance() -> f64 {
    1.0
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            overlay_path: default_overlay_path(),
            overlay_height: default_overlay_height(),
            corner: Corner::default(),
            margin: default_margin(),
            closing_segment_path: default_closing_segment_path(),
            duration_tolerance_secs: default_duration_tolerance(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EncodeConfig {
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    #[serde(default = "default_preset")]
    pub preset: String,

    #[serde(default = "default_crf")]
    pub crf: u8,

    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    #[serde(default = "default_faststart")]
    pub faststart: bool,
}

fn default_video_codec() -> String {
    "libx264".to_string()
}
fn default_preset() -> String {
    "medium".to_string()
}
fn default_crf() -> u8 {
    20
}
fn default_audio_codec() -> String {
    "aac".to_string()
}
fn default_audio_bitrate() -> String {
    "192k".to_string()
}
fn default_faststart() -> bool {
    true
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            video_codec: default_video_codec(),
            preset: default_preset(),
            crf: default_crf(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            faststart: default_faststart(),
        }
    }
}

impl From<&EncodeConfig> for EncodeSettings {
    fn from(cfg: &EncodeConfig) -> Self {
        EncodeSettings {
            video_codec: cfg.video_codec.clone(),
            preset: cfg.preset.clone(),
            crf: cfg.crf,
            audio_codec: cfg.audio_codec.clone(),
            audio_bitrate: cfg.audio_bitrate.clone(),
            faststart: cfg.faststart,
        }
    }
}

/// How the published description is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionMode {
    /// Use the source video's description.
    #[default]
    Source,
    /// Replace it with `common_description`.
    Common,
    /// Source description followed by `common_description`.
    Append,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublishConfig {
    #[serde(default)]
    pub description_mode: DescriptionMode,

    #[serde(default)]
    pub common_description: Option<String>,

    /// Tags added to every upload after the source tags.
    #[serde(default)]
    pub extra_tags: Vec<String>,

    #[serde(default = "default_category_id")]
    pub category_id: String,

    #[serde(default)]
    pub visibility: Visibility,

    /// Copy the source thumbnail onto the upload.
    #[serde(default)]
    pub copy_thumbnail: bool,
}

fn default_category_id() -> String {
    "22".to_string()
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            description_mode: DescriptionMode::default(),
            common_description: None,
            extra_tags: Vec::new(),
            category_id: default_category_id(),
            visibility: Visibility::default(),
            copy_thumbnail: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// First-run window: the checkpoint defaults to now minus this many hours.
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u64,

    /// Most videos processed in one run (oldest first).
    #[serde(default = "default_max_videos")]
    pub max_videos: usize,

    /// Listing pages fetched before enumeration gives up.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Videos processed at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Track failed videos and retry them on later runs.
    #[serde(default)]
    pub retry_failed: bool,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Keep downloaded and processed files after the run.
    #[serde(default)]
    pub keep_artifacts: bool,
}

fn default_lookback_hours() -> u64 {
    24
}
fn default_max_videos() -> usize {
    50
}
fn default_max_pages() -> u32 {
    20
}
fn default_concurrency() -> usize {
    1
}
fn default_max_attempts() -> u32 {
    3
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookback_hours: default_lookback_hours(),
            max_videos: default_max_videos(),
            max_pages: default_max_pages(),
            concurrency: default_concurrency(),
            retry_failed: false,
            max_attempts: default_max_attempts(),
            keep_artifacts: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct YouTubeConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_upload_base")]
    pub upload_base: String,

    /// Page URL handed to the downloader; `{id}` is replaced by the video id.
    #[serde(default = "default_watch_url_template")]
    pub watch_url_template: String,

    /// Timeout for API calls (not uploads), in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}
fn default_upload_base() -> String {
    "https://www.googleapis.com/upload/youtube/v3".to_string()
}
fn default_watch_url_template() -> String {
    "https://www.youtube.com/watch?v={id}".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            upload_base: default_upload_base(),
            watch_url_template: default_watch_url_template(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Authorized-user credential file (token, refresh_token, client id/secret).
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,

    /// Pre-issued access token; takes precedence over the credential file.
    #[serde(default)]
    pub access_token: Option<String>,
}

fn default_credentials_file() -> PathBuf {
    PathBuf::from("youtube_credentials.json")
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials_file: default_credentials_file(),
            access_token: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,
}
