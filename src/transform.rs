//! Branding transform: overlay watermark plus closing segment.
//!
//! The heavy lifting is in `vidrelay-av`; this module wires it to the
//! pipeline. Blocking work (image scaling, ffprobe, ffmpeg) runs on the
//! blocking pool so the runtime stays responsive when items run
//! concurrently.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vidrelay_av::actions::brand_video;
use vidrelay_av::{BrandSpec, Corner, EncodeSettings, MediaInfo, ScaledOverlay, Workspace};
use vidrelay_common::paths::processed_asset_name;
use vidrelay_common::LocalAsset;

use crate::config::Config;
use crate::error::TransformError;

/// Turns a raw download into the branded output.
#[async_trait::async_trait]
pub trait Transformer: Send + Sync {
    async fn transform(&self, raw: &LocalAsset) -> Result<LocalAsset, TransformError>;
}

/// Process-wide transform settings, fixed for the run.
#[derive(Debug, Clone)]
pub struct TransformSpec {
    pub overlay_path: PathBuf,
    pub overlay_height: u32,
    pub corner: Corner,
    pub margin: u32,
    pub closing_segment_path: PathBuf,
    pub encode: EncodeSettings,
    pub duration_tolerance_secs: f64,
}

impl TransformSpec {
    pub fn from_config(config: &Config) -> Self {
        let t = &config.transform;
        Self {
            overlay_path: t.overlay_path.clone(),
            overlay_height: t.overlay_height,
            corner: t.corner,
            margin: t.margin,
            closing_segment_path: t.closing_segment_path.clone(),
            encode: EncodeSettings::from(&config.encode),
            duration_tolerance_secs: t.duration_tolerance_secs,
        }
    }
}

/// Transformer backed by ffmpeg/ffprobe.
pub struct FfmpegTransformer {
    spec: Arc<TransformSpec>,
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    output_dir: PathBuf,
    cache_dir: PathBuf,
    /// Scaled overlay, kept once it has been produced successfully.
    overlay: Mutex<Option<Arc<ScaledOverlay>>>,
}

impl FfmpegTransformer {
    pub fn new(
        spec: TransformSpec,
        ffmpeg: impl Into<PathBuf>,
        ffprobe: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            spec: Arc::new(spec),
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            output_dir: output_dir.into(),
            cache_dir: cache_dir.into(),
            overlay: Mutex::new(None),
        }
    }

    pub fn spec(&self) -> &TransformSpec {
        &self.spec
    }

    async fn scaled_overlay(&self) -> Result<Arc<ScaledOverlay>, TransformError> {
        if let Some(cached) = self.overlay.lock().clone() {
            return Ok(cached);
        }

        let source = self.spec.overlay_path.clone();
        let height = self.spec.overlay_height;
        let cache_dir = self.cache_dir.clone();
        let scaled = tokio::task::spawn_blocking(move || {
            vidrelay_av::scale_overlay(&source, height, &cache_dir)
        })
        .await?
        .map_err(TransformError::Overlay)?;

        let scaled = Arc::new(scaled);
        *self.overlay.lock() = Some(scaled.clone());
        Ok(scaled)
    }
}

#[async_trait::async_trait]
impl Transformer for FfmpegTransformer {
    async fn transform(&self, raw: &LocalAsset) -> Result<LocalAsset, TransformError> {
        let overlay = self.scaled_overlay().await?;

        let job = BrandJob {
            spec: self.spec.clone(),
            overlay,
            ffmpeg: self.ffmpeg.clone(),
            ffprobe: self.ffprobe.clone(),
            input: raw.path().to_path_buf(),
            output: self.output_dir.join(processed_asset_name(raw.video_id())),
        };

        let video_id = raw.video_id().clone();
        tracing::info!(video_id = %video_id, "Transforming {:?}", job.input);

        let output = tokio::task::spawn_blocking(move || job.run()).await??;

        tracing::info!(video_id = %video_id, "Transformed into {:?}", output);
        Ok(LocalAsset::new(video_id, output))
    }
}

/// Everything one blocking branding run needs, owned.
struct BrandJob {
    spec: Arc<TransformSpec>,
    overlay: Arc<ScaledOverlay>,
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    input: PathBuf,
    output: PathBuf,
}

impl BrandJob {
    fn run(self) -> Result<PathBuf, TransformError> {
        let source = self.probe(&self.input)?;
        if source.duration_secs() <= 0.0 || source.primary_video().is_none() {
            return Err(TransformError::EmptySource { path: self.input });
        }
        let closing = self.probe(&self.spec.closing_segment_path)?;

        let output_name = self
            .output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "processed.mp4".to_string());
        let output_dir = match self.output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let workspace = Workspace::new_in(&self.input, &output_name, &output_dir)?;

        let brand = BrandSpec {
            overlay: self.overlay.path.clone(),
            corner: self.spec.corner,
            margin: self.spec.margin,
            closing_segment: self.spec.closing_segment_path.clone(),
            encode: self.spec.encode.clone(),
        };
        brand_video(&self.ffmpeg, &workspace, &brand, &source, &closing)?;

        let produced = self.probe(workspace.output())?;
        verify_output(&source, &closing, &produced, self.spec.duration_tolerance_secs)?;

        Ok(workspace.finalize(&self.output)?)
    }

    fn probe(&self, path: &Path) -> Result<MediaInfo, TransformError> {
        Ok(vidrelay_av::probe_with(&self.ffprobe, path)?)
    }
}

/// Check the encoded output against what branding should have produced.
///
/// Resolution must match the source exactly; duration must be within
/// `tolerance` seconds of source plus closing segment.
pub fn verify_output(
    source: &MediaInfo,
    closing: &MediaInfo,
    output: &MediaInfo,
    tolerance: f64,
) -> Result<(), TransformError> {
    if output.resolution() != source.resolution() {
        return Err(TransformError::OutputMismatch(format!(
            "resolution {:?} differs from source {:?}",
            output.resolution(),
            source.resolution()
        )));
    }

    let expected = source.duration_secs() + closing.duration_secs();
    let actual = output.duration_secs();
    if (actual - expected).abs() > tolerance {
        return Err(TransformError::OutputMismatch(format!(
            "duration {:.3}s, expected {:.3}s (source {:.3}s + closing {:.3}s)",
            actual,
            expected,
            source.duration_secs(),
            closing.duration_secs()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vidrelay_av::VideoTrack;
    use vidrelay_common::VideoId;

    fn info(w: u32, h: u32, secs: f64) -> MediaInfo {
        MediaInfo {
            file_path: PathBuf::from("x.mp4"),
            file_size: 1,
            container: "mp4".into(),
            duration: Some(Duration::from_secs_f64(secs)),
            video_tracks: vec![VideoTrack {
                index: 0,
                codec: "h264".into(),
                width: w,
                height: h,
                frame_rate: Some(30.0),
            }],
            audio_tracks: vec![],
        }
    }

    fn spec(dir: &Path) -> TransformSpec {
        TransformSpec {
            overlay_path: dir.join("logo.png"),
            overlay_height: 50,
            corner: Corner::TopRight,
            margin: 8,
            closing_segment_path: dir.join("end_video.mp4"),
            encode: EncodeSettings::default(),
            duration_tolerance_secs: 1.0,
        }
    }

    #[test]
    fn test_verify_accepts_expected_output() {
        let src = info(1280, 720, 10.0);
        let end = info(1920, 1080, 3.0);
        verify_output(&src, &end, &info(1280, 720, 13.2), 1.0).unwrap();
    }

    #[test]
    fn test_verify_rejects_resolution_change() {
        let src = info(1280, 720, 10.0);
        let end = info(1280, 720, 3.0);
        let err = verify_output(&src, &end, &info(1920, 1080, 13.0), 1.0).unwrap_err();
        assert!(matches!(err, TransformError::OutputMismatch(_)));
    }

    #[test]
    fn test_verify_rejects_duration_drift() {
        let src = info(640, 360, 10.0);
        let end = info(640, 360, 3.0);
        assert!(verify_output(&src, &end, &info(640, 360, 10.0), 1.0).is_err());
        assert!(verify_output(&src, &end, &info(640, 360, 14.5), 1.0).is_err());
    }

    #[tokio::test]
    async fn test_missing_overlay_fails_transform_every_time() {
        let dir = tempfile::tempdir().unwrap();
        let transformer = FfmpegTransformer::new(
            spec(dir.path()),
            "ffmpeg",
            "ffprobe",
            dir.path().join("out"),
            dir.path().join("cache"),
        );

        let raw_path = dir.path().join("abc.mp4");
        std::fs::write(&raw_path, b"data").unwrap();
        let raw = LocalAsset::new(VideoId::from("abc"), &raw_path);

        for _ in 0..2 {
            let err = transformer.transform(&raw).await.unwrap_err();
            assert!(matches!(err, TransformError::Overlay(_)));
        }
        assert!(transformer.overlay.lock().is_none());
    }

    #[tokio::test]
    async fn test_overlay_is_memoized_after_success() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbaImage::new(100, 100)
            .save_with_format(dir.path().join("logo.png"), image::ImageFormat::Png)
            .unwrap();

        let transformer = FfmpegTransformer::new(
            spec(dir.path()),
            "ffmpeg",
            "ffprobe",
            dir.path().join("out"),
            dir.path().join("cache"),
        );

        let first = transformer.scaled_overlay().await.unwrap();
        let second = transformer.scaled_overlay().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!((first.width, first.height), (50, 50));
    }
}
