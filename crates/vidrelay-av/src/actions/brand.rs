//! Brand a video: composite an overlay and append a closing segment.
//!
//! The whole operation is one ffmpeg invocation with a filter graph:
//!
//! ```text
//! [0] source ──overlay(corner, margin)──┐
//! [1] overlay png ──────────────────────┘──> [v0]
//! [2] closing ──scale/pad to source size──> [v1]
//! audio from each side (or silence) ──────> [a0] [a1]
//! [v0][a0][v1][a1] concat ──> libx264/aac mp4
//! ```
//!
//! The overlay input is a single still frame; ffmpeg's overlay filter repeats
//! its last frame, so it stays visible for the full source duration.

use crate::probe::MediaInfo;
use crate::{Error, Result, Workspace};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Frame rate used when the source does not report one.
const DEFAULT_FRAME_RATE: f64 = 30.0;

/// Audio sample rate both halves are resampled to before concatenation.
const AUDIO_SAMPLE_RATE: u32 = 48_000;

/// Corner of the frame the overlay is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    #[default]
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    /// Overlay filter `x`/`y` expressions for this corner and margin.
    ///
    /// `W`/`H` are the main frame size and `w`/`h` the overlay size.
    pub fn position(&self, margin: u32) -> (String, String) {
        let m = margin;
        match self {
            Corner::TopLeft => (format!("{m}"), format!("{m}")),
            Corner::TopRight => (format!("W-w-{m}"), format!("{m}")),
            Corner::BottomLeft => (format!("{m}"), format!("H-h-{m}")),
            Corner::BottomRight => (format!("W-w-{m}"), format!("H-h-{m}")),
        }
    }
}

impl std::str::FromStr for Corner {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "top_left" => Ok(Corner::TopLeft),
            "top_right" => Ok(Corner::TopRight),
            "bottom_left" => Ok(Corner::BottomLeft),
            "bottom_right" => Ok(Corner::BottomRight),
            _ => Err(format!("Unknown corner: {}", s)),
        }
    }
}

impl std::fmt::Display for Corner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Corner::TopLeft => "top_left",
            Corner::TopRight => "top_right",
            Corner::BottomLeft => "bottom_left",
            Corner::BottomRight => "bottom_right",
        };
        f.write_str(s)
    }
}

/// Fixed output encoding settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSettings {
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
    /// Move the moov atom to the front for progressive playback.
    pub faststart: bool,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: "medium".to_string(),
            crf: 20,
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            faststart: true,
        }
    }
}

/// Inputs of one branding operation.
#[derive(Debug, Clone)]
pub struct BrandSpec {
    /// Pre-scaled overlay image.
    pub overlay: PathBuf,
    pub corner: Corner,
    pub margin: u32,
    /// Segment appended after the source.
    pub closing_segment: PathBuf,
    pub encode: EncodeSettings,
}

/// Build the `-filter_complex` graph for a source and closing segment.
///
/// Input indices: 0 = source, 1 = overlay, 2 = closing segment.
pub fn build_filter_graph(spec: &BrandSpec, source: &MediaInfo, closing: &MediaInfo) -> Result<String> {
    let (width, height) = source
        .resolution()
        .filter(|(w, h)| *w > 0 && *h > 0)
        .ok_or_else(|| Error::InvalidInput("source has no video stream".to_string()))?;
    if closing.primary_video().is_none() {
        return Err(Error::InvalidInput(
            "closing segment has no video stream".to_string(),
        ));
    }

    let fps = format_fps(
        source
            .primary_video()
            .and_then(|v| v.frame_rate)
            .unwrap_or(DEFAULT_FRAME_RATE),
    );
    let (x, y) = spec.corner.position(spec.margin);
    let audio_format = format!(
        "aresample={AUDIO_SAMPLE_RATE},aformat=sample_fmts=fltp:channel_layouts=stereo"
    );

    let mut chains = vec![
        format!("[0:v][1:v]overlay=x={x}:y={y}:format=auto,setsar=1,fps={fps},format=yuv420p[v0]"),
        format!(
            "[2:v]scale={width}:{height}:force_original_aspect_ratio=decrease,\
             pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},format=yuv420p[v1]"
        ),
    ];

    chains.push(audio_chain(0, source, &audio_format, "a0"));
    chains.push(audio_chain(2, closing, &audio_format, "a1"));
    chains.push("[v0][a0][v1][a1]concat=n=2:v=1:a=1[outv][outa]".to_string());

    Ok(chains.join(";"))
}

fn audio_chain(input: usize, info: &MediaInfo, audio_format: &str, label: &str) -> String {
    if info.has_audio() {
        format!("[{input}:a:0]{audio_format}[{label}]")
    } else {
        // Silence as long as the video so concat stays aligned.
        format!(
            "anullsrc=r={AUDIO_SAMPLE_RATE}:cl=stereo,atrim=duration={:.3},{audio_format}[{label}]",
            info.duration_secs()
        )
    }
}

fn format_fps(fps: f64) -> String {
    let s = format!("{:.3}", fps);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Build the full ffmpeg argument list.
pub fn build_ffmpeg_args(
    spec: &BrandSpec,
    source: &MediaInfo,
    closing: &MediaInfo,
    output: &Path,
) -> Result<Vec<OsString>> {
    let graph = build_filter_graph(spec, source, closing)?;
    let enc = &spec.encode;

    let mut args: Vec<OsString> = ["-y", "-hide_banner", "-loglevel", "error", "-i"]
        .iter()
        .map(OsString::from)
        .collect();
    args.push(source.file_path.clone().into_os_string());
    args.push("-i".into());
    args.push(spec.overlay.clone().into_os_string());
    args.push("-i".into());
    args.push(spec.closing_segment.clone().into_os_string());

    for arg in [
        "-filter_complex",
        graph.as_str(),
        "-map",
        "[outv]",
        "-map",
        "[outa]",
        "-c:v",
        enc.video_codec.as_str(),
        "-preset",
        enc.preset.as_str(),
        "-crf",
    ] {
        args.push(arg.into());
    }
    args.push(enc.crf.to_string().into());
    for arg in [
        "-pix_fmt",
        "yuv420p",
        "-c:a",
        enc.audio_codec.as_str(),
        "-b:a",
        enc.audio_bitrate.as_str(),
    ] {
        args.push(arg.into());
    }
    if enc.faststart {
        args.push("-movflags".into());
        args.push("+faststart".into());
    }
    args.push(output.as_os_str().to_os_string());

    Ok(args)
}

/// Brand the workspace input and write the result to `workspace.output()`.
pub fn brand_video(
    ffmpeg: &Path,
    workspace: &Workspace,
    spec: &BrandSpec,
    source: &MediaInfo,
    closing: &MediaInfo,
) -> Result<()> {
    let args = build_ffmpeg_args(spec, source, closing, workspace.output())?;

    #[cfg(feature = "tracing")]
    tracing::info!(
        "Branding {:?} (overlay {:?}, closing {:?})",
        workspace.input(),
        spec.overlay,
        spec.closing_segment
    );

    let output = Command::new(ffmpeg).args(&args).output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::tool_not_found("ffmpeg")
        } else {
            Error::Io(e)
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::tool_failed("ffmpeg", stderr.trim().to_string()));
    }

    if !workspace.output().exists() {
        return Err(Error::tool_failed("ffmpeg", "no output file produced"));
    }

    #[cfg(feature = "tracing")]
    tracing::info!("Branding complete: {:?}", workspace.output());

    Ok(())
}
