//! Media information types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Information about a media file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Path to the media file.
    pub file_path: PathBuf,
    /// File size in bytes.
    pub file_size: u64,
    /// Container format as reported by ffprobe (e.g., "mov,mp4,m4a,3gp,3g2,mj2").
    pub container: String,
    /// Duration of the media.
    pub duration: Option<Duration>,
    /// Video tracks in the file.
    pub video_tracks: Vec<VideoTrack>,
    /// Audio tracks in the file.
    pub audio_tracks: Vec<AudioTrack>,
}

/// Information about a video track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoTrack {
    /// Track index.
    pub index: u32,
    /// Video codec (e.g., "h264", "vp9").
    pub codec: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Frame rate in FPS.
    pub frame_rate: Option<f64>,
}

/// Information about an audio track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioTrack {
    /// Track index.
    pub index: u32,
    /// Audio codec (e.g., "aac", "opus").
    pub codec: String,
    /// Number of channels.
    pub channels: u32,
    /// Sample rate in Hz.
    pub sample_rate: Option<u32>,
}

impl MediaInfo {
    /// Get the primary (first) video track.
    pub fn primary_video(&self) -> Option<&VideoTrack> {
        self.video_tracks.first()
    }

    /// Resolution of the primary video track.
    pub fn resolution(&self) -> Option<(u32, u32)> {
        self.primary_video().map(|v| (v.width, v.height))
    }

    /// Whether the file carries at least one audio track.
    pub fn has_audio(&self) -> bool {
        !self.audio_tracks.is_empty()
    }

    /// Duration in seconds, or 0.0 when unknown.
    pub fn duration_secs(&self) -> f64 {
        self.duration.map(|d| d.as_secs_f64()).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(audio: bool) -> MediaInfo {
        MediaInfo {
            file_path: PathBuf::from("a.mp4"),
            file_size: 10,
            container: "mp4".into(),
            duration: Some(Duration::from_millis(2500)),
            video_tracks: vec![VideoTrack {
                index: 0,
                codec: "h264".into(),
                width: 1280,
                height: 720,
                frame_rate: Some(30.0),
            }],
            audio_tracks: if audio {
                vec![AudioTrack {
                    index: 0,
                    codec: "aac".into(),
                    channels: 2,
                    sample_rate: Some(44100),
                }]
            } else {
                Vec::new()
            },
        }
    }

    #[test]
    fn test_media_info_accessors() {
        let info = sample(true);
        assert_eq!(info.resolution(), Some((1280, 720)));
        assert!(info.has_audio());
        assert!((info.duration_secs() - 2.5).abs() < f64::EPSILON);
        assert!(!sample(false).has_audio());
    }
}
