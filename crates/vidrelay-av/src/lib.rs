//! # vidrelay-av
//!
//! Media tooling for the relay pipeline.
//!
//! This crate provides functionality for:
//! - Locating the external tools the pipeline shells out to (ffmpeg, ffprobe, yt-dlp)
//! - Probing media files with ffprobe (duration, resolution, frame rate, audio)
//! - Scaling an overlay image into a cached, derived PNG
//! - Branding a video: overlay in a corner plus an appended closing segment
//!
//! ## Features
//!
//! - `tracing` - Enable tracing support
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use vidrelay_av::probe_with;
//!
//! let info = probe_with(Path::new("/usr/bin/ffprobe"), "/tmp/downloads/dQw4w9WgXcQ.mp4")?;
//! println!("Duration: {:.1}s", info.duration_secs());
//! if let Some((w, h)) = info.resolution() {
//!     println!("Resolution: {}x{}", w, h);
//! }
//! # Ok::<(), vidrelay_av::Error>(())
//! ```

mod error;
pub mod actions;
pub mod overlay;
pub mod probe;
pub mod tools;
pub mod workspace;

// Re-exports
pub use actions::{BrandSpec, Corner, EncodeSettings};
pub use error::{Error, Result};
pub use overlay::{scale_overlay, ScaledOverlay};
pub use probe::{AudioTrack, MediaInfo, VideoTrack};
pub use tools::{check_program, get_tool_path, require_tool, ToolInfo};
pub use workspace::Workspace;

/// Probe a media file using an explicit ffprobe executable.
pub fn probe_with<P: AsRef<std::path::Path>>(ffprobe: &std::path::Path, path: P) -> Result<MediaInfo> {
    probe::probe_with_ffprobe(ffprobe, path.as_ref())
}
