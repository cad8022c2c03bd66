//! Media file probing module.
//!
//! Probing shells out to `ffprobe` and parses its JSON report. Only the
//! fields the branding pipeline needs are kept: duration, resolution, frame
//! rate and whether audio is present.

mod ffprobe;
mod types;

pub use ffprobe::{parse_ffprobe_json, probe_with_ffprobe};
pub use types::*;
