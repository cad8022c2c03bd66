//! Derived overlay images.
//!
//! The canonical overlay file is only ever read. Scaled copies are written to
//! a cache directory under a name derived from the source content and the
//! target height, so repeated runs reuse them and a changed logo produces a
//! new file instead of silently reusing a stale one.

use crate::{Error, Result};
use image::imageops::FilterType;
use image::ImageFormat;
use sha2::{Digest, Sha256};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

/// A scaled overlay ready to be composited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaledOverlay {
    /// Path of the derived PNG.
    pub path: PathBuf,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Scale `source` to `target_height` pixels, preserving aspect ratio.
///
/// The result is stored as `<cache_dir>/overlay-<hash>-h<height>.png` and
/// reused when it already exists.
pub fn scale_overlay(source: &Path, target_height: u32, cache_dir: &Path) -> Result<ScaledOverlay> {
    if target_height == 0 {
        return Err(Error::InvalidInput(
            "overlay target height must be positive".to_string(),
        ));
    }

    let data = std::fs::read(source).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::file_not_found(source)
        } else {
            Error::Io(e)
        }
    })?;

    let hash = compute_hash(&data);
    let cached = cache_dir.join(cached_file_name(&hash, target_height));

    if cached.exists() {
        if let Ok((width, height)) = image::image_dimensions(&cached) {
            #[cfg(feature = "tracing")]
            tracing::debug!("Reusing scaled overlay {:?}", cached);
            return Ok(ScaledOverlay {
                path: cached,
                width,
                height,
            });
        }
        // Unreadable cache entry; regenerate it below.
    }

    let img = image::load_from_memory(&data)?;
    let width = scaled_width(img.width(), img.height(), target_height);
    let resized = img.resize_exact(width, target_height, FilterType::Lanczos3);

    let mut buf = Cursor::new(Vec::new());
    resized.write_to(&mut buf, ImageFormat::Png)?;

    std::fs::create_dir_all(cache_dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(cache_dir)?;
    tmp.write_all(&buf.into_inner())?;
    tmp.persist(&cached).map_err(|e| Error::Io(e.error))?;

    #[cfg(feature = "tracing")]
    tracing::info!(
        "Scaled overlay {:?} to {}x{} at {:?}",
        source,
        width,
        target_height,
        cached
    );

    Ok(ScaledOverlay {
        path: cached,
        width,
        height: target_height,
    })
}

/// Width that keeps the aspect ratio at the target height (at least 1px).
pub fn scaled_width(width: u32, height: u32, target_height: u32) -> u32 {
    if height == 0 {
        return 1;
    }
    let w = (f64::from(width) * f64::from(target_height) / f64::from(height)).round();
    (w as u32).max(1)
}

fn cached_file_name(hash: &str, height: u32) -> String {
    format!("overlay-{}-h{}.png", hash, height)
}

/// Compute a content hash (first 16 hex chars of SHA-256).
fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}
