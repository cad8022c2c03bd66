//! Path utilities: deterministic asset names and atomic writes.
//!
//! Downloaded and processed files are named from the video id alone so that a
//! re-run for the same video overwrites its stale artifacts instead of piling
//! up new ones.

use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};
use crate::ids::VideoId;

/// Replace characters that are unsafe in a file name.
///
/// Anything other than ASCII alphanumerics, `-` and `_` becomes `_`, so an id
/// can never escape the directory it is joined onto.
///
/// # Examples
///
/// ```
/// use vidrelay_common::paths::sanitize_file_stem;
///
/// assert_eq!(sanitize_file_stem("abc-DEF_123"), "abc-DEF_123");
/// assert_eq!(sanitize_file_stem("../etc/passwd"), "___etc_passwd");
/// ```
pub fn sanitize_file_stem(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// File name of the raw download for a video: `<id>.mp4`.
pub fn raw_asset_name(id: &VideoId) -> String {
    format!("{}.mp4", sanitize_file_stem(id.as_str()))
}

/// File name of the transformed output for a video: `processed_<id>.mp4`.
pub fn processed_asset_name(id: &VideoId) -> String {
    format!("processed_{}.mp4", sanitize_file_stem(id.as_str()))
}

/// Write `contents` to `path` so readers see either the old or the new file.
///
/// The bytes go to a temporary file in the same directory, are synced, and
/// then renamed over the destination.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| Error::io(format!("persist {}: {}", path.display(), e.error)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_names() {
        let id = VideoId::new("dQw4w9WgXcQ");
        assert_eq!(raw_asset_name(&id), "dQw4w9WgXcQ.mp4");
        assert_eq!(processed_asset_name(&id), "processed_dQw4w9WgXcQ.mp4");
    }

    #[test]
    fn test_asset_name_is_sanitized() {
        let id = VideoId::new("a/b");
        assert_eq!(raw_asset_name(&id), "a_b.mp4");
        assert_eq!(sanitize_file_stem(""), "_");
    }

    #[test]
    fn test_write_atomic_creates_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("checkpoint");

        write_atomic(&path, b"first").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"first");

        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");

        // Only the destination remains; no temp files left behind.
        let entries: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }
}
