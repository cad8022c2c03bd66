//! Workspace management for media actions.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Workspace for a single media action.
///
/// Provides a temporary directory for intermediate files and a staging
/// output path. Nothing appears at the final destination until
/// [`Workspace::finalize`] succeeds; dropping the workspace discards
/// everything it staged.
///
/// # Example
///
/// ```no_run
/// use vidrelay_av::Workspace;
/// use std::path::Path;
///
/// let workspace = Workspace::new("/tmp/downloads/abc.mp4", "processed_abc.mp4")?;
/// // ffmpeg writes to workspace.output()
/// workspace.finalize(Path::new("/tmp/downloads/processed_abc.mp4"))?;
/// # Ok::<(), vidrelay_av::Error>(())
/// ```
pub struct Workspace {
    temp_dir: TempDir,
    input_path: PathBuf,
    output_path: PathBuf,
}

impl Workspace {
    /// Create a workspace next to the input file.
    ///
    /// Staging in the input's directory keeps the final rename on the same
    /// filesystem.
    pub fn new<P: AsRef<Path>>(input: P, output_name: &str) -> Result<Self> {
        let input = input.as_ref();
        let parent = match input.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::new_in(input, output_name, &parent)
    }

    /// Create a workspace whose temporary directory lives under `dir`.
    pub fn new_in<P: AsRef<Path>>(input: P, output_name: &str, dir: &Path) -> Result<Self> {
        if output_name.is_empty() || output_name.contains(std::path::MAIN_SEPARATOR) {
            return Err(Error::InvalidInput(format!(
                "invalid output name: {:?}",
                output_name
            )));
        }

        std::fs::create_dir_all(dir).map_err(|e| Error::Workspace(e.to_string()))?;
        let temp_dir = tempfile::Builder::new()
            .prefix(".vidrelay-")
            .tempdir_in(dir)
            .map_err(|e| Error::Workspace(e.to_string()))?;

        let output_path = temp_dir.path().join(output_name);

        Ok(Self {
            temp_dir,
            input_path: input.as_ref().to_path_buf(),
            output_path,
        })
    }

    /// Get the input file path.
    pub fn input(&self) -> &Path {
        &self.input_path
    }

    /// Get the staging output path.
    pub fn output(&self) -> &Path {
        &self.output_path
    }

    /// Get the temp directory path.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Move the staged output to `destination`, replacing any stale file.
    ///
    /// Falls back to copy-then-rename when the destination is on another
    /// filesystem.
    pub fn finalize(self, destination: &Path) -> Result<PathBuf> {
        if !self.output_path.exists() {
            return Err(Error::Workspace(format!(
                "Output file does not exist: {:?}",
                self.output_path
            )));
        }

        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        if std::fs::rename(&self.output_path, destination).is_err() {
            let staging = destination.with_extension("partial");
            std::fs::copy(&self.output_path, &staging).map_err(|e| {
                Error::Workspace(format!("Failed to copy output to destination: {}", e))
            })?;
            if let Err(e) = std::fs::rename(&staging, destination) {
                let _ = std::fs::remove_file(&staging);
                return Err(Error::Workspace(format!(
                    "Failed to move output to destination: {}",
                    e
                )));
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Finalized {:?} -> {:?}", self.output_path, destination);

        Ok(destination.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_paths() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("abc.mp4");
        let workspace = Workspace::new(&input, "processed_abc.mp4").unwrap();

        assert_eq!(workspace.input(), input.as_path());
        assert!(workspace.output().starts_with(workspace.temp_dir()));
        assert!(workspace.temp_dir().starts_with(dir.path()));
        assert_eq!(
            workspace.output().file_name().unwrap(),
            "processed_abc.mp4"
        );
    }

    #[test]
    fn test_finalize_moves_output_and_replaces_stale() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("processed_abc.mp4");
        std::fs::write(&dest, b"stale").unwrap();

        let workspace = Workspace::new(dir.path().join("abc.mp4"), "processed_abc.mp4").unwrap();
        std::fs::write(workspace.output(), b"fresh").unwrap();
        let temp = workspace.temp_dir().to_path_buf();

        let final_path = workspace.finalize(&dest).unwrap();
        assert_eq!(final_path, dest);
        assert_eq!(std::fs::read(&dest).unwrap(), b"fresh");
        assert!(!temp.exists());
    }

    #[test]
    fn test_finalize_without_output_fails() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path().join("abc.mp4"), "out.mp4").unwrap();
        let err = workspace.finalize(&dir.path().join("out.mp4")).unwrap_err();
        assert!(matches!(err, Error::Workspace(_)));
        assert!(!dir.path().join("out.mp4").exists());
    }

    #[test]
    fn test_invalid_output_name() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Workspace::new(dir.path().join("a.mp4"), "").is_err());
    }
}
