//! Staged output writing
//!
//! Executors write into a private directory next to the target and the result
//! is moved into place with a single rename once it is complete. The staging
//! directory is removed when the [`StagedOutput`] is dropped, whatever the outcome.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};

use crate::domain::errors::ExecError;
use crate::output::OverwritePolicy;

/// File stem used for everything the executor writes
const STAGE_STEM: &str = "clip";

/// Suffixes of unfinished downloads
const PARTIAL_SUFFIXES: [&str; 3] = [".part", ".ytdl", ".temp"];

/// Scratch directory for one clip
#[derive(Debug)]
pub struct StagedOutput {
    dir: TempDir,
    target: PathBuf,
}

impl StagedOutput {
    /// Create the staging directory beside `target`, creating parent directories
    /// as needed. Staying on the same filesystem keeps the final rename atomic.
    pub fn create(target: &Path) -> io::Result<Self> {
        let parent = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let dir = tempfile::Builder::new()
            .prefix(".ytclip-")
            .tempdir_in(&parent)?;
        debug!("Staging output in {}", dir.path().display());

        Ok(Self {
            dir,
            target: target.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// yt-dlp output template inside the staging directory
    pub fn template(&self) -> PathBuf {
        self.dir.path().join(format!("{}.%(ext)s", STAGE_STEM))
    }

    /// Path of a staged file with the given extension
    pub fn staged_file(&self, extension: &str) -> PathBuf {
        self.dir.path().join(format!("{}.{}", STAGE_STEM, extension))
    }

    /// Move the finished file to the target and drop the staging directory.
    ///
    /// Only `clip.<target extension>` is accepted; any other finished file means
    /// the executor did not produce the planned container.
    pub fn commit(self, policy: OverwritePolicy) -> Result<PathBuf, ExecError> {
        let produced = self.find_produced()?;

        if !policy.allows_overwrite() && self.target.exists() {
            return Err(ExecError::OutputExists(self.target.clone()));
        }

        fs::rename(&produced, &self.target)?;
        info!("Output written to {}", self.target.display());
        Ok(self.target)
    }

    fn find_produced(&self) -> io::Result<PathBuf> {
        let ext = self
            .target
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let expected = self.staged_file(ext);
        if expected.is_file() {
            return Ok(expected);
        }

        let prefix = format!("{}.", STAGE_STEM);
        let mut produced = Vec::new();
        for entry in fs::read_dir(self.dir.path())? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            let finished = !PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s));
            if finished && entry.path().is_file() {
                if let Some(other) = name.strip_prefix(&prefix) {
                    produced.push(other.to_string());
                }
            }
        }
        produced.sort();

        if produced.is_empty() {
            Err(io::Error::new(
                io::ErrorKind::NotFound,
                "executor finished without producing an output file",
            ))
        } else {
            Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "executor produced .{} instead of the planned .{} container",
                    produced.join(", ."),
                    ext
                ),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_moves_expected_file() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("out").join("clip.mkv");

        let staged = StagedOutput::create(&target).unwrap();
        let staging_dir = staged.dir().to_path_buf();
        fs::write(staged.staged_file("mkv"), b"data").unwrap();

        let written = staged.commit(OverwritePolicy::Never).unwrap();
        assert_eq!(written, target);
        assert_eq!(fs::read(&target).unwrap(), b"data");
        assert!(!staging_dir.exists());
    }

    #[test]
    fn test_commit_rejects_other_container() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("a.mkv");

        let staged = StagedOutput::create(&target).unwrap();
        let staging_dir = staged.dir().to_path_buf();
        fs::write(staged.staged_file("mp4"), b"video").unwrap();
        fs::write(staged.staged_file("f140.m4a.part"), b"partial").unwrap();

        let err = staged.commit(OverwritePolicy::Always).unwrap_err();
        match err {
            ExecError::Io(e) => {
                assert_eq!(e.kind(), io::ErrorKind::InvalidData);
                assert!(e.to_string().contains(".mp4"), "{}", e);
                assert!(e.to_string().contains(".mkv"), "{}", e);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!target.exists());
        assert!(!staging_dir.exists());
    }

    #[test]
    fn test_commit_without_output_fails_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("a.mkv");

        let staged = StagedOutput::create(&target).unwrap();
        let staging_dir = staged.dir().to_path_buf();

        let err = staged.commit(OverwritePolicy::Always).unwrap_err();
        assert!(matches!(err, ExecError::Io(_)));
        assert!(!target.exists());
        assert!(!staging_dir.exists());
    }

    #[test]
    fn test_commit_respects_existing_target() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("a.mkv");
        fs::write(&target, b"old").unwrap();

        let staged = StagedOutput::create(&target).unwrap();
        fs::write(staged.staged_file("mkv"), b"new").unwrap();
        let err = staged.commit(OverwritePolicy::Never).unwrap_err();
        assert!(matches!(err, ExecError::OutputExists(_)));
        assert_eq!(fs::read(&target).unwrap(), b"old");

        let staged = StagedOutput::create(&target).unwrap();
        fs::write(staged.staged_file("mkv"), b"new").unwrap();
        staged.commit(OverwritePolicy::Always).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new");
    }

    #[test]
    fn test_template_lives_in_staging_dir() {
        let root = tempfile::tempdir().unwrap();
        let staged = StagedOutput::create(&root.path().join("x.mka")).unwrap();
        assert!(staged.template().starts_with(staged.dir()));
        assert!(staged.template().to_string_lossy().ends_with("clip.%(ext)s"));
    }
}
