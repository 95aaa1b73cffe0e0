//! Persists a rendered report under the output directory.

use regex::Regex;
use std::{
  fs::{self, OpenOptions},
  io::{self, Write},
  path::{Path, PathBuf},
  sync::LazyLock,
};
use thiserror::Error;
use tracing::debug;

static RE_UNSAFE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.\-]").unwrap());

#[derive(Debug, Error)]
pub enum SinkError {
  #[error("File '{0}' already exists. Choose a different name.")]
  AlreadyExists(String),
  #[error("'{0}' is not a usable file name")]
  InvalidName(String),
  #[error("Failed to create output directory {}: {source}", .path.display())]
  CreateDir { path: PathBuf, source: io::Error },
  #[error("Failed to save results: {0}")]
  Write(#[from] io::Error),
}

/// Replaces everything outside `[A-Za-z0-9_.-]` with `_` and keeps only the
/// final path component.
///
/// Separators are replaced first, so `../../etc/passwd` becomes
/// `.._.._etc_passwd`. Names that reduce to nothing, `.` or `..` yield `None`.
#[must_use]
pub fn sanitize_filename(name: &str) -> Option<String> {
  let replaced = RE_UNSAFE.replace_all(name, "_");
  let base = Path::new(replaced.as_ref()).file_name()?.to_str()?;
  match base {
    "" | "." | ".." => None,
    _ => Some(base.to_string()),
  }
}

/// Where a report will be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
  sanitized_filename: String,
  directory: PathBuf,
}

impl OutputTarget {
  /// # Errors
  ///
  /// Returns [`SinkError::InvalidName`] if nothing usable survives sanitizing.
  pub fn new(
    directory: impl Into<PathBuf>,
    requested: &str,
  ) -> Result<Self, SinkError> {
    let sanitized_filename = sanitize_filename(requested)
      .ok_or_else(|| SinkError::InvalidName(requested.to_string()))?;
    Ok(Self {
      sanitized_filename,
      directory: directory.into(),
    })
  }

  #[must_use]
  pub fn file_name(&self) -> &str {
    &self.sanitized_filename
  }

  #[must_use]
  pub fn path(&self) -> PathBuf {
    self.directory.join(&self.sanitized_filename)
  }

  /// Writes `contents`, creating the directory if needed.
  ///
  /// The file is opened with create-new semantics, so an existing file is
  /// never truncated or replaced, even one created after this call started.
  ///
  /// # Errors
  ///
  /// Returns [`SinkError::AlreadyExists`] if the target exists, or an I/O
  /// error if the directory or file cannot be written.
  pub fn save(&self, contents: &str) -> Result<PathBuf, SinkError> {
    fs::create_dir_all(&self.directory).map_err(|source| {
      SinkError::CreateDir {
        path: self.directory.clone(),
        source,
      }
    })?;

    let path = self.path();
    let mut file = OpenOptions::new()
      .write(true)
      .create_new(true)
      .open(&path)
      .map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => {
          SinkError::AlreadyExists(self.sanitized_filename.clone())
        }
        _ => SinkError::Write(e),
      })?;

    write_or_remove(&path, move || {
      file.write_all(contents.as_bytes())?;
      file.sync_all()
    })?;
    debug!(path = %path.display(), bytes = contents.len(), "report saved");
    Ok(path)
  }
}

/// Runs `write`; if it fails, the half-written file at `path` is deleted.
fn write_or_remove(
  path: &Path,
  write: impl FnOnce() -> io::Result<()>,
) -> Result<(), SinkError> {
  write().map_err(|e| {
    if let Err(rm) = fs::remove_file(path) {
      debug!(
        path = %path.display(),
        error = %rm,
        "could not remove partial file"
      );
    }
    SinkError::Write(e)
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn traversal_is_flattened() {
    assert_eq!(
      sanitize_filename("../../etc/passwd").as_deref(),
      Some(".._.._etc_passwd")
    );
    assert_eq!(
      sanitize_filename("/abs/path.txt").as_deref(),
      Some("_abs_path.txt")
    );
    assert_eq!(
      sanitize_filename("report 1;rm -rf.txt").as_deref(),
      Some("report_1_rm_-rf.txt")
    );
    assert_eq!(
      sanitize_filename("ok-name_1.txt").as_deref(),
      Some("ok-name_1.txt")
    );
  }

  #[test]
  fn degenerate_names_are_rejected() {
    assert!(sanitize_filename("").is_none());
    assert!(sanitize_filename(".").is_none());
    assert!(sanitize_filename("..").is_none());
  }

  #[test]
  fn target_stays_inside_directory() {
    let dir = tempdir().expect("tempdir");
    let target =
      OutputTarget::new(dir.path(), "../../etc/passwd").expect("valid name");
    let path = target.path();
    assert_eq!(path.parent(), Some(dir.path()));

    let saved = target.save("report").expect("first save");
    assert_eq!(saved, path);
    assert_eq!(fs::read_to_string(&path).expect("read back"), "report");
  }

  #[test]
  fn creates_missing_directory() {
    let dir = tempdir().expect("tempdir");
    let nested = dir.path().join("outputs");
    let target = OutputTarget::new(&nested, "r.txt").expect("valid name");
    target.save("x").expect("save");
    assert!(nested.join("r.txt").is_file());
  }

  #[test]
  fn existing_file_is_left_untouched() {
    let dir = tempdir().expect("tempdir");
    let existing = dir.path().join("scan.txt");
    fs::write(&existing, "original").expect("seed file");

    let target =
      OutputTarget::new(dir.path(), "scan.txt").expect("valid name");
    let err = target.save("new contents").expect_err("must refuse");
    assert!(matches!(err, SinkError::AlreadyExists(ref n) if n == "scan.txt"));
    assert_eq!(
      err.to_string(),
      "File 'scan.txt' already exists. Choose a different name."
    );
    assert_eq!(fs::read_to_string(&existing).expect("read"), "original");
  }

  #[test]
  fn failed_write_leaves_no_partial_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("partial.txt");
    fs::write(&path, "half a rep").expect("seed file");

    let err = write_or_remove(&path, || Err(io::Error::other("disk full")))
      .expect_err("write must fail");
    assert!(matches!(err, SinkError::Write(_)));
    assert_eq!(err.to_string(), "Failed to save results: disk full");
    assert!(!path.exists());

    // Retrying the same name is no longer blocked.
    let target =
      OutputTarget::new(dir.path(), "partial.txt").expect("valid name");
    target.save("full report").expect("save after cleanup");
    assert_eq!(fs::read_to_string(&path).expect("read"), "full report");
  }

  #[test]
  fn successful_write_keeps_the_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("kept.txt");
    fs::write(&path, "done").expect("seed file");

    write_or_remove(&path, || Ok(())).expect("no error");
    assert!(path.is_file());
  }
}
