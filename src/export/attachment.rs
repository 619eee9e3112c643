//! Write decoded attachments to disk.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{FetchError, Result};

/// Writes attachment bytes into one directory under generated names.
#[derive(Debug, Clone)]
pub struct AttachmentWriter {
    dir: PathBuf,
}

impl AttachmentWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Writer for the system temp directory.
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `content` to a new file and return its path.
    ///
    /// The directory is created if needed. The file name is generated and
    /// never reuses an existing file. If writing fails the partial file is
    /// removed before the error is returned.
    pub fn write(&self, content: &[u8]) -> Result<PathBuf> {
        ensure_dir(&self.dir)?;

        let path = self.dir.join(generate_filename());
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| FetchError::CreateFile {
                path: path.clone(),
                source,
            })?;
        write_contents(&path, file, content)?;

        debug!(path = %path.display(), bytes = content.len(), "Attachment written");
        Ok(path)
    }
}

/// Write `content` to the just-created file at `path`. On failure the
/// partial file is removed.
fn write_contents(path: &Path, mut out: impl Write, content: &[u8]) -> Result<()> {
    if let Err(source) = out.write_all(content).and_then(|()| out.flush()) {
        drop(out);
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "Failed to remove partial attachment");
        }
        return Err(FetchError::WriteFile {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

/// `imap<UTC timestamp>-<uuid>.attachment`
fn generate_filename() -> String {
    format!(
        "imap{}-{}.attachment",
        Utc::now().format("%Y%m%d%H%M%S%6f"),
        Uuid::new_v4().simple()
    )
}

#[cfg(unix)]
fn ensure_dir(dir: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    if dir.is_dir() {
        return Ok(());
    }
    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o770)
        .create(dir)
        .map_err(|source| FetchError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })
}

#[cfg(not(unix))]
fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| FetchError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}
