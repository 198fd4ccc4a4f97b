use actix_web::web;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Extension given to every staged upload; also what the startup purge
/// looks for.
pub const STAGED_EXTENSION: &str = "upload";

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("Staging directory {path} is unusable: {source}")]
    Directory {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to stage upload: {0}")]
    Write(std::io::Error),
    #[error("Failed to read staged upload: {0}")]
    Read(std::io::Error),
    #[error("Failed to remove staged file {path}: {source}")]
    Remove {
        path: String,
        source: std::io::Error,
    },
}

/// Owns the directory uploads are staged in.
#[derive(Clone, Debug)]
pub struct Stager {
    dir: PathBuf,
}

impl Stager {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StagingError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StagingError::Directory {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Staged names come from a fresh random token only; nothing the client
    /// sends ends up in the path.
    pub fn staged_path(&self, token: Uuid) -> PathBuf {
        self.dir.join(format!("{}.{}", token.simple(), STAGED_EXTENSION))
    }

    /// Writes `bytes` to a new file. The returned guard deletes it when
    /// dropped, so a failed or cancelled request cannot leave it behind.
    ///
    /// The write runs on the blocking pool and the guard is created there, so
    /// if the caller goes away mid-write the guard is dropped together with
    /// the unclaimed result.
    pub async fn stage(&self, bytes: Vec<u8>) -> Result<StagedFile, StagingError> {
        let token = Uuid::new_v4();
        let path = self.staged_path(token);

        web::block(move || write_staged(path, token, &bytes))
            .await
            .map_err(|e| StagingError::Write(std::io::Error::other(e.to_string())))?
    }

    /// Deletes staged files left over from a previous run that did not shut
    /// down cleanly. Returns how many were removed.
    pub fn purge_stale(&self) -> Result<usize, StagingError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| StagingError::Directory {
            path: self.dir.display().to_string(),
            source,
        })?;

        let mut purged = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(STAGED_EXTENSION) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => purged += 1,
                Err(e) => log::error!("Failed to purge stale upload {}: {}", path.display(), e),
            }
        }
        Ok(purged)
    }
}

fn write_staged(path: PathBuf, token: Uuid, bytes: &[u8]) -> Result<StagedFile, StagingError> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    // The guard only exists once this call owns the file.
    let mut file = options.open(&path).map_err(StagingError::Write)?;
    let staged = StagedFile {
        path,
        token,
        removed: false,
    };
    file.write_all(bytes).map_err(StagingError::Write)?;

    Ok(staged)
}

/// An upload copied to disk for the lifetime of one request.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    token: Uuid,
    removed: bool,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn token(&self) -> Uuid {
        self.token
    }

    /// Deletes the file without blocking the executor. A file that is
    /// already gone counts as removed.
    pub async fn remove(mut self) -> Result<(), StagingError> {
        self.removed = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StagingError::Remove {
                path: self.path.display().to_string(),
                source,
            }),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed staged upload {} on drop", self.token),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => log::error!(
                "Failed to remove staged upload {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
