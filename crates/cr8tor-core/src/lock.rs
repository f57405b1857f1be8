//! Exclusive lock around one lifecycle run against a project.
//!
//! The lock is a `project.toml.lock` file created with `create_new`, so two
//! processes cannot both hold it. It records the holder's pid and start time
//! and is removed when the guard drops.

use crate::error::{Cr8torError, Result};
use crate::paths;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

#[derive(Debug)]
pub struct ProjectLock {
    path: PathBuf,
}

impl ProjectLock {
    /// Take the lock for `document`. A lock file older than `stale_after` is
    /// assumed abandoned and taken over.
    pub fn acquire(document: &Path, stale_after: Duration) -> Result<Self> {
        let path = paths::lock_path(document);
        if let Some(parent) = path.parent() {
            crate::io::ensure_dir(parent)?;
        }

        match Self::create(&path) {
            Ok(lock) => Ok(lock),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if !is_stale(&path, stale_after) {
                    return Err(Cr8torError::ProjectLocked(path));
                }
                tracing::warn!(path = %path.display(), "taking over stale project lock");
                std::fs::remove_file(&path)?;
                Self::create(&path).map_err(|e| match e.kind() {
                    std::io::ErrorKind::AlreadyExists => Cr8torError::ProjectLocked(path.clone()),
                    _ => Cr8torError::Io(e),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn create(path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        writeln!(
            file,
            "pid={}\nacquired={}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        )?;
        tracing::debug!(path = %path.display(), "acquired project lock");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release project lock");
        }
    }
}

fn is_stale(path: &Path, stale_after: Duration) -> bool {
    let modified = match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(_) => return false,
    };
    SystemTime::now()
        .duration_since(modified)
        .map(|age| age > stale_after)
        .unwrap_or(false)
}
