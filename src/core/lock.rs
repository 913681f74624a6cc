//! core::lock
//!
//! Exclusive lock around the shared graph.
//!
//! # Architecture
//!
//! Admission is check-then-act: synchronize, query, commit, republish.
//! Between a passed check and the new commit's publication, a second
//! clone checking the same stale history could also pass. When the
//! shared graph is reached through the filesystem, this lock closes
//! that window: the whole check+publish sequence runs under an OS-level
//! exclusive file lock that every clone of the same graph contends on.
//!
//! # Invariants
//!
//! - Held for the entire pre-commit check, publish included
//! - Released automatically on drop (RAII)
//! - Acquisition blocks until the holder releases; human-paced commits
//!   hold it for well under a second

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::graph_lock_path;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Failed to create the lock file.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// I/O error during lock operations.
    #[error("lock i/o error: {0}")]
    IoError(#[from] std::io::Error),
}

/// An exclusive lock on one shared graph.
///
/// Released when dropped, even if the holding operation panics.
#[derive(Debug)]
pub struct GraphLock {
    /// Path to the lock file.
    path: PathBuf,
    /// Open handle with the lock held; Some while we hold it.
    file: Option<File>,
}

impl GraphLock {
    /// Acquire the lock for the shared graph at `graph_path`.
    ///
    /// Blocks until available. The lock file lives beside the graph so
    /// all clones contend on the same path.
    ///
    /// # Errors
    ///
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be taken
    pub fn acquire(graph_path: &Path) -> Result<Self, LockError> {
        let path = graph_lock_path(graph_path);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        file.lock_exclusive()
            .map_err(|e| LockError::AcquireFailed(e.to_string()))?;

        Ok(Self {
            path,
            file: Some(file),
        })
    }

    /// The lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for GraphLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            // Best effort; the OS releases on close regardless.
            let _ = fs2::FileExt::unlock(&file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn acquire_creates_the_lock_file() {
        let dir = TempDir::new().unwrap();
        let graph = dir.path().join("graph.git");
        std::fs::create_dir(&graph).unwrap();

        let lock = GraphLock::acquire(&graph).unwrap();
        assert!(lock.path().exists());
    }

    #[test]
    fn reacquire_after_drop_succeeds() {
        let dir = TempDir::new().unwrap();
        let graph = dir.path().join("graph.git");
        std::fs::create_dir(&graph).unwrap();

        drop(GraphLock::acquire(&graph).unwrap());
        let second = GraphLock::acquire(&graph);
        assert!(second.is_ok());
    }
}
