//! core::paths
//!
//! Centralized path routing for gitgate storage locations.
//!
//! # Storage Layout
//!
//! Clone-local data lives under `<common_dir>/gitgate/`:
//! - `config.toml` - repository configuration
//!
//! The lock serializing check+publish lives beside the *shared* graph,
//! not in the clone: it must be visible to every clone racing on the
//! same graph.
//!
//! All repo-scoped storage uses `common_dir` so linked worktrees share
//! one configuration. No code outside this module computes
//! `*.join("gitgate")` paths.

use std::path::{Path, PathBuf};

use crate::git::RepoInfo;

/// Centralized path routing for gitgate storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatePaths {
    /// Path to the shared git directory (refs, objects, config).
    pub common_dir: PathBuf,
}

impl GatePaths {
    /// Create paths from a repository's info.
    pub fn from_repo_info(info: &RepoInfo) -> Self {
        Self {
            common_dir: info.common_dir.clone(),
        }
    }

    /// The gitgate storage directory, `<common_dir>/gitgate`.
    pub fn gate_dir(&self) -> PathBuf {
        self.common_dir.join("gitgate")
    }

    /// The repository configuration file.
    ///
    /// # Example
    ///
    /// ```
    /// use gitgate::core::paths::GatePaths;
    /// use std::path::PathBuf;
    ///
    /// let paths = GatePaths { common_dir: PathBuf::from("/repo/.git") };
    /// assert_eq!(
    ///     paths.config_path(),
    ///     PathBuf::from("/repo/.git/gitgate/config.toml")
    /// );
    /// ```
    pub fn config_path(&self) -> PathBuf {
        self.gate_dir().join("config.toml")
    }
}

/// The lock file serializing check+publish against one shared graph.
///
/// Placed next to the graph repository (`<graph>.gitgate.lock` for a
/// path like `/srv/graph.git`) so every clone pointed at the same graph
/// contends on the same file.
pub fn graph_lock_path(graph_path: &Path) -> PathBuf {
    let mut name = graph_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "graph".to_string());
    name.push_str(".gitgate.lock");

    match graph_path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => PathBuf::from(name),
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}
