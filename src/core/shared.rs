//! core::shared
//!
//! The shared graph repository opened as an admission data source.
//!
//! # Architecture
//!
//! [`SharedGraph`] composes the Git doorway with the mark store and
//! implements [`GraphQuery`] for the admission engine. Commit nodes are
//! loaded lazily, one per visited commit, so the engine's early-exit
//! walks never pay for the whole history.
//!
//! Branch heads come from `refs/heads/*` of the shared repository; every
//! name there is a namespaced global name by construction, but refs
//! written by other tools are skipped rather than trusted.

use std::path::Path;

use log::warn;

use crate::core::graph::{CommitNode, GraphError, GraphQuery};
use crate::core::store::{DependencyStore, MarkStore, StoreError};
use crate::core::types::{GlobalBranchName, Oid};
use crate::git::{Git, GitError};

/// The shared graph repository.
pub struct SharedGraph {
    git: Git,
}

impl SharedGraph {
    /// Open the shared graph at a filesystem path (usually bare).
    pub fn open(path: &Path) -> Result<Self, GitError> {
        Ok(Self {
            git: Git::open_shared(path)?,
        })
    }

    /// The underlying Git interface (for mark and dependency stores).
    pub fn git(&self) -> &Git {
        &self.git
    }

    /// A mark store over this graph.
    pub fn marks(&self) -> MarkStore<'_> {
        MarkStore::new(&self.git)
    }

    /// A dependency store over this graph.
    pub fn dependencies(&self) -> DependencyStore<'_> {
        DependencyStore::new(&self.git)
    }

    /// Load the dependency graph document.
    pub fn load_dependencies(&self) -> Result<crate::core::graph::DependencyGraph, StoreError> {
        self.dependencies().load()
    }
}

impl GraphQuery for SharedGraph {
    fn branches(&self) -> Result<Vec<(GlobalBranchName, Oid)>, GraphError> {
        let entries = self
            .git
            .list_refs_by_prefix("refs/heads/")
            .map_err(backend)?;

        let mut result = Vec::with_capacity(entries.len());
        for entry in entries {
            match GlobalBranchName::parse(&entry.name) {
                Ok(name) => result.push((name, entry.oid)),
                Err(_) => {
                    // Not a namespaced branch; some other tool wrote it.
                    warn!("ignoring non-namespaced ref in shared graph: {}", entry.name);
                }
            }
        }
        Ok(result)
    }

    fn node(&self, id: &Oid) -> Result<CommitNode, GraphError> {
        let parents = match self.git.commit_parents(id) {
            Ok(parents) => parents,
            Err(GitError::ObjectNotFound { oid }) => {
                return Err(GraphError::MissingCommit { oid });
            }
            Err(e) => return Err(backend(e)),
        };
        let files = self.git.changed_files(id).map_err(backend)?;

        let marks = self.marks();
        Ok(CommitNode {
            parents,
            files,
            divergent: marks.is_divergent(id),
            is_revert: marks.is_revert(id),
        })
    }
}

fn backend(e: GitError) -> GraphError {
    GraphError::Backend {
        message: e.to_string(),
    }
}
