//! core::store
//!
//! Divergence marks and the dependency document, stored in the shared
//! graph's native ref/object storage. No additional file format exists.
//!
//! # Architecture
//!
//! - Divergence marks are refs: `refs/gitgate/divergent/<oid>` and
//!   `refs/gitgate/revert/<oid>`, each pointing at the tagged commit.
//!   A mark's existence is the whole fact, so writes are idempotent and
//!   need no CAS.
//! - The dependency graph is one JSON blob pointed to by
//!   `refs/gitgate/dependencies`. Updates are read-modify-write under
//!   CAS so concurrent editors cannot silently drop each other's edges.
//!
//! # Example
//!
//! ```ignore
//! use gitgate::core::store::{DependencyStore, MarkStore};
//! use gitgate::git::Git;
//!
//! let git = Git::open_shared(Path::new("/srv/shared-graph.git"))?;
//! let marks = MarkStore::new(&git);
//! marks.mark_divergent(&fork_point)?;
//!
//! let store = DependencyStore::new(&git);
//! let mut deps = store.load()?;
//! deps.will_merge_into(art, main);
//! store.save(&deps)?;
//! ```

use thiserror::Error;

use crate::core::graph::DependencyGraph;
use crate::core::types::Oid;
use crate::git::{Git, GitError};

/// Ref prefix for accepted fork points.
pub const DIVERGENT_REF_PREFIX: &str = "refs/gitgate/divergent/";

/// Ref prefix for history boundaries.
pub const REVERT_REF_PREFIX: &str = "refs/gitgate/revert/";

/// Ref holding the dependency document blob.
pub const DEPENDENCIES_REF: &str = "refs/gitgate/dependencies";

/// Errors from shared-graph storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The dependency document could not be parsed.
    #[error("failed to parse dependency document: {0}")]
    ParseError(String),

    /// The dependency document could not be serialized.
    #[error("failed to serialize dependency document: {0}")]
    SerializeError(String),

    /// Concurrent update: the document changed since we read it.
    #[error("dependency document changed concurrently; retry the operation")]
    Conflict,

    /// Git operation failed.
    #[error("git error: {0}")]
    Git(#[from] GitError),
}

/// Divergence marks over the shared graph.
///
/// Tags individual commits as accepted fork points ("divergent") or
/// history boundaries ("revert"). The tagged commit must already exist
/// in the shared graph; the ref simply points at it, which also protects
/// it from garbage collection.
pub struct MarkStore<'a> {
    git: &'a Git,
}

impl<'a> MarkStore<'a> {
    /// Create a mark store over the shared graph repository.
    pub fn new(git: &'a Git) -> Self {
        Self { git }
    }

    /// Tag a commit as an accepted fork point. Idempotent.
    pub fn mark_divergent(&self, commit: &Oid) -> Result<(), StoreError> {
        let refname = format!("{}{}", DIVERGENT_REF_PREFIX, commit);
        self.git
            .set_ref(&refname, commit, "gitgate: mark divergent")?;
        Ok(())
    }

    /// Tag a commit as a history boundary. Idempotent.
    pub fn mark_revert(&self, commit: &Oid) -> Result<(), StoreError> {
        let refname = format!("{}{}", REVERT_REF_PREFIX, commit);
        self.git.set_ref(&refname, commit, "gitgate: mark revert")?;
        Ok(())
    }

    /// Is this commit an accepted fork point?
    pub fn is_divergent(&self, commit: &Oid) -> bool {
        self.git
            .ref_exists(&format!("{}{}", DIVERGENT_REF_PREFIX, commit))
    }

    /// Is this commit a history boundary?
    pub fn is_revert(&self, commit: &Oid) -> bool {
        self.git
            .ref_exists(&format!("{}{}", REVERT_REF_PREFIX, commit))
    }

    /// Every commit tagged as divergent, sorted by id.
    pub fn list_divergent(&self) -> Result<Vec<Oid>, StoreError> {
        let entries = self.git.list_refs_by_prefix(DIVERGENT_REF_PREFIX)?;
        Ok(entries.into_iter().map(|e| e.oid).collect())
    }
}

/// The dependency document, one JSON blob under [`DEPENDENCIES_REF`].
pub struct DependencyStore<'a> {
    git: &'a Git,
}

impl<'a> DependencyStore<'a> {
    /// Create a dependency store over the shared graph repository.
    pub fn new(git: &'a Git) -> Self {
        Self { git }
    }

    /// Load the dependency graph; absent ref means no edges yet.
    pub fn load(&self) -> Result<DependencyGraph, StoreError> {
        match self.git.try_resolve_ref_to_object(DEPENDENCIES_REF)? {
            Some(blob_oid) => {
                let json = self.git.read_blob_as_string(&blob_oid)?;
                serde_json::from_str(&json).map_err(|e| StoreError::ParseError(e.to_string()))
            }
            None => Ok(DependencyGraph::new()),
        }
    }

    /// Persist the dependency graph.
    ///
    /// CAS against the blob the current document was loaded from; a
    /// concurrent writer surfaces as [`StoreError::Conflict`] instead of
    /// being silently overwritten.
    pub fn save(&self, deps: &DependencyGraph) -> Result<(), StoreError> {
        let expected_old = self.git.try_resolve_ref_to_object(DEPENDENCIES_REF)?;

        let json = serde_json::to_string_pretty(deps)
            .map_err(|e| StoreError::SerializeError(e.to_string()))?;
        let blob_oid = self.git.write_blob(json.as_bytes())?;

        match self.git.update_ref_cas(
            DEPENDENCIES_REF,
            &blob_oid,
            expected_old.as_ref(),
            "gitgate: update dependencies",
        ) {
            Ok(()) => Ok(()),
            Err(GitError::CasFailed { .. }) => Err(StoreError::Conflict),
            Err(e) => Err(e.into()),
        }
    }

    /// Read-modify-write convenience wrapper.
    pub fn update<F>(&self, mutate: F) -> Result<DependencyGraph, StoreError>
    where
        F: FnOnce(&mut DependencyGraph),
    {
        let mut deps = self.load()?;
        mutate(&mut deps);
        self.save(&deps)?;
        Ok(deps)
    }
}
