//! hooks
//!
//! The pre-commit and post-commit entry points.
//!
//! # Architecture
//!
//! `pre-commit` is the gate: synchronize the clone's branches into the
//! shared graph, run the admission check over the staged paths, and veto
//! the commit on any conflict. `post-commit` only republishes, so the
//! freshly created commit becomes visible to every other clone.
//!
//! The whole pre-commit sequence runs under the graph lock, publish
//! included. Without it, two clones could both check against the same
//! stale history and both pass.
//!
//! # Invariants
//!
//! - A non-`Ok` return from `pre_commit` means the commit must not happen
//! - `post_commit` failures leave the commit in place; the next hook run
//!   republishes everything anyway

use std::path::Path;

use log::{debug, info};
use thiserror::Error;

use crate::core::config::{Config, ConfigError};
use crate::core::graph::DependencyGraph;
use crate::core::lock::{GraphLock, LockError};
use crate::core::naming::global_branch;
use crate::core::paths::GatePaths;
use crate::core::shared::SharedGraph;
use crate::core::store::StoreError;
use crate::core::types::{GlobalBranchName, Oid};
use crate::engine::{self, AdmitError, WalkLimits};
use crate::git::{Git, GitError};
use crate::identity::{self, IdentityError};
use crate::sync::{self, SyncError};

/// Errors from hook execution.
///
/// The first four variants are the admission taxonomy proper; the rest
/// are setup failures that also veto the commit, since an unchecked
/// commit is exactly what the gate exists to prevent.
#[derive(Debug, Error)]
pub enum GateError {
    /// The committing branch has no published ancestry and a conflicting
    /// commit exists elsewhere.
    #[error(
        "commit [{commit}] on branch [{branch}] would conflict with this commit, \
         and the current branch has no published history to descend from it; \
         incorporate that commit first"
    )]
    BranchInvalid {
        /// The conflicting commit
        commit: Oid,
        /// The branch carrying it
        branch: GlobalBranchName,
    },

    /// Another branch's most recent touch of a proposed file is not in
    /// the committing branch's ancestry.
    #[error(
        "commit [{commit}] on branch [{branch}] would conflict with this commit; \
         the current branch must incorporate that commit first"
    )]
    ConflictingCommit {
        /// The conflicting commit
        commit: Oid,
        /// The branch carrying it
        branch: GlobalBranchName,
    },

    /// Publication into the shared graph failed; admission cannot run
    /// against stale state.
    #[error("synchronization with the shared graph failed: {0}")]
    SyncFailure(#[from] SyncError),

    /// No usable identity for this clone.
    #[error(transparent)]
    UnconfiguredIdentity(IdentityError),

    /// The admission walk itself failed (missing commits, budget).
    #[error(transparent)]
    Admission(AdmitError),

    /// Configuration is absent or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Local git access failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// The graph lock could not be taken.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Shared-graph storage failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// HEAD names no branch at all (detached, no symbolic target).
    #[error("HEAD is not on a branch; the gate only checks branch commits")]
    NotOnBranch,
}

impl From<IdentityError> for GateError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::Git(g) => GateError::Git(g),
            other => GateError::UnconfiguredIdentity(other),
        }
    }
}

impl From<AdmitError> for GateError {
    fn from(e: AdmitError) -> Self {
        match e {
            AdmitError::BranchInvalid { commit, branch } => {
                GateError::BranchInvalid { commit, branch }
            }
            AdmitError::ConflictingCommit { commit, branch } => {
                GateError::ConflictingCommit { commit, branch }
            }
            other => GateError::Admission(other),
        }
    }
}

/// The pre-commit gate: publish, then admit or veto the staged commit.
///
/// `repo_path` is any directory inside the working clone.
pub fn pre_commit(repo_path: &Path) -> Result<(), GateError> {
    let git = Git::open(repo_path)?;
    let repo_id = identity::get_or_create(&git)?;

    let paths = GatePaths::from_repo_info(&git.info());
    let config = Config::load(&paths)?;
    let graph_path = config.graph_path()?;
    let policy = config.policy()?;

    let branch = git.head_branch_name()?.ok_or(GateError::NotOnBranch)?;
    let candidate = global_branch(&repo_id, &branch);

    // Everything from publish to verdict happens under the graph lock;
    // see the module docs for why.
    let lock = GraphLock::acquire(graph_path)?;
    debug!("graph lock held at {}", lock.path().display());

    sync::publish(&git, &repo_id, config.remote())?;

    let shared = SharedGraph::open(graph_path)?;
    let deps: DependencyGraph = shared.load_dependencies()?;

    // An unborn HEAD has no head commit; admission treats that as a
    // branch with no published history.
    let candidate_head = git.try_head_oid()?;

    let files = git.staged_paths()?;
    debug!(
        "gating commit on {} touching {} path(s)",
        candidate,
        files.len()
    );

    engine::admit(
        &shared,
        &deps,
        policy,
        &candidate,
        candidate_head.as_ref(),
        Some(&files),
        &WalkLimits::default(),
    )?;

    info!("admission passed for {}", candidate);
    Ok(())
}

/// The post-commit hook: republish so the new commit is visible to every
/// other clone immediately.
pub fn post_commit(repo_path: &Path) -> Result<(), GateError> {
    let git = Git::open(repo_path)?;
    let repo_id = identity::get_or_create(&git)?;

    let paths = GatePaths::from_repo_info(&git.info());
    let config = Config::load(&paths)?;

    let count = sync::publish(&git, &repo_id, config.remote())?;
    debug!("post-commit republished {} branch(es)", count);
    Ok(())
}
