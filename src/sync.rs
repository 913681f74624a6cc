//! sync
//!
//! Branch publication into the shared graph.
//!
//! # Architecture
//!
//! Publication is a single forced push of every local branch under the
//! clone's namespace, `refs/heads/{branch}` to
//! `refs/heads/{repo_id}/{branch}`. The push is forced because each
//! clone is the sole writer of its own namespace; mirroring amended or
//! rewound local history is the point, not a hazard.
//!
//! Publication is idempotent: pushing heads the graph already holds is a
//! no-op on the remote side.

use log::{debug, info};
use thiserror::Error;

use crate::core::naming::push_refspec;
use crate::core::types::RepoId;
use crate::git::{Git, GitError};

/// Errors from publication.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The configured remote does not exist in this clone.
    #[error("remote '{remote}' is not configured; run `gg init --graph <path>`")]
    RemoteNotConfigured {
        /// The remote name that was looked up
        remote: String,
    },

    /// The push itself failed (unreachable graph, permissions, ...).
    #[error("failed to publish branches to '{remote}': {message}")]
    PushFailed {
        /// The remote pushed to
        remote: String,
        /// The underlying transport or server message
        message: String,
    },

    /// Any other git failure while enumerating branches.
    #[error("git error: {0}")]
    Git(GitError),
}

impl From<GitError> for SyncError {
    fn from(e: GitError) -> Self {
        match e {
            GitError::RemoteNotFound { name } => SyncError::RemoteNotConfigured { remote: name },
            GitError::PushFailed { remote, message } => SyncError::PushFailed { remote, message },
            other => SyncError::Git(other),
        }
    }
}

/// Publish every local branch to the shared graph under this clone's
/// namespace. Returns the number of branches published.
///
/// A clone with no branches yet (unborn HEAD) publishes nothing and
/// succeeds.
pub fn publish(git: &Git, repo_id: &RepoId, remote: &str) -> Result<usize, SyncError> {
    let branches = git.local_branches()?;
    if branches.is_empty() {
        debug!("no local branches to publish");
        return Ok(0);
    }

    let refspecs: Vec<String> = branches
        .iter()
        .map(|b| push_refspec(repo_id, &b.name))
        .collect();

    for spec in &refspecs {
        debug!("publishing {}", spec);
    }

    git.push(remote, &refspecs)?;
    info!(
        "published {} branch(es) to '{}' under [{}]",
        refspecs.len(),
        remote,
        repo_id
    );

    Ok(refspecs.len())
}
