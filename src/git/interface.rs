//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module provides the **single doorway** to all Git operations in
//! gitgate. Every interaction with a repository, local clone or shared
//! graph, flows through this interface, which provides structured results
//! and normalizes errors into typed failure categories.
//!
//! # Architecture
//!
//! The `Git` struct is the only way to interact with a Git repository.
//! No other module should import `git2` directly. This ensures:
//!
//! - Consistent error handling across all Git operations
//! - Strong type guarantees at the boundary
//! - CAS (compare-and-swap) semantics for ref mutations
//!
//! Two open modes exist: [`Git::open`] discovers a working clone (bare
//! repositories are rejected, hooks run in worktrees), while
//! [`Git::open_shared`] opens the shared graph repository, which is
//! usually bare.
//!
//! # Example
//!
//! ```ignore
//! use gitgate::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! let oid = git.resolve_ref("refs/heads/main")?;
//! println!("main is at {}", oid.short(7));
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::graph::FileSet;
use crate::core::types::{BranchName, Oid, TypeError};

/// Errors from Git operations.
///
/// The categorization lets higher layers react distinctly: a missing ref
/// is routine during discovery, while a failed push must abort the whole
/// admission attempt.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory) where one is required.
    #[error("bare repository not supported here")]
    BareRepo,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Requested remote does not exist.
    #[error("remote not found: {name}")]
    RemoteNotFound {
        /// The remote that was not found
        name: String,
    },

    /// Pushing refspecs to a remote failed.
    #[error("push to '{remote}' failed: {message}")]
    PushFailed {
        /// The remote being pushed to
        remote: String,
        /// The underlying transport message
        message: String,
    },

    /// Compare-and-swap precondition failed.
    ///
    /// Attempting to update a ref whose current value doesn't match the
    /// expected value. This prevents applying changes to a repository
    /// that moved underneath us.
    #[error("CAS failed for {refname}: expected {expected}, found {actual}")]
    CasFailed {
        /// The ref being updated
        refname: String,
        /// The expected old value
        expected: String,
        /// The actual current value
        actual: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref name format.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// Blob content is not valid UTF-8.
    #[error("blob is not valid UTF-8: {oid}")]
    InvalidUtf8 {
        /// The OID of the blob
        oid: String,
    },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if context.starts_with("refs/") || context.contains("ref") {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::RefNotFound {
                refname: err.message().to_string(),
            },
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: err.message().to_string(),
            },
            _ => GitError::Internal {
                message: err.message().to_string(),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidBranchName(msg) | TypeError::InvalidGlobalBranchName(msg) => {
                GitError::InvalidRefName { message: msg }
            }
            TypeError::InvalidRepoId(msg) => GitError::InvalidRefName { message: msg },
        }
    }
}

/// Information about a Git repository.
#[derive(Debug, Clone)]
pub struct RepoInfo {
    /// Path to the per-worktree .git directory
    pub git_dir: PathBuf,
    /// Path to the shared git directory (refs, objects, config)
    pub common_dir: PathBuf,
}

/// A local branch with its head, as listed from a working clone.
#[derive(Debug, Clone)]
pub struct LocalBranch {
    /// The branch name
    pub name: BranchName,
    /// The branch head commit
    pub head: Oid,
}

/// A ref entry returned from prefix enumeration.
#[derive(Debug, Clone)]
pub struct RefEntry {
    /// Ref name with the queried prefix stripped
    pub name: String,
    /// The ref's target OID
    pub oid: Oid,
}

/// The Git interface.
///
/// Wraps a git2 repository and exposes only typed, validated operations.
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Open a working clone at the given path.
    ///
    /// Uses `git2::Repository::discover` to find the repository root,
    /// so `path` can be any directory within the repository.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        Ok(Self { repo })
    }

    /// Open the shared graph repository at an exact path.
    ///
    /// The shared graph is usually a bare repository, so bareness is
    /// accepted here. No discovery is performed; the path must be the
    /// repository itself.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if the path is not a repository
    pub fn open_shared(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::open(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        Ok(Self { repo })
    }

    /// Get repository information (git_dir and common_dir paths).
    pub fn info(&self) -> RepoInfo {
        RepoInfo {
            git_dir: self.repo.path().to_path_buf(),
            common_dir: self.repo.commondir().to_path_buf(),
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Read a string value from the repository configuration.
    ///
    /// Returns `Ok(None)` if the key is not set at any scope.
    pub fn config_string(&self, key: &str) -> Result<Option<String>, GitError> {
        let config = self.repo.config().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        match config.get_string(key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::Internal {
                message: format!("{}: {}", key, e.message()),
            }),
        }
    }

    /// Write a string value into the repository-local configuration.
    pub fn set_config_string(&self, key: &str, value: &str) -> Result<(), GitError> {
        let mut config = self.repo.config().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        config.set_str(key, value).map_err(|e| GitError::Internal {
            message: format!("{}: {}", key, e.message()),
        })
    }

    // =========================================================================
    // Ref Resolution
    // =========================================================================

    /// Resolve a ref to its target commit OID.
    ///
    /// This peels through symbolic refs and tags to get the commit OID.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if the ref doesn't exist
    pub fn resolve_ref(&self, refname: &str) -> Result<Oid, GitError> {
        let reference = self
            .repo
            .find_reference(refname)
            .map_err(|e| GitError::from_git2(e, refname))?;

        let oid = reference
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, refname))?
            .id();

        Oid::new(oid.to_string()).map_err(|e| e.into())
    }

    /// Resolve a ref, returning None if it doesn't exist.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        match self.resolve_ref(refname) {
            Ok(oid) => Ok(Some(oid)),
            Err(GitError::RefNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get HEAD commit OID. Fails on an unborn HEAD; use
    /// [`Git::try_head_oid`] when the repository may have no commits yet.
    pub fn head_oid(&self) -> Result<Oid, GitError> {
        let head = self
            .repo
            .head()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;

        let oid = head
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?
            .id();

        Oid::new(oid.to_string()).map_err(|e| e.into())
    }

    /// Get HEAD commit OID, or None when HEAD is unborn (a fresh
    /// repository before its first commit).
    pub fn try_head_oid(&self) -> Result<Option<Oid>, GitError> {
        let head = match self.repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(GitError::from_git2(e, "HEAD")),
        };

        let oid = head
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?
            .id();

        Ok(Some(Oid::new(oid.to_string())?))
    }

    /// Resolve a revision expression (hash, short hash, refname, `HEAD~2`)
    /// to a commit OID.
    pub fn rev_parse(&self, spec: &str) -> Result<Oid, GitError> {
        let object = self
            .repo
            .revparse_single(spec)
            .map_err(|e| GitError::from_git2(e, spec))?;

        let commit = object
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, spec))?;

        Oid::new(commit.id().to_string()).map_err(|e| e.into())
    }

    /// Check if a ref exists.
    pub fn ref_exists(&self, refname: &str) -> bool {
        self.repo.find_reference(refname).is_ok()
    }

    /// Get the current branch name, if on a branch.
    ///
    /// Returns `None` if HEAD is detached or unborn.
    pub fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if head.is_branch() {
            if let Some(name) = head.shorthand() {
                return Ok(Some(BranchName::new(name)?));
            }
        }

        Ok(None) // Detached HEAD
    }

    /// The name of the branch HEAD points at, even if unborn.
    ///
    /// An unborn branch has no commits yet but HEAD still names it; this
    /// is the case for the first ever commit in a fresh clone.
    pub fn head_branch_name(&self) -> Result<Option<BranchName>, GitError> {
        if let Some(branch) = self.current_branch()? {
            return Ok(Some(branch));
        }

        // Unborn HEAD: read the symbolic target directly.
        match self.repo.find_reference("HEAD") {
            Ok(head) => match head.symbolic_target() {
                Some(target) => {
                    let name = target.strip_prefix("refs/heads/").unwrap_or(target);
                    Ok(Some(BranchName::new(name)?))
                }
                None => Ok(None),
            },
            Err(e) => Err(GitError::from_git2(e, "HEAD")),
        }
    }

    // =========================================================================
    // Branch and Ref Enumeration
    // =========================================================================

    /// List all local (non-remote-tracking) branches with their heads.
    ///
    /// Results are sorted by branch name for deterministic publish order.
    pub fn local_branches(&self) -> Result<Vec<LocalBranch>, GitError> {
        let branches = self
            .repo
            .branches(Some(git2::BranchType::Local))
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

        let mut result = Vec::new();
        for item in branches {
            let (branch, _) = item.map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

            let Some(name) = branch.name().ok().flatten() else {
                continue; // Non-UTF-8 branch name, skip
            };
            let Some(target) = branch.get().target() else {
                continue; // Symbolic or unborn, nothing to publish
            };

            result.push(LocalBranch {
                name: BranchName::new(name)?,
                head: Oid::new(target.to_string())?,
            });
        }

        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    /// List all refs matching a prefix, sorted by name.
    ///
    /// Entry names have the prefix stripped.
    ///
    /// # Example
    ///
    /// ```ignore
    /// // Every branch published to the shared graph
    /// let heads = git.list_refs_by_prefix("refs/heads/")?;
    /// for entry in heads {
    ///     println!("{} -> {}", entry.name, entry.oid.short(7));
    /// }
    /// ```
    pub fn list_refs_by_prefix(&self, prefix: &str) -> Result<Vec<RefEntry>, GitError> {
        let pattern = format!("{}*", prefix);
        let refs = self
            .repo
            .references_glob(&pattern)
            .map_err(|e| GitError::from_git2(e, prefix))?;

        let mut result = Vec::new();
        for item in refs {
            let reference = item.map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

            let Some(name) = reference.name() else {
                continue;
            };
            let Some(stripped) = name.strip_prefix(prefix).map(str::to_string) else {
                continue;
            };
            let resolved = reference.resolve().unwrap_or(reference);
            let Some(target) = resolved.target() else {
                continue;
            };

            result.push(RefEntry {
                name: stripped,
                oid: Oid::new(target.to_string())?,
            });
        }

        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    // =========================================================================
    // Index
    // =========================================================================

    /// List the paths staged for the next commit.
    ///
    /// Computed as the diff from the HEAD tree to the index. For an unborn
    /// HEAD every index entry is staged.
    pub fn staged_paths(&self) -> Result<Vec<String>, GitError> {
        let head_tree = match self.repo.head() {
            Ok(head) => Some(head.peel_to_tree().map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => None,
            Err(e) => return Err(e.into()),
        };

        let mut index = self.repo.index().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        let diff = self
            .repo
            .diff_tree_to_index(head_tree.as_ref(), Some(&mut index), None)
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

        Ok(Self::diff_paths(&diff))
    }

    // =========================================================================
    // Commit Inspection
    // =========================================================================

    /// Get the ordered parent OIDs of a commit (first = primary).
    pub fn commit_parents(&self, oid: &Oid) -> Result<Vec<Oid>, GitError> {
        let commit = self.find_commit(oid)?;

        let mut parents = Vec::with_capacity(commit.parent_count());
        for parent_id in commit.parent_ids() {
            parents.push(Oid::new(parent_id.to_string())?);
        }

        Ok(parents)
    }

    /// Get the set of files a commit changed.
    ///
    /// Computed as the diff against the primary parent; a root commit
    /// diffs against the empty tree, so it touches every file it carries.
    pub fn changed_files(&self, oid: &Oid) -> Result<FileSet, GitError> {
        let commit = self.find_commit(oid)?;

        let tree = commit.tree().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree().map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?),
            Err(_) => None, // Root commit
        };

        let diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

        let paths: BTreeSet<String> = Self::diff_paths(&diff).into_iter().collect();
        Ok(FileSet::Paths(paths))
    }

    /// Collect every path named on either side of a diff.
    fn diff_paths(diff: &git2::Diff<'_>) -> Vec<String> {
        let mut paths = Vec::new();
        for delta in diff.deltas() {
            for file in [delta.old_file(), delta.new_file()] {
                if let Some(path) = file.path().and_then(|p| p.to_str()) {
                    if !paths.iter().any(|existing| existing == path) {
                        paths.push(path.to_string());
                    }
                }
            }
        }
        paths
    }

    fn find_commit(&self, oid: &Oid) -> Result<git2::Commit<'_>, GitError> {
        let git_oid = git2::Oid::from_str(oid.as_str())
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;

        self.repo
            .find_commit(git_oid)
            .map_err(|_| GitError::ObjectNotFound {
                oid: oid.to_string(),
            })
    }

    // =========================================================================
    // CAS Ref Operations and Blobs
    // =========================================================================

    /// Update a ref with compare-and-swap semantics.
    ///
    /// The update only succeeds if the ref's current value matches
    /// `expected_old`. If `expected_old` is `None`, the ref must not exist
    /// (create case).
    ///
    /// # Errors
    ///
    /// - [`GitError::CasFailed`] if the current value doesn't match expected
    pub fn update_ref_cas(
        &self,
        refname: &str,
        new_oid: &Oid,
        expected_old: Option<&Oid>,
        message: &str,
    ) -> Result<(), GitError> {
        let current = self.try_resolve_ref_raw(refname)?;

        match (expected_old, current.as_ref()) {
            (Some(expected), Some(actual)) if expected.as_str() != actual => {
                return Err(GitError::CasFailed {
                    refname: refname.to_string(),
                    expected: expected.to_string(),
                    actual: actual.clone(),
                });
            }
            (Some(expected), None) => {
                return Err(GitError::CasFailed {
                    refname: refname.to_string(),
                    expected: expected.to_string(),
                    actual: "<none>".to_string(),
                });
            }
            (None, Some(actual)) => {
                return Err(GitError::CasFailed {
                    refname: refname.to_string(),
                    expected: "<none>".to_string(),
                    actual: actual.clone(),
                });
            }
            _ => {} // Precondition satisfied
        }

        let oid = git2::Oid::from_str(new_oid.as_str())
            .map_err(|e| GitError::from_git2(e, new_oid.as_str()))?;

        self.repo
            .reference(refname, oid, true, message)
            .map_err(|e| GitError::from_git2(e, refname))?;

        Ok(())
    }

    /// Create or overwrite a ref unconditionally.
    ///
    /// Used for idempotent marks where the target is derived from the ref
    /// name itself and re-marking is a no-op.
    pub fn set_ref(&self, refname: &str, target: &Oid, message: &str) -> Result<(), GitError> {
        let oid = git2::Oid::from_str(target.as_str())
            .map_err(|e| GitError::from_git2(e, target.as_str()))?;

        self.repo
            .reference(refname, oid, true, message)
            .map_err(|e| GitError::from_git2(e, refname))?;

        Ok(())
    }

    /// Resolve a ref to its direct target without peeling to a commit.
    ///
    /// Use this for refs that point at blobs (the dependency document).
    /// Returns `Ok(None)` if the ref doesn't exist.
    pub fn try_resolve_ref_to_object(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        match self.try_resolve_ref_raw(refname)? {
            Some(raw) => Ok(Some(Oid::new(raw)?)),
            None => Ok(None),
        }
    }

    /// Try to resolve a ref to its raw OID string (without validation).
    fn try_resolve_ref_raw(&self, refname: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_reference(refname) {
            Ok(reference) => {
                let resolved = reference.resolve().unwrap_or(reference);
                let oid = resolved.target().ok_or_else(|| GitError::Internal {
                    message: format!("ref {} has no target", refname),
                })?;
                Ok(Some(oid.to_string()))
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, refname)),
        }
    }

    /// Write a blob into the object database.
    pub fn write_blob(&self, content: &[u8]) -> Result<Oid, GitError> {
        let oid = self.repo.blob(content).map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        Oid::new(oid.to_string()).map_err(|e| e.into())
    }

    /// Read a blob's content as a UTF-8 string.
    pub fn read_blob_as_string(&self, oid: &Oid) -> Result<String, GitError> {
        let git_oid = git2::Oid::from_str(oid.as_str())
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;

        let blob = self
            .repo
            .find_blob(git_oid)
            .map_err(|_| GitError::ObjectNotFound {
                oid: oid.to_string(),
            })?;

        String::from_utf8(blob.content().to_vec()).map_err(|_| GitError::InvalidUtf8 {
            oid: oid.to_string(),
        })
    }

    // =========================================================================
    // Remotes
    // =========================================================================

    /// Push refspecs to a named remote.
    ///
    /// Blocking transport; the caller decides how a failure propagates.
    /// An empty refspec list is a no-op.
    ///
    /// # Errors
    ///
    /// - [`GitError::RemoteNotFound`] if the remote is not configured
    /// - [`GitError::PushFailed`] on any transport or ref-update failure
    pub fn push(&self, remote: &str, refspecs: &[String]) -> Result<(), GitError> {
        if refspecs.is_empty() {
            return Ok(());
        }

        let mut remote_obj =
            self.repo
                .find_remote(remote)
                .map_err(|_| GitError::RemoteNotFound {
                    name: remote.to_string(),
                })?;

        let refs: Vec<&str> = refspecs.iter().map(String::as_str).collect();
        remote_obj
            .push(&refs, None)
            .map_err(|e| GitError::PushFailed {
                remote: remote.to_string(),
                message: e.message().to_string(),
            })
    }

    /// Get a remote's URL, if the remote exists.
    pub fn remote_url(&self, name: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(String::from)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::Internal {
                message: e.message().to_string(),
            }),
        }
    }

    /// Create a remote, or repoint it if it already exists.
    pub fn ensure_remote(&self, name: &str, url: &str) -> Result<(), GitError> {
        match self.repo.find_remote(name) {
            Ok(_) => self
                .repo
                .remote_set_url(name, url)
                .map_err(|e| GitError::Internal {
                    message: format!("{}: {}", name, e.message()),
                }),
            Err(e) if e.code() == git2::ErrorCode::NotFound => self
                .repo
                .remote(name, url)
                .map(|_| ())
                .map_err(|e| GitError::Internal {
                    message: format!("{}: {}", name, e.message()),
                }),
            Err(e) => Err(GitError::Internal {
                message: e.message().to_string(),
            }),
        }
    }
}
