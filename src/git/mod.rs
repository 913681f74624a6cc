//! git
//!
//! Single interface for all Git operations.
//!
//! All Git interactions flow through [`Git`] in [`interface`], which wraps
//! git2 and normalizes errors into typed failure categories. No other
//! module imports `git2` directly.

pub mod interface;

pub use interface::{Git, GitError, LocalBranch, RefEntry, RepoInfo};
