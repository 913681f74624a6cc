//! core::naming
//!
//! Namespace mapping between local branches and the shared graph.
//!
//! # Features
//!
//! - Map (repo id, local branch) to the namespaced global branch name
//! - Sanitize configured user names for use in repository ids
//!
//! Every clone publishes its branches under `refs/heads/{repo_id}/...`.
//! Since a repo id never contains `/`, two distinct local branches can
//! never alias to the same global name. No inverse mapping exists or is
//! needed; the global graph is only ever queried, never mapped back.

use crate::core::types::{BranchName, GlobalBranchName, RepoId};

/// Map a local branch to its global name in the shared graph.
///
/// # Example
///
/// ```
/// use gitgate::core::naming::global_branch;
/// use gitgate::core::types::{BranchName, RepoId};
///
/// let id = RepoId::new("alice_box_1f2e3d4c5b").unwrap();
/// let local = BranchName::new("feature/model").unwrap();
/// let global = global_branch(&id, &local);
///
/// assert_eq!(global.as_str(), "alice_box_1f2e3d4c5b/feature/model");
/// ```
pub fn global_branch(repo_id: &RepoId, local: &BranchName) -> GlobalBranchName {
    GlobalBranchName::new(repo_id.clone(), local.clone())
}

/// Build the push refspec publishing a local branch under its global name.
///
/// The refspec is forced (`+`): each clone is the only writer of its own
/// namespace in the shared graph, so a forced update cannot clobber
/// anyone else's refs, and it lets amended or deleted local history be
/// mirrored faithfully.
///
/// # Example
///
/// ```
/// use gitgate::core::naming::push_refspec;
/// use gitgate::core::types::{BranchName, RepoId};
///
/// let id = RepoId::new("alice_box_1f2e3d4c5b").unwrap();
/// let local = BranchName::new("main").unwrap();
///
/// assert_eq!(
///     push_refspec(&id, &local),
///     "+refs/heads/main:refs/heads/alice_box_1f2e3d4c5b/main"
/// );
/// ```
pub fn push_refspec(repo_id: &RepoId, local: &BranchName) -> String {
    format!(
        "+refs/heads/{}:{}",
        local.as_str(),
        global_branch(repo_id, local).to_ref()
    )
}

/// Sanitize a configured user name for use in a repository id.
///
/// Keeps ASCII alphanumerics only and lower-cases them; everything else
/// (spaces, dots, unicode) is dropped.
///
/// # Example
///
/// ```
/// use gitgate::core::naming::sanitize_user_name;
///
/// assert_eq!(sanitize_user_name("Ada Lovelace"), "adalovelace");
/// assert_eq!(sanitize_user_name("j.doe+work"), "jdoework");
/// assert_eq!(sanitize_user_name("---"), "");
/// ```
pub fn sanitize_user_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_names_never_collide_across_repos() {
        let a = RepoId::new("alice_box_1f2e3d4c5b").unwrap();
        let b = RepoId::new("bob_box_a1b2c3d4e5").unwrap();
        let branch = BranchName::new("main").unwrap();

        assert_ne!(global_branch(&a, &branch), global_branch(&b, &branch));
    }

    #[test]
    fn nested_branch_maps_under_namespace() {
        let id = RepoId::new("alice_box_1f2e3d4c5b").unwrap();
        let branch = BranchName::new("feature/a/b").unwrap();

        assert_eq!(
            global_branch(&id, &branch).to_ref(),
            "refs/heads/alice_box_1f2e3d4c5b/feature/a/b"
        );
    }

    #[test]
    fn sanitize_strips_everything_non_alphanumeric() {
        assert_eq!(sanitize_user_name("María-José"), "marajos");
        assert_eq!(sanitize_user_name("user.name@host"), "usernamehost");
    }
}
