//! engine
//!
//! The admission engine: given a proposed commit's file set and its
//! position in the shared commit graph, decide whether it safely observes
//! every prior commit that most recently touched the same files.
//!
//! # Algorithm
//!
//! 1. Determine the candidate branches to check against, per
//!    [`Policy`]: either the dependency-graph closure of the committing
//!    branch, or every other published branch (with divergent sub-graphs
//!    exempted).
//! 2. For each candidate branch, walk its head's ancestry collecting the
//!    first commit per independent path whose file set intersects the
//!    proposed files. Revert boundaries terminate paths.
//! 3. If anything was collected and the committing branch was never
//!    published, descent cannot be established: `BranchInvalid`.
//! 4. Every collected commit must be an ancestor of (or equal to) the
//!    committing branch's head, else `ConflictingCommit`.
//!
//! # Determinism
//!
//! Any single conflict rejects the whole commit, so enumeration order is
//! not semantically significant, but it is deterministic so rejection
//! reasons are reproducible: branches are checked in name order, files in
//! input order, parents in commit order (breadth-first).
//!
//! # Concurrency
//!
//! The engine performs pure, read-only traversals over an immutable
//! commit set. The check-then-act window between a passed check and the
//! commit's publication is the caller's problem (see
//! [`crate::core::lock::GraphLock`]).

mod walk;

use std::collections::BTreeMap;

use log::debug;
use thiserror::Error;

use crate::core::graph::{DependencyGraph, GraphError, GraphQuery};
use crate::core::types::{GlobalBranchName, Oid};

use walk::{ancestry, first_touchers, AncestrySet, WalkBudget};

/// How the candidate set for a conflict check is chosen.
///
/// Two policies evolved independently and both are valid; a deployment
/// picks one in its config and must apply it consistently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    /// Check only branches reachable through dependency edges.
    ///
    /// Branches with no recorded relationship are assumed independent
    /// and excluded. O(related branches); no false positives between
    /// unrelated work.
    #[default]
    Closure,

    /// Check every other published branch.
    ///
    /// Costlier and produces false positives between unrelated branches,
    /// but needs no dependency bookkeeping. Branches proven to live on a
    /// different divergent sub-graph are exempted.
    AllBranches,
}

impl Policy {
    /// Parse a policy name as written in config files.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "closure" => Some(Policy::Closure),
            "all-branches" => Some(Policy::AllBranches),
            _ => None,
        }
    }

    /// The config-file name of this policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::Closure => "closure",
            Policy::AllBranches => "all-branches",
        }
    }
}

/// Caller-supplied traversal budget.
///
/// Bounds worst-case latency on very large histories. The default is
/// unbounded; one budget spans all walks of a single admission call.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkLimits {
    /// Maximum commits visited across all walks, if any.
    pub max_visited: Option<usize>,
}

/// Why a proposed commit was not admitted.
///
/// Every variant carries the offending commit id and branch name so the
/// hook can print an actionable message.
#[derive(Debug, Error)]
pub enum AdmitError {
    /// The committing branch has no recorded ancestry in the shared
    /// graph, so it cannot descend from the conflicting commit.
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

    /// The committing branch's head does not descend from a commit that
    /// most recently touched one of the proposed files.
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

    /// The traversal budget ran out before a decision was reached.
    #[error("admission walk exceeded the traversal budget of {visited} commits")]
    BudgetExhausted {
        /// The budget that was exhausted
        visited: usize,
    },

    /// The shared graph could not be read.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Decide whether a proposed commit may proceed.
///
/// * `candidate` - the global name of the branch being committed to
/// * `candidate_head` - the branch's current head, or `None` when the
///   branch has no commits yet (the first ever commit in a fresh clone)
/// * `files` - the proposed changed-file set; `None` means unspecified
///   (every related head must already be incorporated), an empty slice
///   conflicts with nothing
///
/// Returns `Ok(())` when the commit safely observes every prior commit
/// that most recently touched any of the same files on every related
/// branch.
pub fn admit<G: GraphQuery>(
    graph: &G,
    deps: &DependencyGraph,
    policy: Policy,
    candidate: &GlobalBranchName,
    candidate_head: Option<&Oid>,
    files: Option<&[String]>,
    limits: &WalkLimits,
) -> Result<(), AdmitError> {
    // An explicitly empty change set intersects nothing.
    if let Some(query) = files {
        if query.is_empty() {
            return Ok(());
        }
    }

    let heads: BTreeMap<GlobalBranchName, Oid> = graph.branches()?.into_iter().collect();
    let mut budget = WalkBudget::new();

    // The candidate's own ancestry, if it has published history. Used
    // both for descent checks and for the divergent-sub-graph exemption.
    // A head without a published branch entry cannot be walked: its
    // commits are not in the shared graph.
    let published_head = heads.get(candidate);
    let candidate_ancestry = match (candidate_head, published_head) {
        (Some(head), Some(_)) => Some(ancestry(graph, head, limits, &mut budget)?),
        (None, Some(head)) => Some(ancestry(graph, head, limits, &mut budget)?),
        (_, None) => None,
    };

    let candidates = candidate_branches(
        graph,
        deps,
        policy,
        candidate,
        &heads,
        candidate_ancestry.as_ref(),
        limits,
        &mut budget,
    )?;

    debug!(
        "admission check for {} against {} candidate branch(es)",
        candidate,
        candidates.len()
    );

    for (branch, head) in candidates {
        let conflicts = first_touchers(graph, &head, files, limits, &mut budget)?;

        for commit in conflicts {
            match (&candidate_ancestry, published_head) {
                // Never published: descent cannot be established.
                (_, None) => {
                    return Err(AdmitError::BranchInvalid { commit, branch });
                }
                (Some(ancestry), _) if ancestry.contains(&commit) => {}
                _ => {
                    return Err(AdmitError::ConflictingCommit { commit, branch });
                }
            }
        }
    }

    Ok(())
}

/// The branches a commit on `candidate` must be checked against, with
/// their heads, in name order.
#[allow(clippy::too_many_arguments)]
fn candidate_branches<G: GraphQuery>(
    graph: &G,
    deps: &DependencyGraph,
    policy: Policy,
    candidate: &GlobalBranchName,
    heads: &BTreeMap<GlobalBranchName, Oid>,
    candidate_ancestry: Option<&AncestrySet>,
    limits: &WalkLimits,
    budget: &mut WalkBudget,
) -> Result<Vec<(GlobalBranchName, Oid)>, AdmitError> {
    match policy {
        Policy::Closure => {
            let related = deps.conflict_set(candidate);
            Ok(heads
                .iter()
                .filter(|(name, _)| related.contains(*name))
                .map(|(name, head)| (name.clone(), head.clone()))
                .collect())
        }
        Policy::AllBranches => {
            let mut result = Vec::new();
            for (name, head) in heads {
                if name == candidate {
                    continue;
                }
                if let Some(cand) = candidate_ancestry {
                    let other = ancestry(graph, head, limits, budget)?;
                    if on_different_subgraph(cand, &other) {
                        continue;
                    }
                }
                result.push((name.clone(), head.clone()));
            }
            Ok(result)
        }
    }
}

/// Divergent sub-graph exemption for the full-mesh policy.
///
/// Two branches conflict only if they live on the same side of every
/// divergent commit found in either history. If exactly one of the two
/// heads descends from some divergent commit, the branches forked at an
/// accepted fork point and do not constrain each other.
fn on_different_subgraph(cand: &AncestrySet, other: &AncestrySet) -> bool {
    for d in cand.divergent.iter().chain(other.divergent.iter()) {
        if cand.contains(d) != other.contains(d) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::{FileSet, InMemoryGraph};

    fn oid(n: u32) -> Oid {
        Oid::new(format!("{:040x}", n)).unwrap()
    }

    fn branch(name: &str) -> GlobalBranchName {
        GlobalBranchName::parse(name).unwrap()
    }

    fn files(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn no_limits() -> WalkLimits {
        WalkLimits::default()
    }

    /// Scenario: clone A committed file.bin first ever; clone B, with no
    /// published ancestry, also commits file.bin.
    #[test]
    fn unpublished_branch_is_invalid_against_existing_conflict() {
        let mut g = InMemoryGraph::new();
        g.add_commit(oid(1), vec![], FileSet::paths(["file.bin"]));
        g.set_head(branch("a_x_1/main"), oid(1));

        let deps = DependencyGraph::new();
        let query = files(&["file.bin"]);
        let result = admit(
            &g,
            &deps,
            Policy::AllBranches,
            &branch("b_y_2/main"),
            None,
            Some(&query),
            &no_limits(),
        );

        match result {
            Err(AdmitError::BranchInvalid { commit, branch: b }) => {
                assert_eq!(commit, oid(1));
                assert_eq!(b, branch("a_x_1/main"));
            }
            other => panic!("expected BranchInvalid, got {:?}", other),
        }
    }

    /// Scenario: clone B is synced past A's file.bin commit and commits
    /// file.bin again.
    #[test]
    fn descendant_head_is_admitted() {
        let mut g = InMemoryGraph::new();
        g.add_commit(oid(1), vec![], FileSet::paths(["file.bin"]));
        g.add_commit(oid(2), vec![oid(1)], FileSet::paths(["file.txt"]));
        g.add_commit(oid(3), vec![oid(2)], FileSet::paths(["notes.md"]));
        g.set_head(branch("a_x_1/main"), oid(2));
        g.set_head(branch("b_y_2/main"), oid(3));

        let deps = DependencyGraph::new();
        let query = files(&["file.bin"]);
        let result = admit(
            &g,
            &deps,
            Policy::AllBranches,
            &branch("b_y_2/main"),
            Some(&oid(3)),
            Some(&query),
            &no_limits(),
        );

        assert!(result.is_ok(), "got {:?}", result);
    }

    /// Scenario: clone B commits file.bin without having synced A's
    /// change.
    #[test]
    fn sibling_change_is_rejected() {
        // Common root 1; A went to 2 touching file.bin, B sits on 1.
        let mut g = InMemoryGraph::new();
        g.add_commit(oid(1), vec![], FileSet::paths(["file.bin"]));
        g.add_commit(oid(2), vec![oid(1)], FileSet::paths(["file.bin"]));
        g.set_head(branch("a_x_1/main"), oid(2));
        g.set_head(branch("b_y_2/main"), oid(1));

        let deps = DependencyGraph::new();
        let query = files(&["file.bin"]);
        let result = admit(
            &g,
            &deps,
            Policy::AllBranches,
            &branch("b_y_2/main"),
            Some(&oid(1)),
            Some(&query),
            &no_limits(),
        );

        match result {
            Err(AdmitError::ConflictingCommit { commit, branch: b }) => {
                assert_eq!(commit, oid(2));
                assert_eq!(b, branch("a_x_1/main"));
            }
            other => panic!("expected ConflictingCommit, got {:?}", other),
        }
    }

    /// Scenario: same as above, but B merged A's change first.
    #[test]
    fn merged_head_is_admitted() {
        let mut g = InMemoryGraph::new();
        g.add_commit(oid(1), vec![], FileSet::paths(["file.bin"]));
        g.add_commit(oid(2), vec![oid(1)], FileSet::paths(["file.bin"]));
        g.add_commit(oid(3), vec![oid(1)], FileSet::paths(["file.txt"]));
        // B's merge of A's change.
        g.add_commit(oid(4), vec![oid(3), oid(2)], FileSet::empty());
        g.set_head(branch("a_x_1/main"), oid(2));
        g.set_head(branch("b_y_2/main"), oid(4));

        let deps = DependencyGraph::new();
        let query = files(&["file.bin"]);
        let result = admit(
            &g,
            &deps,
            Policy::AllBranches,
            &branch("b_y_2/main"),
            Some(&oid(4)),
            Some(&query),
            &no_limits(),
        );

        assert!(result.is_ok(), "got {:?}", result);
    }

    /// Disjoint files never conflict, whatever the graph shape.
    #[test]
    fn disjoint_files_are_independent() {
        let mut g = InMemoryGraph::new();
        g.add_commit(oid(1), vec![], FileSet::paths(["theirs.bin"]));
        g.add_commit(oid(2), vec![], FileSet::paths(["ours.bin"]));
        g.set_head(branch("a_x_1/main"), oid(1));
        g.set_head(branch("b_y_2/main"), oid(2));

        let deps = DependencyGraph::new();
        let query = files(&["ours.bin"]);
        let result = admit(
            &g,
            &deps,
            Policy::AllBranches,
            &branch("b_y_2/main"),
            Some(&oid(2)),
            Some(&query),
            &no_limits(),
        );

        assert!(result.is_ok(), "got {:?}", result);
    }

    /// Under the closure policy a branch outside the conflict set never
    /// blocks admission, even on the same file.
    #[test]
    fn closure_policy_scopes_the_search() {
        let mut g = InMemoryGraph::new();
        g.add_commit(oid(1), vec![], FileSet::paths(["file.bin"]));
        g.add_commit(oid(2), vec![], FileSet::paths(["file.bin"]));
        g.set_head(branch("a_x_1/main"), oid(1));
        g.set_head(branch("b_y_2/main"), oid(2));

        // No edges: nothing is related, so nothing conflicts.
        let deps = DependencyGraph::new();
        let query = files(&["file.bin"]);
        let result = admit(
            &g,
            &deps,
            Policy::Closure,
            &branch("b_y_2/main"),
            Some(&oid(2)),
            Some(&query),
            &no_limits(),
        );
        assert!(result.is_ok(), "got {:?}", result);

        // Adding the edge makes the same commit conflict.
        let mut deps = DependencyGraph::new();
        deps.will_merge_into(branch("b_y_2/main"), branch("a_x_1/main"));
        let result = admit(
            &g,
            &deps,
            Policy::Closure,
            &branch("b_y_2/main"),
            Some(&oid(2)),
            Some(&query),
            &no_limits(),
        );
        assert!(matches!(
            result,
            Err(AdmitError::ConflictingCommit { .. })
        ));
    }

    /// Closure is transitive: an edge chain relates its endpoints.
    #[test]
    fn closure_policy_is_transitive() {
        let mut g = InMemoryGraph::new();
        g.add_commit(oid(1), vec![], FileSet::paths(["file.bin"]));
        g.add_commit(oid(2), vec![], FileSet::paths(["file.bin"]));
        g.set_head(branch("a_x_1/main"), oid(1));
        g.set_head(branch("c_z_3/main"), oid(2));

        let mut deps = DependencyGraph::new();
        deps.will_merge_into(branch("c_z_3/main"), branch("b_y_2/mid"));
        deps.will_merge_into(branch("b_y_2/mid"), branch("a_x_1/main"));

        let query = files(&["file.bin"]);
        let result = admit(
            &g,
            &deps,
            Policy::Closure,
            &branch("c_z_3/main"),
            Some(&oid(2)),
            Some(&query),
            &no_limits(),
        );
        assert!(matches!(
            result,
            Err(AdmitError::ConflictingCommit { .. })
        ));
    }

    /// Marking a commit as a revert makes pre-revert file history
    /// invisible to later checks.
    #[test]
    fn revert_erases_prior_file_history() {
        // A touched file.bin (2), then reverted (3). B on the root.
        let mut g = InMemoryGraph::new();
        g.add_commit(oid(1), vec![], FileSet::paths(["readme"]));
        g.add_commit(oid(2), vec![oid(1)], FileSet::paths(["file.bin"]));
        g.add_commit(oid(3), vec![oid(2)], FileSet::empty());
        g.set_head(branch("a_x_1/main"), oid(3));
        g.set_head(branch("b_y_2/main"), oid(1));

        let deps = DependencyGraph::new();
        let query = files(&["file.bin"]);

        // Without the revert mark, 2 blocks B.
        let result = admit(
            &g,
            &deps,
            Policy::AllBranches,
            &branch("b_y_2/main"),
            Some(&oid(1)),
            Some(&query),
            &no_limits(),
        );
        assert!(matches!(
            result,
            Err(AdmitError::ConflictingCommit { .. })
        ));

        // With it, the search stops at 3 and B is free to commit.
        g.mark_revert(&oid(3));
        let result = admit(
            &g,
            &deps,
            Policy::AllBranches,
            &branch("b_y_2/main"),
            Some(&oid(1)),
            Some(&query),
            &no_limits(),
        );
        assert!(result.is_ok(), "got {:?}", result);
    }

    /// Branches behind an accepted fork point don't constrain branches
    /// outside it under the full-mesh policy.
    #[test]
    fn divergent_fork_exempts_the_other_subgraph() {
        // Root 1; divergent fork 2 leads to A's world, B stays on 1's.
        let mut g = InMemoryGraph::new();
        g.add_commit(oid(1), vec![], FileSet::paths(["file.bin"]));
        g.add_commit(oid(2), vec![oid(1)], FileSet::empty());
        g.add_commit(oid(3), vec![oid(2)], FileSet::paths(["file.bin"]));
        g.add_commit(oid(4), vec![oid(1)], FileSet::paths(["other.txt"]));
        g.mark_divergent(&oid(2));
        g.set_head(branch("a_x_1/fork"), oid(3));
        g.set_head(branch("b_y_2/main"), oid(4));

        let deps = DependencyGraph::new();
        let query = files(&["file.bin"]);
        let result = admit(
            &g,
            &deps,
            Policy::AllBranches,
            &branch("b_y_2/main"),
            Some(&oid(4)),
            Some(&query),
            &no_limits(),
        );

        // A's file.bin commit (3) sits past the divergent fork; B is not
        // on that sub-graph and is not constrained by it.
        assert!(result.is_ok(), "got {:?}", result);
    }

    /// An empty staged set admits vacuously.
    #[test]
    fn empty_file_set_is_admitted() {
        let mut g = InMemoryGraph::new();
        g.add_commit(oid(1), vec![], FileSet::All);
        g.set_head(branch("a_x_1/main"), oid(1));

        let deps = DependencyGraph::new();
        let query: Vec<String> = vec![];
        let result = admit(
            &g,
            &deps,
            Policy::AllBranches,
            &branch("b_y_2/main"),
            None,
            Some(&query),
            &no_limits(),
        );

        assert!(result.is_ok(), "got {:?}", result);
    }

    /// A wildcard commit conflicts with any proposed file.
    #[test]
    fn wildcard_commit_touches_everything() {
        let mut g = InMemoryGraph::new();
        g.add_commit(oid(1), vec![], FileSet::empty());
        g.add_commit(oid(2), vec![oid(1)], FileSet::All);
        g.set_head(branch("a_x_1/main"), oid(2));
        g.set_head(branch("b_y_2/main"), oid(1));

        let deps = DependencyGraph::new();
        let query = files(&["anything.bin"]);
        let result = admit(
            &g,
            &deps,
            Policy::AllBranches,
            &branch("b_y_2/main"),
            Some(&oid(1)),
            Some(&query),
            &no_limits(),
        );

        assert!(matches!(
            result,
            Err(AdmitError::ConflictingCommit { commit, .. }) if commit == oid(2)
        ));
    }

    /// A fresh graph admits the very first commit of a file even from an
    /// unpublished branch: there is nothing to conflict with.
    #[test]
    fn first_ever_commit_is_admitted() {
        let g = InMemoryGraph::new();
        let deps = DependencyGraph::new();
        let query = files(&["file.bin"]);
        let result = admit(
            &g,
            &deps,
            Policy::AllBranches,
            &branch("a_x_1/main"),
            None,
            Some(&query),
            &no_limits(),
        );

        assert!(result.is_ok(), "got {:?}", result);
    }

    /// Rejections are deterministic: the lowest-named branch wins the
    /// report when several conflict.
    #[test]
    fn rejection_order_is_branch_name_order() {
        let mut g = InMemoryGraph::new();
        g.add_commit(oid(1), vec![], FileSet::paths(["file.bin"]));
        g.add_commit(oid(2), vec![], FileSet::paths(["file.bin"]));
        g.add_commit(oid(3), vec![], FileSet::paths(["file.bin"]));
        g.set_head(branch("c_z_3/main"), oid(1));
        g.set_head(branch("b_y_2/main"), oid(2));
        g.set_head(branch("d_w_4/main"), oid(3));

        let deps = DependencyGraph::new();
        let query = files(&["file.bin"]);

        for _ in 0..3 {
            let result = admit(
                &g,
                &deps,
                Policy::AllBranches,
                &branch("a_x_1/main"),
                None,
                Some(&query),
                &no_limits(),
            );
            match result {
                Err(AdmitError::BranchInvalid { branch: b, .. }) => {
                    assert_eq!(b, branch("b_y_2/main"));
                }
                other => panic!("expected BranchInvalid, got {:?}", other),
            }
        }
    }

    /// Republishing identical branch state changes no outcome.
    #[test]
    fn admission_is_idempotent_under_republish() {
        let mut g = InMemoryGraph::new();
        g.add_commit(oid(1), vec![], FileSet::paths(["file.bin"]));
        g.add_commit(oid(2), vec![oid(1)], FileSet::paths(["file.bin"]));
        g.set_head(branch("a_x_1/main"), oid(2));
        g.set_head(branch("b_y_2/main"), oid(1));

        let deps = DependencyGraph::new();
        let query = files(&["file.bin"]);

        let first = admit(
            &g,
            &deps,
            Policy::AllBranches,
            &branch("b_y_2/main"),
            Some(&oid(1)),
            Some(&query),
            &no_limits(),
        );

        // Re-point the same branch at the same head: same outcome.
        g.set_head(branch("a_x_1/main"), oid(2));
        let second = admit(
            &g,
            &deps,
            Policy::AllBranches,
            &branch("b_y_2/main"),
            Some(&oid(1)),
            Some(&query),
            &no_limits(),
        );

        assert_eq!(
            matches!(first, Err(AdmitError::ConflictingCommit { .. })),
            matches!(second, Err(AdmitError::ConflictingCommit { .. }))
        );
    }
}
