//! engine::walk
//!
//! Ancestry traversals over the shared commit graph.
//!
//! All walks are explicit worklists with visited sets: no recursion, so
//! stack depth is bounded and a cycle (which the DAG invariant forbids)
//! can only cost time, never correctness. Walks are pure reads over an
//! immutable commit set.

use std::collections::{HashSet, VecDeque};

use crate::core::graph::GraphQuery;
use crate::core::types::Oid;

use super::{AdmitError, WalkLimits};

/// Shared counter for the caller-supplied traversal budget.
///
/// One budget spans every walk within a single admission call, so the
/// bound holds for the whole decision, not per branch.
#[derive(Debug, Default)]
pub(super) struct WalkBudget {
    visited: usize,
}

impl WalkBudget {
    pub(super) fn new() -> Self {
        Self::default()
    }

    fn charge(&mut self, limits: &WalkLimits) -> Result<(), AdmitError> {
        self.visited += 1;
        match limits.max_visited {
            Some(max) if self.visited > max => Err(AdmitError::BudgetExhausted { visited: max }),
            _ => Ok(()),
        }
    }
}

/// Everything reachable from `head` (inclusive), plus the divergent
/// commits found along the way.
#[derive(Debug)]
pub(super) struct AncestrySet {
    /// All reachable commit ids, `head` included.
    pub reachable: HashSet<Oid>,
    /// The divergent-tagged subset, in discovery order.
    pub divergent: Vec<Oid>,
}

impl AncestrySet {
    /// Is `target` an ancestor of (or equal to) the walked head?
    pub fn contains(&self, target: &Oid) -> bool {
        self.reachable.contains(target)
    }
}

/// Walk every ancestor of `head` via primary and merge parents.
///
/// Revert boundaries do not stop this walk: descent is about graph
/// reachability, not file history.
pub(super) fn ancestry<G: GraphQuery>(
    graph: &G,
    head: &Oid,
    limits: &WalkLimits,
    budget: &mut WalkBudget,
) -> Result<AncestrySet, AdmitError> {
    let mut reachable: HashSet<Oid> = HashSet::new();
    let mut divergent: Vec<Oid> = Vec::new();
    let mut queue: VecDeque<Oid> = VecDeque::new();

    reachable.insert(head.clone());
    queue.push_back(head.clone());

    while let Some(current) = queue.pop_front() {
        budget.charge(limits)?;
        let node = graph.node(&current)?;

        if node.divergent {
            divergent.push(current.clone());
        }

        for parent in &node.parents {
            if reachable.insert(parent.clone()) {
                queue.push_back(parent.clone());
            }
        }
    }

    Ok(AncestrySet {
        reachable,
        divergent,
    })
}

/// Collect, per independent path from `head`, the first commit whose
/// changed-file set intersects `files`.
///
/// - `files == None` means unspecified: the first non-revert commit on
///   each path (normally just the head) matches.
/// - A revert-tagged commit terminates its path with no match.
/// - A match terminates its path: older history is never inspected.
///
/// Paths that converge on shared history are deduplicated by the visited
/// set; results come back in breadth-first discovery order, which is
/// deterministic for a given graph.
pub(super) fn first_touchers<G: GraphQuery>(
    graph: &G,
    head: &Oid,
    files: Option<&[String]>,
    limits: &WalkLimits,
    budget: &mut WalkBudget,
) -> Result<Vec<Oid>, AdmitError> {
    let mut matches: Vec<Oid> = Vec::new();
    let mut visited: HashSet<Oid> = HashSet::new();
    let mut queue: VecDeque<Oid> = VecDeque::new();

    visited.insert(head.clone());
    queue.push_back(head.clone());

    while let Some(current) = queue.pop_front() {
        budget.charge(limits)?;
        let node = graph.node(&current)?;

        if node.is_revert {
            // History boundary: this path ends with no match.
            continue;
        }

        let touched = match files {
            None => true,
            Some(query) => node.files.intersects(query),
        };

        if touched {
            matches.push(current);
            continue;
        }

        for parent in &node.parents {
            if visited.insert(parent.clone()) {
                queue.push_back(parent.clone());
            }
        }
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::{FileSet, InMemoryGraph};

    fn oid(n: u32) -> Oid {
        Oid::new(format!("{:040x}", n)).unwrap()
    }

    fn nolimit() -> WalkLimits {
        WalkLimits::default()
    }

    #[test]
    fn first_toucher_stops_at_nearest_match() {
        // 1 (file.bin) <- 2 (file.bin) <- 3 (other)
        let mut g = InMemoryGraph::new();
        g.add_commit(oid(1), vec![], FileSet::paths(["file.bin"]));
        g.add_commit(oid(2), vec![oid(1)], FileSet::paths(["file.bin"]));
        g.add_commit(oid(3), vec![oid(2)], FileSet::paths(["other.txt"]));

        let mut budget = WalkBudget::new();
        let found = first_touchers(
            &g,
            &oid(3),
            Some(&["file.bin".to_string()]),
            &nolimit(),
            &mut budget,
        )
        .unwrap();

        // Only the nearest toucher; commit 1 is behind it and never inspected.
        assert_eq!(found, vec![oid(2)]);
    }

    #[test]
    fn first_toucher_follows_both_merge_parents() {
        // Two roots touching the file, joined by a merge that doesn't.
        let mut g = InMemoryGraph::new();
        g.add_commit(oid(1), vec![], FileSet::paths(["file.bin"]));
        g.add_commit(oid(2), vec![], FileSet::paths(["file.bin"]));
        g.add_commit(oid(3), vec![oid(1), oid(2)], FileSet::empty());

        let mut budget = WalkBudget::new();
        let found = first_touchers(
            &g,
            &oid(3),
            Some(&["file.bin".to_string()]),
            &nolimit(),
            &mut budget,
        )
        .unwrap();

        assert_eq!(found.len(), 2);
        assert!(found.contains(&oid(1)));
        assert!(found.contains(&oid(2)));
    }

    #[test]
    fn revert_terminates_the_path() {
        // 1 (file.bin) <- 2 (revert) <- 3 (other)
        let mut g = InMemoryGraph::new();
        g.add_commit(oid(1), vec![], FileSet::paths(["file.bin"]));
        g.add_commit(oid(2), vec![oid(1)], FileSet::empty());
        g.add_commit(oid(3), vec![oid(2)], FileSet::paths(["other.txt"]));
        g.mark_revert(&oid(2));

        let mut budget = WalkBudget::new();
        let found = first_touchers(
            &g,
            &oid(3),
            Some(&["file.bin".to_string()]),
            &nolimit(),
            &mut budget,
        )
        .unwrap();

        assert!(found.is_empty());
    }

    #[test]
    fn unspecified_files_match_the_head() {
        let mut g = InMemoryGraph::new();
        g.add_commit(oid(1), vec![], FileSet::paths(["a"]));
        g.add_commit(oid(2), vec![oid(1)], FileSet::empty());

        let mut budget = WalkBudget::new();
        let found = first_touchers(&g, &oid(2), None, &nolimit(), &mut budget).unwrap();

        assert_eq!(found, vec![oid(2)]);
    }

    #[test]
    fn ancestry_collects_divergent_commits() {
        let mut g = InMemoryGraph::new();
        g.add_commit(oid(1), vec![], FileSet::empty());
        g.add_commit(oid(2), vec![oid(1)], FileSet::empty());
        g.add_commit(oid(3), vec![oid(2)], FileSet::empty());
        g.mark_divergent(&oid(2));

        let mut budget = WalkBudget::new();
        let set = ancestry(&g, &oid(3), &nolimit(), &mut budget).unwrap();

        assert!(set.contains(&oid(1)));
        assert!(set.contains(&oid(3)));
        assert_eq!(set.divergent, vec![oid(2)]);
    }

    #[test]
    fn budget_exhaustion_is_reported() {
        let mut g = InMemoryGraph::new();
        g.add_commit(oid(1), vec![], FileSet::empty());
        g.add_commit(oid(2), vec![oid(1)], FileSet::empty());
        g.add_commit(oid(3), vec![oid(2)], FileSet::empty());

        let limits = WalkLimits {
            max_visited: Some(2),
        };
        let mut budget = WalkBudget::new();
        let result = ancestry(&g, &oid(3), &limits, &mut budget);

        assert!(matches!(result, Err(AdmitError::BudgetExhausted { .. })));
    }

    #[test]
    fn shared_history_is_visited_once() {
        // Diamond: 1 <- 2, 1 <- 3, {2,3} <- 4. Visiting 1 twice would
        // double-charge the budget; 4 nodes must fit a budget of 4.
        let mut g = InMemoryGraph::new();
        g.add_commit(oid(1), vec![], FileSet::empty());
        g.add_commit(oid(2), vec![oid(1)], FileSet::empty());
        g.add_commit(oid(3), vec![oid(1)], FileSet::empty());
        g.add_commit(oid(4), vec![oid(2), oid(3)], FileSet::empty());

        let limits = WalkLimits {
            max_visited: Some(4),
        };
        let mut budget = WalkBudget::new();
        assert!(ancestry(&g, &oid(4), &limits, &mut budget).is_ok());
    }
}
