//! core::graph
//!
//! Dependency graph between branches and the commit-graph data model the
//! admission engine runs against.
//!
//! # Architecture
//!
//! Two graphs live here and they are easy to conflate:
//!
//! - The **dependency graph**: explicit, removable edges declaring which
//!   branches intend to exchange history. It bounds the conflict search.
//! - The **commit graph**: the immutable DAG of published commits, seen
//!   through the [`GraphQuery`] trait so the engine never touches git2.
//!
//! # Invariants
//!
//! - Commit parents always predate children in publish order; no cycles
//! - Dependency edges are idempotent to add and remove
//! - All enumeration is deterministic (sorted maps throughout)

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{GlobalBranchName, Oid};

/// Errors from commit-graph queries.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A commit referenced by the graph could not be loaded.
    #[error("commit not found in shared graph: {oid}")]
    MissingCommit {
        /// The commit that could not be loaded
        oid: String,
    },

    /// The backing store failed.
    #[error("graph backend error: {message}")]
    Backend {
        /// The underlying error message
        message: String,
    },
}

/// The set of files a commit changed.
///
/// `All` is the wildcard sentinel: a commit whose file set cannot be
/// represented is treated as touching everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSet {
    /// The commit touches every file.
    All,
    /// The commit touches exactly these paths.
    Paths(BTreeSet<String>),
}

impl FileSet {
    /// Build a path set from anything iterable as strings.
    pub fn paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Paths(paths.into_iter().map(Into::into).collect())
    }

    /// An empty path set (the commit touches nothing we track).
    pub fn empty() -> Self {
        Self::Paths(BTreeSet::new())
    }

    /// Does this set intersect the given paths?
    ///
    /// `All` intersects any non-empty query; nothing intersects an empty
    /// query.
    pub fn intersects(&self, query: &[String]) -> bool {
        if query.is_empty() {
            return false;
        }
        match self {
            FileSet::All => true,
            FileSet::Paths(paths) => query.iter().any(|q| paths.contains(q)),
        }
    }
}

/// One commit as the admission engine sees it.
#[derive(Debug, Clone)]
pub struct CommitNode {
    /// Ordered parent ids; first is the primary parent.
    pub parents: Vec<Oid>,
    /// Files this commit changed.
    pub files: FileSet,
    /// Accepted fork point (exempts divergent sub-graphs from full-mesh
    /// conflict search).
    pub divergent: bool,
    /// History boundary: file searches stop here.
    pub is_revert: bool,
}

/// Read access to the shared commit graph.
///
/// The admission engine is generic over this trait; the production
/// implementation is backed by the shared git repository, tests use
/// [`InMemoryGraph`].
pub trait GraphQuery {
    /// Every published branch with its head, sorted by name.
    fn branches(&self) -> Result<Vec<(GlobalBranchName, Oid)>, GraphError>;

    /// Load one commit node.
    fn node(&self, id: &Oid) -> Result<CommitNode, GraphError>;
}

/// Directed edges recording which branches intend to exchange history.
///
/// An edge (consumer, provider) means the consumer intends to merge the
/// provider's changes. Absent edges mean the branches are independent and
/// excluded from conflict checks under the closure policy.
///
/// # Example
///
/// ```
/// use gitgate::core::graph::DependencyGraph;
/// use gitgate::core::types::GlobalBranchName;
///
/// let art = GlobalBranchName::parse("alice_box_1f2e3d4c5b/art").unwrap();
/// let main = GlobalBranchName::parse("bob_box_a1b2c3d4e5/main").unwrap();
///
/// let mut deps = DependencyGraph::new();
/// deps.will_merge_into(art.clone(), main.clone());
///
/// assert!(deps.conflict_set(&art).contains(&main));
/// assert!(deps.conflict_set(&main).contains(&art));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    /// consumer -> providers it intends to merge from
    edges: BTreeMap<GlobalBranchName, BTreeSet<GlobalBranchName>>,
}

impl DependencyGraph {
    /// Create an empty dependency graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `consumer` intends to merge `provider`'s changes.
    ///
    /// Idempotent; re-adding an existing edge changes nothing.
    pub fn will_merge_into(&mut self, consumer: GlobalBranchName, provider: GlobalBranchName) {
        self.edges.entry(consumer).or_default().insert(provider);
    }

    /// Remove the edge from `consumer` to `provider`.
    ///
    /// Idempotent; removing an absent edge changes nothing.
    pub fn will_not_merge_into(&mut self, consumer: &GlobalBranchName, provider: &GlobalBranchName) {
        if let Some(providers) = self.edges.get_mut(consumer) {
            providers.remove(provider);
            if providers.is_empty() {
                self.edges.remove(consumer);
            }
        }
    }

    /// Branches this branch intends to merge from (direct edges only).
    pub fn upstream(&self, branch: &GlobalBranchName) -> Vec<GlobalBranchName> {
        self.edges
            .get(branch)
            .map(|providers| providers.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Branches that intend to merge from this branch (direct edges only).
    pub fn downstream(&self, branch: &GlobalBranchName) -> Vec<GlobalBranchName> {
        self.edges
            .iter()
            .filter(|(_, providers)| providers.contains(branch))
            .map(|(consumer, _)| consumer.clone())
            .collect()
    }

    /// The transitive closure of branches that can conflict with `branch`.
    ///
    /// Edges are treated as bidirectional reachability for this purpose:
    /// history flows both ways once two branches intend to merge, however
    /// indirectly. The branch itself is not included. A branch with no
    /// edges conflicts with nothing.
    ///
    /// Iterative worklist with a visited set; no recursion.
    pub fn conflict_set(&self, branch: &GlobalBranchName) -> BTreeSet<GlobalBranchName> {
        let mut visited: BTreeSet<GlobalBranchName> = BTreeSet::new();
        let mut queue: VecDeque<GlobalBranchName> = VecDeque::new();

        visited.insert(branch.clone());
        queue.push_back(branch.clone());

        while let Some(current) = queue.pop_front() {
            for neighbor in self
                .upstream(&current)
                .into_iter()
                .chain(self.downstream(&current))
            {
                if visited.insert(neighbor.clone()) {
                    queue.push_back(neighbor);
                }
            }
        }

        visited.remove(branch);
        visited
    }

    /// Iterate all edges as (consumer, providers it merges from).
    pub fn edges(&self) -> impl Iterator<Item = (&GlobalBranchName, &BTreeSet<GlobalBranchName>)> {
        self.edges.iter()
    }

    /// All branches that appear on either side of an edge.
    pub fn branches(&self) -> BTreeSet<GlobalBranchName> {
        let mut all: BTreeSet<GlobalBranchName> = self.edges.keys().cloned().collect();
        for providers in self.edges.values() {
            all.extend(providers.iter().cloned());
        }
        all
    }

    /// True if no edges are recorded at all.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// An in-memory commit graph.
///
/// The test double for [`GraphQuery`]: engine unit tests and property
/// tests build graphs directly instead of scripting git repositories.
/// Shipped in-tree (not behind `cfg(test)`) so integration and property
/// tests can use it too.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraph {
    commits: HashMap<Oid, CommitNode>,
    heads: BTreeMap<GlobalBranchName, Oid>,
}

impl InMemoryGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a commit with the given parents and file set.
    pub fn add_commit(&mut self, id: Oid, parents: Vec<Oid>, files: FileSet) {
        self.commits.insert(
            id,
            CommitNode {
                parents,
                files,
                divergent: false,
                is_revert: false,
            },
        );
    }

    /// Point a branch at a head commit.
    pub fn set_head(&mut self, branch: GlobalBranchName, head: Oid) {
        self.heads.insert(branch, head);
    }

    /// Remove a branch (publishing a deletion has no tombstone).
    pub fn remove_branch(&mut self, branch: &GlobalBranchName) {
        self.heads.remove(branch);
    }

    /// Tag a commit as an accepted fork point.
    pub fn mark_divergent(&mut self, id: &Oid) {
        if let Some(node) = self.commits.get_mut(id) {
            node.divergent = true;
        }
    }

    /// Tag a commit as a history boundary.
    pub fn mark_revert(&mut self, id: &Oid) {
        if let Some(node) = self.commits.get_mut(id) {
            node.is_revert = true;
        }
    }
}

impl GraphQuery for InMemoryGraph {
    fn branches(&self) -> Result<Vec<(GlobalBranchName, Oid)>, GraphError> {
        Ok(self
            .heads
            .iter()
            .map(|(name, oid)| (name.clone(), oid.clone()))
            .collect())
    }

    fn node(&self, id: &Oid) -> Result<CommitNode, GraphError> {
        self.commits
            .get(id)
            .cloned()
            .ok_or_else(|| GraphError::MissingCommit {
                oid: id.to_string(),
            })
    }
}
