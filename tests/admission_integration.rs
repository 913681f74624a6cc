//! End-to-end admission tests over real git repositories.
//!
//! Each test builds a bare shared graph plus one or more working clones
//! in a temp directory, drives commits through the hook entry points,
//! and asserts on the verdicts.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use gitgate::core::config::Config;
use gitgate::core::paths::GatePaths;
use gitgate::core::shared::SharedGraph;
use gitgate::core::types::{Oid, RepoId};
use gitgate::git::Git;
use gitgate::hooks::{self, GateError};
use gitgate::identity;
use gitgate::sync;

/// A shared graph with any number of working clones beside it.
struct World {
    dir: TempDir,
}

impl World {
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        run_git(dir.path(), &["init", "--bare", "graph.git"]);
        Self { dir }
    }

    fn graph_path(&self) -> PathBuf {
        self.dir.path().join("graph.git")
    }

    /// Create a working clone configured against the shared graph.
    fn clone_repo(&self, name: &str, user: &str, policy: &str) -> CloneRepo {
        let path = self.dir.path().join(name);
        std::fs::create_dir(&path).unwrap();

        run_git(&path, &["init", "-b", "main"]);
        run_git(&path, &["config", "user.email", "test@example.com"]);
        run_git(&path, &["config", "user.name", user]);
        run_git(&path, &[
            "remote",
            "add",
            "global-graph",
            self.graph_path().to_str().unwrap(),
        ]);

        let clone = CloneRepo { path };

        let git = clone.git();
        let paths = GatePaths::from_repo_info(&git.info());
        let mut config = Config::load(&paths).unwrap();
        config.repo.graph_path = Some(self.graph_path());
        config.repo.policy = policy.to_string();
        config.save(&paths).unwrap();

        clone
    }

    fn shared(&self) -> SharedGraph {
        SharedGraph::open(&self.graph_path()).unwrap()
    }
}

struct CloneRepo {
    path: PathBuf,
}

impl CloneRepo {
    fn git(&self) -> Git {
        Git::open(&self.path).expect("failed to open clone")
    }

    fn id(&self) -> RepoId {
        identity::get_or_create(&self.git()).unwrap()
    }

    fn stage(&self, file: &str, content: &str) {
        std::fs::write(self.path.join(file), content).unwrap();
        run_git(&self.path, &["add", file]);
    }

    /// Stage a file and drive it through the full gate: pre-commit,
    /// commit, post-commit. Returns the new head on success.
    fn gated_commit(&self, file: &str, content: &str, message: &str) -> Result<Oid, GateError> {
        self.stage(file, content);
        hooks::pre_commit(&self.path)?;
        run_git(&self.path, &["commit", "-m", message]);
        hooks::post_commit(&self.path)?;
        self.git().head_oid().map_err(GateError::from)
    }

    fn publish(&self) {
        sync::publish(&self.git(), &self.id(), "global-graph").unwrap();
    }

    /// Fast-forward the current branch onto another clone's published
    /// branch. Works from an unborn HEAD too.
    fn incorporate(&self, other: &RepoId, branch: &str) {
        let refname = format!("refs/heads/{}/{}", other, branch);
        run_git(&self.path, &["fetch", "global-graph", &refname]);

        let unborn = self.git().head_oid().is_err();
        if unborn {
            run_git(&self.path, &["reset", "--hard", "FETCH_HEAD"]);
        } else {
            run_git(&self.path, &["merge", "--ff-only", "FETCH_HEAD"]);
        }
    }
}

fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

// =============================================================================
// Identity
// =============================================================================

#[test]
fn identity_is_created_once_and_persists() {
    let world = World::new();
    let clone = world.clone_repo("a", "Alice Tester", "closure");

    let first = clone.id();
    let second = clone.id();
    assert_eq!(first, second);

    assert!(first.as_str().starts_with("alicetester_"));

    let stored = clone.git().config_string("gate.repoid").unwrap();
    assert_eq!(stored.as_deref(), Some(first.as_str()));
}

#[test]
fn identities_differ_between_clones_of_the_same_user() {
    let world = World::new();
    let a = world.clone_repo("a", "Alice Tester", "closure");
    let b = world.clone_repo("b", "Alice Tester", "closure");

    assert_ne!(a.id(), b.id());
}

// =============================================================================
// Publication
// =============================================================================

#[test]
fn publish_mirrors_branches_under_the_namespace() {
    let world = World::new();
    let clone = world.clone_repo("a", "Alice Tester", "closure");

    let head = clone.gated_commit("a.txt", "one", "base").unwrap();

    let id = clone.id();
    let shared = world.shared();
    let refname = format!("refs/heads/{}/main", id);
    let published = shared.git().resolve_ref(&refname).unwrap();
    assert_eq!(published, head);
}

#[test]
fn republish_is_idempotent() {
    let world = World::new();
    let clone = world.clone_repo("a", "Alice Tester", "closure");

    clone.gated_commit("a.txt", "one", "base").unwrap();
    clone.publish();
    clone.publish();
}

#[test]
fn publish_with_no_branches_succeeds() {
    let world = World::new();
    let clone = world.clone_repo("a", "Alice Tester", "closure");

    let count = sync::publish(&clone.git(), &clone.id(), "global-graph").unwrap();
    assert_eq!(count, 0);
}

#[test]
fn published_refs_list_with_the_prefix_stripped() {
    let world = World::new();
    let clone = world.clone_repo("a", "Alice Tester", "closure");

    let head = clone.gated_commit("a.txt", "one", "base").unwrap();

    let refs = world
        .shared()
        .git()
        .list_refs_by_prefix("refs/heads/")
        .unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].name, format!("{}/main", clone.id()));
    assert_eq!(refs[0].oid, head);
}

// =============================================================================
// Admission
// =============================================================================

#[test]
fn first_commit_into_an_empty_graph_is_admitted() {
    let world = World::new();
    let clone = world.clone_repo("a", "Alice Tester", "all-branches");

    assert!(clone.gated_commit("model.fbx", "v1", "add model").is_ok());
}

#[test]
fn unborn_head_reads_as_no_commit() {
    let world = World::new();
    let clone = world.clone_repo("a", "Alice Tester", "closure");

    // A fresh clone has a branch name but no head commit yet; the gate
    // must see "no commit", not an error.
    assert!(clone.git().try_head_oid().unwrap().is_none());

    let head = clone.gated_commit("a.txt", "one", "base").unwrap();
    assert_eq!(clone.git().try_head_oid().unwrap(), Some(head));
}

#[test]
fn unrelated_files_do_not_conflict() {
    let world = World::new();
    let a = world.clone_repo("a", "Alice Tester", "all-branches");
    let b = world.clone_repo("b", "Bob Tester", "all-branches");

    a.gated_commit("a.txt", "base", "base").unwrap();
    b.incorporate(&a.id(), "main");
    b.publish();

    a.gated_commit("model.fbx", "v1", "alice model").unwrap();

    // Bob touches a different file; Alice's model commit is irrelevant.
    assert!(b.gated_commit("texture.png", "v1", "bob texture").is_ok());
}

#[test]
fn racing_commit_on_the_same_file_is_vetoed() {
    let world = World::new();
    let a = world.clone_repo("a", "Alice Tester", "all-branches");
    let b = world.clone_repo("b", "Bob Tester", "all-branches");

    a.gated_commit("a.txt", "base", "base").unwrap();
    b.incorporate(&a.id(), "main");
    b.publish();

    let alice_commit = a.gated_commit("model.fbx", "v1", "alice model").unwrap();

    let result = b.gated_commit("model.fbx", "v2", "bob model");
    match result {
        Err(GateError::ConflictingCommit { commit, branch }) => {
            assert_eq!(commit, alice_commit);
            assert!(branch.as_str().starts_with(a.id().as_str()));
        }
        other => panic!("expected ConflictingCommit, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn incorporating_the_conflict_unblocks_the_commit() {
    let world = World::new();
    let a = world.clone_repo("a", "Alice Tester", "all-branches");
    let b = world.clone_repo("b", "Bob Tester", "all-branches");

    a.gated_commit("a.txt", "base", "base").unwrap();
    b.incorporate(&a.id(), "main");
    b.publish();

    a.gated_commit("model.fbx", "v1", "alice model").unwrap();

    b.stage("model.fbx", "v2");
    assert!(hooks::pre_commit(&b.path).is_err());

    // Throw away the attempt, pull Alice's commit, retry.
    run_git(&b.path, &["reset", "--hard", "HEAD"]);
    b.incorporate(&a.id(), "main");
    b.publish();

    assert!(b.gated_commit("model.fbx", "v3", "bob model").is_ok());
}

#[test]
fn unpublished_branch_with_a_conflict_is_branch_invalid() {
    let world = World::new();
    let a = world.clone_repo("a", "Alice Tester", "all-branches");
    let b = world.clone_repo("b", "Bob Tester", "all-branches");

    let alice_commit = a.gated_commit("model.fbx", "v1", "alice model").unwrap();

    // Bob's very first commit touches the same file without any shared
    // history; descent cannot be established at all.
    b.stage("model.fbx", "v2");
    let result = hooks::pre_commit(&b.path);
    match result {
        Err(GateError::BranchInvalid { commit, .. }) => {
            assert_eq!(commit, alice_commit);
        }
        other => panic!("expected BranchInvalid, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn closure_policy_ignores_undeclared_branches() {
    let world = World::new();
    let a = world.clone_repo("a", "Alice Tester", "closure");
    let b = world.clone_repo("b", "Bob Tester", "closure");

    a.gated_commit("a.txt", "base", "base").unwrap();
    b.incorporate(&a.id(), "main");
    b.publish();

    a.gated_commit("model.fbx", "v1", "alice model").unwrap();

    // No dependency edge between the branches: independent by default.
    assert!(b.gated_commit("model.fbx", "v2", "bob model").is_ok());
}

#[test]
fn closure_policy_checks_declared_dependencies() {
    let world = World::new();
    let a = world.clone_repo("a", "Alice Tester", "closure");
    let b = world.clone_repo("b", "Bob Tester", "closure");

    a.gated_commit("a.txt", "base", "base").unwrap();
    b.incorporate(&a.id(), "main");
    b.publish();

    let alice_main =
        gitgate::core::types::GlobalBranchName::parse(format!("{}/main", a.id())).unwrap();
    let bob_main =
        gitgate::core::types::GlobalBranchName::parse(format!("{}/main", b.id())).unwrap();
    world
        .shared()
        .dependencies()
        .update(|deps| {
            deps.will_merge_into(alice_main.clone(), bob_main.clone());
        })
        .unwrap();

    let alice_commit = a.gated_commit("model.fbx", "v1", "alice model").unwrap();

    let result = b.gated_commit("model.fbx", "v2", "bob model");
    match result {
        Err(GateError::ConflictingCommit { commit, .. }) => {
            assert_eq!(commit, alice_commit);
        }
        other => panic!("expected ConflictingCommit, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn reverted_commit_stops_counting_against_others() {
    let world = World::new();
    let a = world.clone_repo("a", "Alice Tester", "all-branches");
    let b = world.clone_repo("b", "Bob Tester", "all-branches");

    a.gated_commit("a.txt", "base", "base").unwrap();
    b.incorporate(&a.id(), "main");
    b.publish();

    let alice_commit = a.gated_commit("model.fbx", "v1", "alice model").unwrap();

    // Team decision: Alice's model change is abandoned.
    world.shared().marks().mark_revert(&alice_commit).unwrap();

    assert!(b.gated_commit("model.fbx", "v2", "bob model").is_ok());
}

#[test]
fn divergent_mark_exempts_separated_subgraphs() {
    let world = World::new();
    let a = world.clone_repo("a", "Alice Tester", "all-branches");
    let b = world.clone_repo("b", "Bob Tester", "all-branches");

    // Both start from the same base, then Bob's line is declared an
    // accepted fork: Alice's later commits on the base side no longer
    // apply to him.
    a.gated_commit("a.txt", "base", "base").unwrap();
    b.incorporate(&a.id(), "main");

    let fork = b.gated_commit("fork.txt", "fork", "fork point").unwrap();
    world.shared().marks().mark_divergent(&fork).unwrap();

    a.gated_commit("model.fbx", "v1", "alice model").unwrap();

    // Bob's history contains the divergence mark, Alice's does not.
    assert!(b.gated_commit("model.fbx", "v2", "bob model").is_ok());
}

#[test]
fn nothing_staged_is_admitted() {
    let world = World::new();
    let a = world.clone_repo("a", "Alice Tester", "all-branches");
    let b = world.clone_repo("b", "Bob Tester", "all-branches");

    a.gated_commit("model.fbx", "v1", "alice model").unwrap();

    b.incorporate(&a.id(), "main");
    b.publish();
    assert!(hooks::pre_commit(&b.path).is_ok());
}

#[test]
fn missing_configuration_fails_with_a_hint() {
    let dir = TempDir::new().unwrap();
    run_git(dir.path(), &["init", "-b", "main"]);
    run_git(dir.path(), &["config", "user.email", "test@example.com"]);
    run_git(dir.path(), &["config", "user.name", "Test User"]);

    let result = hooks::pre_commit(dir.path());
    match result {
        Err(GateError::Config(e)) => {
            assert!(e.to_string().contains("gg init"));
        }
        other => panic!("expected Config error, got {:?}", other.map(|_| ())),
    }
}
