//! cli::commands
//!
//! Command handlers. Each handler opens what it needs, delegates to the
//! library layers, and prints a short human-readable result.

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::cli::args::Command;
use crate::core::config::{Config, DEFAULT_REMOTE};
use crate::core::graph::DependencyGraph;
use crate::core::lock::GraphLock;
use crate::core::naming::global_branch;
use crate::core::paths::GatePaths;
use crate::core::shared::SharedGraph;
use crate::core::types::{BranchName, GlobalBranchName, RepoId};
use crate::engine::Policy;
use crate::git::Git;
use crate::hooks;
use crate::identity;
use crate::sync;

/// Execution context derived from global CLI flags.
pub struct Context {
    /// Directory to run in (defaults to the process cwd).
    pub cwd: PathBuf,
    /// Suppress informational output.
    pub quiet: bool,
}

/// Dispatch a parsed command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Init {
            graph,
            policy,
            remote,
        } => init(ctx, graph, policy, remote),
        Command::PreCommit => Ok(hooks::pre_commit(&ctx.cwd)?),
        Command::PostCommit => Ok(hooks::post_commit(&ctx.cwd)?),
        Command::Sync => sync_now(ctx),
        Command::Id => print_id(ctx),
        Command::Merges { provider, consumer } => edit_deps(ctx, &provider, &consumer, true),
        Command::Unmerges { provider, consumer } => edit_deps(ctx, &provider, &consumer, false),
        Command::Deps { branch } => show_deps(ctx, branch.as_deref()),
        Command::Divergent { commit } => mark(ctx, &commit, Mark::Divergent),
        Command::Reverted { commit } => mark(ctx, &commit, Mark::Revert),
    }
}

fn init(
    ctx: &Context,
    graph: PathBuf,
    policy: Option<String>,
    remote: Option<String>,
) -> Result<()> {
    let git = Git::open(&ctx.cwd)?;
    let repo_id = identity::get_or_create(&git)?;

    let policy = policy.unwrap_or_else(|| Policy::default().as_str().to_string());
    Policy::parse(&policy)
        .with_context(|| format!("unknown policy '{}' (expected 'closure' or 'all-branches')", policy))?;

    let remote = remote.unwrap_or_else(|| DEFAULT_REMOTE.to_string());

    let paths = GatePaths::from_repo_info(&git.info());
    let mut config = Config::load(&paths)?;
    config.repo.graph_path = Some(graph.clone());
    config.repo.policy = policy;
    config.repo.remote = remote.clone();
    config.save(&paths)?;

    let url = graph.to_string_lossy();
    git.ensure_remote(&remote, &url)?;

    if !ctx.quiet {
        println!("configured shared graph: {}", graph.display());
        println!("repository id: {}", repo_id);
    }
    Ok(())
}

fn sync_now(ctx: &Context) -> Result<()> {
    let git = Git::open(&ctx.cwd)?;
    let repo_id = identity::get_or_create(&git)?;

    let paths = GatePaths::from_repo_info(&git.info());
    let config = Config::load(&paths)?;

    let count = sync::publish(&git, &repo_id, config.remote())?;
    if !ctx.quiet {
        println!("published {} branch(es)", count);
    }
    Ok(())
}

fn print_id(ctx: &Context) -> Result<()> {
    let git = Git::open(&ctx.cwd)?;
    let repo_id = identity::get_or_create(&git)?;
    println!("{}", repo_id);
    Ok(())
}

/// Resolve a branch argument to a global name. A name without `/` is one
/// of this clone's own branches; anything else is already global.
fn resolve_branch(repo_id: &RepoId, name: &str) -> Result<GlobalBranchName> {
    if name.contains('/') {
        GlobalBranchName::parse(name)
            .with_context(|| format!("'{}' is not a valid <repo-id>/<branch> name", name))
    } else {
        let local = BranchName::new(name)
            .with_context(|| format!("'{}' is not a valid branch name", name))?;
        Ok(global_branch(repo_id, &local))
    }
}

fn edit_deps(ctx: &Context, provider: &str, consumer: &str, add: bool) -> Result<()> {
    let git = Git::open(&ctx.cwd)?;
    let repo_id = identity::get_or_create(&git)?;

    let provider = resolve_branch(&repo_id, provider)?;
    let consumer = resolve_branch(&repo_id, consumer)?;

    let paths = GatePaths::from_repo_info(&git.info());
    let config = Config::load(&paths)?;
    let graph_path = config.graph_path()?;

    let _lock = GraphLock::acquire(graph_path)?;
    let shared = SharedGraph::open(graph_path)?;
    shared.dependencies().update(|deps| {
        if add {
            deps.will_merge_into(consumer.clone(), provider.clone());
        } else {
            deps.will_not_merge_into(&consumer, &provider);
        }
    })?;

    if !ctx.quiet {
        if add {
            println!("{} will merge into {}", provider, consumer);
        } else {
            println!("{} will not merge into {}", provider, consumer);
        }
    }
    Ok(())
}

fn show_deps(ctx: &Context, branch: Option<&str>) -> Result<()> {
    let git = Git::open(&ctx.cwd)?;
    let repo_id = identity::get_or_create(&git)?;

    let paths = GatePaths::from_repo_info(&git.info());
    let config = Config::load(&paths)?;
    let graph_path = config.graph_path()?;

    let shared = SharedGraph::open(graph_path)?;
    let deps: DependencyGraph = shared.load_dependencies()?;

    let filter = match branch {
        Some(name) => Some(resolve_branch(&repo_id, name)?),
        None => None,
    };

    let mut any = false;
    for (consumer, providers) in deps.edges() {
        for provider in providers {
            if let Some(f) = &filter {
                if provider != f && consumer != f {
                    continue;
                }
            }
            println!("{} -> {}", provider, consumer);
            any = true;
        }
    }

    if !any && !ctx.quiet {
        println!("no declared merge relationships");
    }
    Ok(())
}

enum Mark {
    Divergent,
    Revert,
}

fn mark(ctx: &Context, commit: &str, kind: Mark) -> Result<()> {
    let git = Git::open(&ctx.cwd)?;
    let repo_id = identity::get_or_create(&git)?;

    let oid = git
        .rev_parse(commit)
        .with_context(|| format!("cannot resolve '{}' to a commit", commit))?;

    let paths = GatePaths::from_repo_info(&git.info());
    let config = Config::load(&paths)?;
    let graph_path = config.graph_path()?;

    let _lock = GraphLock::acquire(graph_path)?;

    // Publish first so the marked commit exists in the shared graph.
    sync::publish(&git, &repo_id, config.remote())?;

    let shared = SharedGraph::open(graph_path)?;
    let marks = shared.marks();
    match kind {
        Mark::Divergent => {
            marks.mark_divergent(&oid)?;
            if !ctx.quiet {
                println!("marked {} as divergent", oid.short(12));
            }
        }
        Mark::Revert => {
            marks.mark_revert(&oid)?;
            if !ctx.quiet {
                println!("marked {} as reverted", oid.short(12));
            }
        }
    }
    Ok(())
}
