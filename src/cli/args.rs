//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// gitgate - optimistic concurrency control for non-mergeable files
#[derive(Parser, Debug)]
#[command(name = "gg")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if gg was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Configure this clone to use a shared graph
    #[command(
        name = "init",
        long_about = "Configure this clone to use a shared graph.\n\n\
            Records the shared graph's filesystem path, creates the push \
            remote pointing at it, and assigns this clone its repository \
            identity if it does not have one yet.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Point this clone at the team's shared graph
    gg init --graph /srv/shared-graph.git

    # Use the wider all-branches conflict search
    gg init --graph /srv/shared-graph.git --policy all-branches"
    )]
    Init {
        /// Filesystem path of the shared graph repository
        #[arg(long)]
        graph: PathBuf,

        /// Conflict-search policy: closure (default) or all-branches
        #[arg(long)]
        policy: Option<String>,

        /// Name of the push remote to create
        #[arg(long)]
        remote: Option<String>,
    },

    /// Run the pre-commit admission check (invoked from the git hook)
    #[command(name = "pre-commit")]
    PreCommit,

    /// Republish branches after a commit (invoked from the git hook)
    #[command(name = "post-commit")]
    PostCommit,

    /// Publish all local branches to the shared graph now
    #[command(name = "sync")]
    Sync,

    /// Print this clone's repository identity
    #[command(name = "id")]
    Id,

    /// Declare that one branch will be merged into another
    #[command(
        name = "merges",
        long_about = "Declare that PROVIDER will eventually be merged into \
            CONSUMER.\n\n\
            Declared edges scope the default conflict search: only branches \
            connected to yours through merge intent are checked. Bare branch \
            names refer to this clone's own branches; use the full \
            `<repo-id>/<branch>` form for another clone's branch."
    )]
    Merges {
        /// The branch that will be merged (bare or <repo-id>/<branch>)
        provider: String,

        /// The branch it will be merged into
        consumer: String,
    },

    /// Retract a declared merge relationship
    #[command(name = "unmerges")]
    Unmerges {
        /// The branch previously declared as merging
        provider: String,

        /// The branch it was declared to merge into
        consumer: String,
    },

    /// Show declared merge relationships
    #[command(name = "deps")]
    Deps {
        /// Show only edges touching this branch
        branch: Option<String>,
    },

    /// Mark a commit as an accepted fork point
    #[command(
        name = "divergent",
        long_about = "Mark a commit as an accepted point of divergence.\n\n\
            Under the all-branches policy, branches whose histories sit on \
            opposite sides of a divergence mark are exempted from each \
            other's conflict checks."
    )]
    Divergent {
        /// The commit to mark (hash, refname, or revision expression)
        commit: String,
    },

    /// Mark a commit as a history boundary
    #[command(
        name = "reverted",
        long_about = "Mark a commit as a history boundary.\n\n\
            Conflict searches walking back through history stop at a \
            reverted commit: changes at or before it no longer count \
            against other branches."
    )]
    Reverted {
        /// The commit to mark (hash, refname, or revision expression)
        commit: String,
    },
}
