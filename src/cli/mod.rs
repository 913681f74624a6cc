//! cli
//!
//! Command-line interface layer for gitgate.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Delegate to command handlers
//! - Does NOT mutate repositories directly
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to
//! the library layers (hooks, sync, stores) for execution.

pub mod args;
pub mod commands;

pub use args::Cli;

use anyhow::Result;

/// Run an already-parsed invocation.
///
/// This is the main entry point called from `main.rs`, which parses
/// first so logging can honor the global flags.
pub fn run_parsed(cli: Cli) -> Result<()> {
    let cwd = match cli.cwd.clone() {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    let ctx = commands::Context {
        cwd,
        quiet: cli.quiet,
    };

    commands::dispatch(cli.command, &ctx)
}
