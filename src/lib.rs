//! gitgate - optimistic concurrency control for non-mergeable files.
//!
//! gitgate lets a team share binary or otherwise non-mergeable files
//! across ordinary git clones without pessimistic locking. Every clone
//! publishes its branches into a shared commit graph under its own
//! namespace; a pre-commit hook then admits a commit only if, for every
//! file it touches, the most recent commit touching that file on every
//! related branch is already an ancestor of the committer's head. The
//! losing side of a race incorporates the other's commit and retries,
//! exactly as with textual conflicts, just detected at commit time
//! instead of merge time.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates)
//! - [`hooks`] - The pre-commit gate and post-commit republish
//! - [`engine`] - The admission decision over an abstract commit graph
//! - [`sync`] - Branch publication into the shared graph
//! - [`identity`] - Per-clone repository identity
//! - [`core`] - Domain types, dependency graph, stores, config, locking
//! - [`git`] - Single interface for all Git operations
//!
//! # Correctness Invariants
//!
//! 1. Admission decisions are only made against a freshly published graph
//! 2. Check and publish run under one exclusive lock per shared graph
//! 3. Each clone writes only its own namespace in the shared graph
//! 4. A veto always names the conflicting commit and branch

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod hooks;
pub mod identity;
pub mod sync;
