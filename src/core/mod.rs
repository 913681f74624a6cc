//! core
//!
//! Domain types and shared-graph plumbing.
//!
//! # Modules
//!
//! - [`types`] - Validated domain types (branch names, oids, repo ids)
//! - [`naming`] - Local-to-global namespace mapping
//! - [`graph`] - Dependency graph and the commit-graph query model
//! - [`store`] - Divergence marks and the dependency document
//! - [`shared`] - The shared graph opened as an admission data source
//! - [`config`] - Repository configuration
//! - [`paths`] - Storage path routing
//! - [`lock`] - The shared-graph critical section

pub mod config;
pub mod graph;
pub mod lock;
pub mod naming;
pub mod paths;
pub mod shared;
pub mod store;
pub mod types;
