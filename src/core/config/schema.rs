//! core::config::schema
//!
//! Configuration file schema.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default name of the push remote pointing at the shared graph.
pub const DEFAULT_REMOTE: &str = "global-graph";

/// Repository configuration, `<common_dir>/gitgate/config.toml`.
///
/// # Example
///
/// ```toml
/// graph_path = "/srv/shared-graph.git"
/// remote = "global-graph"
/// policy = "closure"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoConfig {
    /// Filesystem path of the shared graph repository.
    ///
    /// Required for admission checks and for writing marks/dependencies;
    /// publishing alone only needs the remote.
    #[serde(default)]
    pub graph_path: Option<PathBuf>,

    /// Name of the remote the synchronizer pushes to.
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Conflict-search policy: `closure` or `all-branches`.
    #[serde(default = "default_policy")]
    pub policy: String,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            graph_path: None,
            remote: default_remote(),
            policy: default_policy(),
        }
    }
}

fn default_remote() -> String {
    DEFAULT_REMOTE.to_string()
}

fn default_policy() -> String {
    "closure".to_string()
}
