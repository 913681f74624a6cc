//! core::config
//!
//! Configuration loading and saving.
//!
//! # Overview
//!
//! gitgate keeps one TOML file per clone at
//! `<common_dir>/gitgate/config.toml` (see [`crate::core::paths`]). The
//! file names the shared graph, the push remote, and the conflict-search
//! policy. The clone's repository identity is deliberately *not* here:
//! it lives in the git config key `gate.repoid` so that it survives the
//! gitgate directory being wiped and follows git's own config scoping.

pub mod schema;

pub use schema::{RepoConfig, DEFAULT_REMOTE};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::paths::GatePaths;
use crate::engine::Policy;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("not configured: run `gg init --graph <path>` first")]
    Missing,
}

/// Loaded configuration with typed accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// The raw schema values.
    pub repo: RepoConfig,
}

impl Config {
    /// Load configuration for a repository, or defaults if the file does
    /// not exist yet.
    pub fn load(paths: &GatePaths) -> Result<Self, ConfigError> {
        let path = paths.config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_file(&path)
    }

    /// Load configuration from an exact file path.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        let repo: RepoConfig = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(Self { repo })
    }

    /// Write the configuration to its canonical location.
    pub fn save(&self, paths: &GatePaths) -> Result<(), ConfigError> {
        let path = paths.config_path();

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| ConfigError::WriteError {
                path: path.clone(),
                source,
            })?;
        }

        let text = toml::to_string_pretty(&self.repo)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let mut file = fs::File::create(&path).map_err(|source| ConfigError::WriteError {
            path: path.clone(),
            source,
        })?;
        file.write_all(text.as_bytes())
            .map_err(|source| ConfigError::WriteError { path, source })?;

        Ok(())
    }

    /// The shared graph path; [`ConfigError::Missing`] if unset.
    pub fn graph_path(&self) -> Result<&Path, ConfigError> {
        self.repo
            .graph_path
            .as_deref()
            .ok_or(ConfigError::Missing)
    }

    /// The push remote name.
    pub fn remote(&self) -> &str {
        &self.repo.remote
    }

    /// The conflict-search policy.
    pub fn policy(&self) -> Result<Policy, ConfigError> {
        Policy::parse(&self.repo.policy).ok_or_else(|| {
            ConfigError::InvalidValue(format!(
                "unknown policy '{}' (expected 'closure' or 'all-branches')",
                self.repo.policy
            ))
        })
    }
}
