//! identity
//!
//! Repository identity registry.
//!
//! Every clone gets one globally unique, immutable id, stored in the
//! clone's git config under `gate.repoid`. The id is built for
//! readability (`{user}_{host}_{10 hex digits}`), so a conflicting
//! branch name in an error message tells a human whose clone it is.
//! Uniqueness rests on the random suffix and the negligible chance of
//! an intra-team collision; this is explicitly not a cryptographic
//! guarantee.

use log::info;
use thiserror::Error;

use crate::core::naming::sanitize_user_name;
use crate::core::types::{RepoId, TypeError};
use crate::git::{Git, GitError};

/// Git config key holding the clone's repository id.
pub const REPO_ID_KEY: &str = "gate.repoid";

/// Errors from identity operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// No usable `user.name` in git config to derive an id from.
    #[error("no user name configured; set `git config user.name` first")]
    UnconfiguredIdentity,

    /// A stored id failed validation.
    #[error("stored repository id is invalid: {0}")]
    InvalidStored(#[from] TypeError),

    /// Git configuration access failed.
    #[error("git error: {0}")]
    Git(#[from] GitError),
}

/// Get this clone's repository id, creating and persisting it on first
/// use. Idempotent after creation: the stored id is immutable.
///
/// # Errors
///
/// - [`IdentityError::UnconfiguredIdentity`] if `user.name` is absent or
///   sanitizes to nothing
pub fn get_or_create(git: &Git) -> Result<RepoId, IdentityError> {
    if let Some(existing) = git.config_string(REPO_ID_KEY)? {
        return Ok(RepoId::new(existing)?);
    }

    let id = generate(git)?;
    git.set_config_string(REPO_ID_KEY, id.as_str())?;
    info!("assigned repository id [{}]", id);

    Ok(id)
}

/// Derive a fresh repository id from the configured user name, the
/// machine name, and a random suffix.
fn generate(git: &Git) -> Result<RepoId, IdentityError> {
    let user = git
        .config_string("user.name")?
        .ok_or(IdentityError::UnconfiguredIdentity)?;

    let user = sanitize_user_name(&user);
    if user.is_empty() {
        return Err(IdentityError::UnconfiguredIdentity);
    }

    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .map(|h| sanitize_user_name(&h))
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknownhost".to_string());

    let suffix = random_suffix();

    let id = format!("{}_{}_{}", user, host, suffix).to_lowercase();
    Ok(RepoId::new(id)?)
}

/// Ten hex digits of a v4 UUID.
fn random_suffix() -> String {
    let bytes = uuid::Uuid::new_v4();
    let mut hex = hex::encode(bytes.as_bytes());
    hex.truncate(10);
    hex
}
