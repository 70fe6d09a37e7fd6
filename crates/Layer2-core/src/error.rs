//! Engine error types
//!
//! Write-path failures (commit, revert) surface to the caller; read paths
//! (history assembly, analytics) degrade to defaults instead of using these.

use crate::git::GitError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Backend status shows nothing to record. Non-fatal by contract: callers
    /// treat this as "nothing to commit", not an application error.
    #[error("No changes to commit")]
    NoChangesToCommit,

    #[error("Commit failed: {0}")]
    CommitFailed(String),

    #[error("Revert blocked: {}", .0.join("; "))]
    RevertBlocked(Vec<String>),

    #[error("Revert failed: {0}")]
    RevertFailed(String),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Foundation(#[from] chattrace_foundation::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
