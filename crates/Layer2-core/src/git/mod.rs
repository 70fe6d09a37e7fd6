//! Git Backend Module
//!
//! Async wrapper over the version-control backend. Only the capabilities the
//! engine consumes are exposed: status, add, commit, log, reset, branch and
//! name-only diffs.

pub mod ops;

use std::sync::Arc;
use tokio::sync::Mutex;

pub use ops::{
    FileStatus, GitError, GitOps, GitStatus, LogEntry, LogOptions, DEFAULT_GIT_TIMEOUT,
};

/// Per-repository lock guarding staging/commit/reset critical sections
///
/// Shared between the commit correlator and the revert engine for the same
/// repository. Concurrent mutations against one working tree are unsafe
/// without it.
pub type RepoLock = Arc<Mutex<()>>;

/// Create a fresh repository lock
pub fn repo_lock() -> RepoLock {
    Arc::new(Mutex::new(()))
}
