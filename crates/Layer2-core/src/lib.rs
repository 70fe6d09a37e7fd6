//! chattrace-core: Conversation-to-Version-Control Correlation & Revert Engine
//!
//! Correlates AI-assisted editing turns with version-control commits so any
//! code change can be traced back to the request that produced it, and a
//! working tree can be safely rolled back to an earlier conversational state.
//!
//! # Modules
//!
//! - `git`: async backend wrapper (status, add, commit, log, reset, diff)
//! - `correlate`: commit wire format + the commit correlation engine
//! - `revert`: safety-checked preview and destructive rollback
//! - `history`: history assembly, caching, and live change tracking
//! - `analytics`: repository-wide trailer mining into typed records
//!
//! # Usage
//!
//! ```ignore
//! use chattrace_core::{
//!     repo_lock, CommitCorrelator, CommitRequest, ConversationTracker, GitOps, RevertEngine,
//! };
//! use chattrace_foundation::{ConversationStore, JsonStore, TraceConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = TraceConfig::load()?;
//! let git = GitOps::new(".")?
//!     .with_timeout(Duration::from_secs(config.git_timeout_secs));
//! let lock = repo_lock();
//! let store = Arc::new(ConversationStore::new(data_dir)?);
//!
//! let correlator = Arc::new(CommitCorrelator::new(
//!     git.clone(), lock.clone(), config.response_trailer_max_len,
//! ));
//! let revert = RevertEngine::new(
//!     correlator.clone(), store.clone(), lock.clone(),
//!     config.revert_file_warning_threshold,
//! );
//!
//! // On every AI-applied change:
//! let tracker = ConversationTracker::new(
//!     store, correlator, JsonStore::current_project()?,
//!     config.history_cache_limit, None,
//! );
//! let entry = tracker.track_conversation_change(request).await?;
//!
//! // On user request:
//! let preview = revert.preview_revert(&conversation_id, 2).await?;
//! if preview.can_revert {
//!     revert.revert_to_step(&conversation_id, 2).await?;
//! }
//! ```

pub mod analytics;
pub mod correlate;
pub mod error;
pub mod git;
pub mod history;
pub mod revert;

// Re-exports: Errors
pub use error::{EngineError, Result};

// Re-exports: Git backend
pub use git::{
    repo_lock, FileStatus, GitError, GitOps, GitStatus, LogEntry, LogOptions, RepoLock,
    DEFAULT_GIT_TIMEOUT,
};

// Re-exports: Commit correlation
pub use correlate::{
    infer_change_type, sanitize_text, ChangeType, CommitCorrelator, CommitOutcome, CommitRequest,
    ConversationCommit, AI_AUTHOR_NAME, AI_SUBJECT_PREFIX,
};

// Re-exports: Revert engine
pub use revert::{revert_target_index, RevertEngine, RevertOutcome, RevertPreview};

// Re-exports: History assembly
pub use history::{
    assemble_entries, estimate_code_changes, ChangeSink, CodeChanges, ConversationTracker,
    EmbeddedCommitMeta, GitCommitInfo, HistoryEntry, JsonChangeSink, HISTORY_CACHE_FILE,
};

// Re-exports: Analytics
pub use analytics::{extract_conversation_analytics, parse_commit_message, AnalyticsRecord};

// Layer1 re-exports
pub use chattrace_foundation::{AiMetadata, ConversationStore, JsonStore, TraceConfig};

/// Layer2 version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_wire_format_exports() {
        assert_eq!(infer_change_type("fix the bug").as_str(), "fix");
        assert!(AI_SUBJECT_PREFIX.starts_with("[AI-Chat-"));
    }
}
