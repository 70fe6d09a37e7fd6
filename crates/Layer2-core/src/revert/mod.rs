//! Revert Engine
//!
//! Two-phase rollback over a conversation's commit list: a read-only safety
//! preview, then (on approval) a destructive hard reset. The reset loses any
//! uncommitted work, which is exactly why the preview gate exists.

use crate::correlate::{CommitCorrelator, ConversationCommit};
use crate::error::{EngineError, Result};
use crate::git::RepoLock;
use chattrace_foundation::ConversationStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// A proposed rollback, not yet applied. Ephemeral: computed per call.
#[derive(Debug, Clone)]
pub struct RevertPreview {
    /// Rollback target, present only when a target could be selected
    pub target_commit: Option<ConversationCommit>,

    /// Actual distance from HEAD to the target in conversational steps
    pub steps_to_revert: usize,

    /// Files touched between the target commit and HEAD
    pub affected_files: Vec<String>,

    /// Human-readable safety warnings, returned verbatim on block
    pub safety_warnings: Vec<String>,

    /// Whether the rollback may proceed
    pub can_revert: bool,
}

/// Result of an applied rollback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevertOutcome {
    pub reverted_to: String,
    pub steps_reverted: usize,
    pub message: String,
}

/// Zero-based target index into the oldest-first commit list
///
/// `steps_back = 1` against N commits selects the most recent commit. The
/// arithmetic is kept exactly as specified by the message-processing flow
/// this engine replaces.
pub fn revert_target_index(commit_count: usize, steps_back: usize) -> usize {
    commit_count.saturating_sub(steps_back)
}

/// Revert engine over one repository and its conversation store
pub struct RevertEngine {
    correlator: Arc<CommitCorrelator>,
    store: Arc<ConversationStore>,
    lock: RepoLock,
    /// Affected-file count above which the preview warns
    file_warning_threshold: usize,
}

impl RevertEngine {
    pub fn new(
        correlator: Arc<CommitCorrelator>,
        store: Arc<ConversationStore>,
        lock: RepoLock,
        file_warning_threshold: usize,
    ) -> Self {
        Self {
            correlator,
            store,
            lock,
            file_warning_threshold,
        }
    }

    /// Compute a safety-checked preview of rolling back `steps_back` steps
    ///
    /// Never mutates the repository.
    pub async fn preview_revert(
        &self,
        conversation_id: &str,
        steps_back: usize,
    ) -> Result<RevertPreview> {
        let commits = self.correlator.conversation_commits(conversation_id).await?;

        if commits.is_empty() {
            return Ok(RevertPreview {
                target_commit: None,
                steps_to_revert: 0,
                affected_files: Vec::new(),
                safety_warnings: vec!["No commit history for this conversation".to_string()],
                can_revert: false,
            });
        }

        if steps_back == 0 {
            return Ok(RevertPreview {
                target_commit: None,
                steps_to_revert: 0,
                affected_files: Vec::new(),
                safety_warnings: vec!["Steps to revert must be at least 1".to_string()],
                can_revert: false,
            });
        }

        if steps_back > commits.len() {
            return Ok(RevertPreview {
                target_commit: None,
                steps_to_revert: 0,
                affected_files: Vec::new(),
                safety_warnings: vec![format!(
                    "Cannot revert {} steps, only {} commits available",
                    steps_back,
                    commits.len()
                )],
                can_revert: false,
            });
        }

        let target_index = revert_target_index(commits.len(), steps_back);
        let target = commits[target_index].clone();
        let steps_to_revert = commits.len() - target_index;

        let git = self.correlator.git();
        let affected_files = git.diff_files(&target.hash, "HEAD").await?;

        let mut safety_warnings = Vec::new();
        let mut can_revert = true;

        if affected_files.len() > self.file_warning_threshold {
            safety_warnings.push(format!(
                "{} files would be affected by this revert",
                affected_files.len()
            ));
        }

        let status = git.status().await?;
        if !status.is_clean() {
            safety_warnings
                .push("Working tree has uncommitted changes that would be lost".to_string());
            can_revert = false;
        }

        Ok(RevertPreview {
            target_commit: Some(target),
            steps_to_revert,
            affected_files,
            safety_warnings,
            can_revert,
        })
    }

    /// Roll the working tree back `steps_back` conversational steps
    ///
    /// Re-runs the preview and refuses before any mutation when blocked. The
    /// reset is irreversible by this engine; on reset failure the repository
    /// state should be assumed possibly inconsistent.
    pub async fn revert_to_step(
        &self,
        conversation_id: &str,
        steps_back: usize,
    ) -> Result<RevertOutcome> {
        let _guard = self.lock.lock().await;

        let preview = self.preview_revert(conversation_id, steps_back).await?;
        if !preview.can_revert {
            warn!(
                conversation_id = %conversation_id,
                warnings = ?preview.safety_warnings,
                "Revert blocked by safety preview"
            );
            return Err(EngineError::RevertBlocked(preview.safety_warnings));
        }

        // can_revert is never true without a selected target
        let target = preview
            .target_commit
            .ok_or_else(|| EngineError::RevertFailed("Preview selected no target".to_string()))?;

        self.correlator
            .git()
            .reset_hard(&target.hash)
            .await
            .map_err(|e| EngineError::RevertFailed(e.to_string()))?;

        let message = format!(
            "Reverted {} step(s) back to commit {} ({})",
            preview.steps_to_revert, target.short_hash, target.subject
        );

        // Audit trail in the conversation store
        self.store
            .save_message(conversation_id, "system", &message, None, None)?;

        info!(
            conversation_id = %conversation_id,
            target = %target.short_hash,
            steps = preview.steps_to_revert,
            "Revert applied"
        );

        Ok(RevertOutcome {
            reverted_to: target.short_hash,
            steps_reverted: preview.steps_to_revert,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revert_target_index_selects_from_end() {
        // Oldest-first list of 3 commits: one step back targets the newest.
        assert_eq!(revert_target_index(3, 1), 2);
        assert_eq!(revert_target_index(3, 2), 1);
        assert_eq!(revert_target_index(3, 3), 0);
    }

    #[test]
    fn test_revert_target_index_saturates_at_zero() {
        assert_eq!(revert_target_index(2, 5), 0);
        assert_eq!(revert_target_index(0, 1), 0);
    }
}
