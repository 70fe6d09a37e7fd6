//! Commit Correlation Engine
//!
//! Turns a (conversation, message, request, response, files, AI-metadata)
//! tuple into one commit whose message encodes all correlation metadata, and
//! answers conversation-scoped history queries over the backend log.

use super::message::{
    build_commit_message, build_subject, build_summary, build_trailers, infer_change_type,
    ChangeType, AI_AUTHOR_EMAIL, AI_AUTHOR_NAME, AI_SUBJECT_PREFIX, TRAILER_CONVERSATION_ID,
};
use crate::error::{EngineError, Result};
use crate::git::{GitOps, LogOptions, RepoLock};
use chattrace_foundation::AiMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Input for one correlated commit
#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub conversation_id: String,
    pub message_id: String,
    pub user_request: String,
    pub ai_response: String,
    /// Files to stage; empty means stage everything pending
    pub files_changed: Vec<String>,
    pub metadata: AiMetadata,
}

/// Result of a successful correlated commit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub commit_hash: String,
    pub short_hash: String,
    pub message: String,
    pub files_changed: Vec<String>,
    pub change_type: ChangeType,
    pub timestamp: DateTime<Utc>,
}

/// One commit belonging to a conversation, oldest-first in query results
#[derive(Debug, Clone)]
pub struct ConversationCommit {
    pub hash: String,
    pub short_hash: String,
    pub subject: String,
    pub timestamp: DateTime<Utc>,
}

/// Commit correlation engine over one repository
pub struct CommitCorrelator {
    git: GitOps,
    lock: RepoLock,
    /// Truncation bound for the AI-response trailer
    response_max_len: usize,
}

impl CommitCorrelator {
    pub fn new(git: GitOps, lock: RepoLock, response_max_len: usize) -> Self {
        Self {
            git,
            lock,
            response_max_len,
        }
    }

    pub fn git(&self) -> &GitOps {
        &self.git
    }

    /// Stage and commit one AI-applied change with correlation trailers
    ///
    /// Fails with `NoChangesToCommit` when the working tree has nothing
    /// pending; callers treat that as "nothing to record".
    pub async fn create_commit(&self, request: &CommitRequest) -> Result<CommitOutcome> {
        let _guard = self.lock.lock().await;

        let status = self.git.status().await?;
        if !status.has_pending_changes() {
            debug!(
                conversation_id = %request.conversation_id,
                "No modified or untracked files, skipping commit"
            );
            return Err(EngineError::NoChangesToCommit);
        }

        // Stage exactly the requested files when given, else everything
        if request.files_changed.is_empty() {
            self.git.add_all().await?;
        } else {
            let paths: Vec<&str> = request.files_changed.iter().map(|s| s.as_str()).collect();
            self.git.add(&paths).await?;
        }

        let change_type = infer_change_type(&request.user_request);
        let summary = build_summary(&request.user_request, &request.files_changed);
        let subject = build_subject(&request.conversation_id, change_type, &summary);
        let trailers = build_trailers(
            &request.conversation_id,
            &request.message_id,
            &request.user_request,
            &request.ai_response,
            &request.metadata.model,
            request.metadata.confidence,
            request.metadata.processing_time_ms,
            &request.files_changed,
            self.response_max_len,
        );
        let message = build_commit_message(&subject, &trailers);

        let commit_hash = self
            .git
            .commit(&message, AI_AUTHOR_NAME, AI_AUTHOR_EMAIL)
            .await
            .map_err(|e| EngineError::CommitFailed(e.to_string()))?;
        let short_hash = self
            .git
            .head_short()
            .await
            .map_err(|e| EngineError::CommitFailed(e.to_string()))?;

        info!(
            conversation_id = %request.conversation_id,
            commit = %short_hash,
            change_type = %change_type,
            "Created correlated commit"
        );

        Ok(CommitOutcome {
            commit_hash,
            short_hash,
            message,
            files_changed: request.files_changed.clone(),
            change_type,
            timestamp: Utc::now(),
        })
    }

    /// All commits tagged with a conversation id, oldest first
    ///
    /// The log grep is only a coarse prefilter: it also matches commits that
    /// merely quote the trailer line in free text, and ids that are a prefix
    /// of another id. Only entries whose subject names exactly this
    /// conversation are kept.
    ///
    /// An empty result is valid: a new conversation simply has no commits
    /// yet.
    pub async fn conversation_commits(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ConversationCommit>> {
        let grep = format!("{}: {}", TRAILER_CONVERSATION_ID, conversation_id);
        let subject_tag = format!("{}{}] ", AI_SUBJECT_PREFIX, conversation_id);
        let entries = self
            .git
            .log(&LogOptions {
                grep: Some(grep),
                reverse: true,
                max_count: None,
            })
            .await?;

        Ok(entries
            .into_iter()
            .filter(|e| e.subject().starts_with(&subject_tag))
            .map(|e| ConversationCommit {
                short_hash: e.short_hash.clone(),
                subject: e.subject().to_string(),
                timestamp: e.timestamp,
                hash: e.hash,
            })
            .collect())
    }
}
