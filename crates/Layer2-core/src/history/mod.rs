//! History Assembly
//!
//! Joins stored conversation messages with correlated commits into ordered
//! `HistoryEntry` records. Entries are cached in memory per conversation and
//! the most recent ones are persisted for warm restart.

use crate::correlate::{ChangeType, CommitCorrelator, CommitRequest};
use crate::error::Result;
use async_trait::async_trait;
use chattrace_foundation::{CommitLinkRecord, ConversationStore, JsonStore, MessageRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// Persisted cache file name (under the project JsonStore)
pub const HISTORY_CACHE_FILE: &str = "history_cache.json";

// Line counts are estimated from affected-file count, not real diff stats.
const LINES_ADDED_PER_FILE: i64 = 10;
const LINES_REMOVED_PER_FILE: i64 = 2;

// ============================================================================
// Types
// ============================================================================

/// Approximate code-change summary for one entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChanges {
    pub files_affected: Vec<String>,
    pub lines_added: i64,
    pub lines_removed: i64,
    pub change_type: ChangeType,
}

/// Commit metadata attached to a history entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitCommitInfo {
    pub commit_hash: String,
    pub short_hash: String,
}

/// Commit metadata embedded in an AI message's metadata JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedCommitMeta {
    pub commit_hash: String,
    pub short_hash: String,
    #[serde(default)]
    pub files_changed: Vec<String>,
    #[serde(default)]
    pub change_type: ChangeType,
}

/// One reconstructed (request, response, code-change, optional commit) unit
///
/// `success` is true if and only if a commit was actually created for the
/// message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub entry_id: String,
    pub conversation_id: String,
    pub message_id: String,
    pub user_request: String,
    pub ai_response: String,
    pub code_changes: CodeChanges,
    pub git_commit: Option<GitCommitInfo>,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// Estimate a code-change summary from the affected file list
pub fn estimate_code_changes(files: Vec<String>, change_type: ChangeType) -> CodeChanges {
    let count = files.len() as i64;
    CodeChanges {
        files_affected: files,
        lines_added: count * LINES_ADDED_PER_FILE,
        lines_removed: count * LINES_REMOVED_PER_FILE,
        change_type,
    }
}

// ============================================================================
// Personalization Sink
// ============================================================================

/// Receiver for per-entry code-change summaries (personalization data store)
#[async_trait]
pub trait ChangeSink: Send + Sync {
    async fn record_change(&self, entry: &HistoryEntry) -> chattrace_foundation::Result<()>;
}

/// JSON-file-backed sink: appends entries to a single array file
pub struct JsonChangeSink {
    store: JsonStore,
    filename: String,
}

impl JsonChangeSink {
    pub fn new(store: JsonStore, filename: impl Into<String>) -> Self {
        Self {
            store,
            filename: filename.into(),
        }
    }
}

#[async_trait]
impl ChangeSink for JsonChangeSink {
    async fn record_change(&self, entry: &HistoryEntry) -> chattrace_foundation::Result<()> {
        let mut entries: Vec<HistoryEntry> = self
            .store
            .load_optional(&self.filename)?
            .unwrap_or_default();
        entries.push(entry.clone());
        self.store.save(&self.filename, &entries)
    }
}

// ============================================================================
// Assembly
// ============================================================================

/// Pair each user message with the next chronologically later AI message and
/// synthesize one history entry per pair
pub fn assemble_entries(conversation_id: &str, messages: &[MessageRecord]) -> Vec<HistoryEntry> {
    let mut entries = Vec::new();

    for (i, message) in messages.iter().enumerate() {
        if message.sender != "user" {
            continue;
        }

        let ai_message = messages[i + 1..].iter().find(|m| m.sender == "ai");

        let embedded: Option<EmbeddedCommitMeta> = ai_message
            .and_then(|m| m.metadata.as_deref())
            .and_then(|json| serde_json::from_str(json).ok());

        let change_type = embedded
            .as_ref()
            .map(|e| e.change_type)
            .unwrap_or_else(|| crate::correlate::infer_change_type(&message.content));
        let files = embedded
            .as_ref()
            .map(|e| e.files_changed.clone())
            .unwrap_or_default();

        let git_commit = embedded.as_ref().map(|e| GitCommitInfo {
            commit_hash: e.commit_hash.clone(),
            short_hash: e.short_hash.clone(),
        });
        let success = git_commit.is_some();

        let timestamp = DateTime::parse_from_rfc3339(&message.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        entries.push(HistoryEntry {
            entry_id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            message_id: message.id.clone(),
            user_request: message.content.clone(),
            ai_response: ai_message.map(|m| m.content.clone()).unwrap_or_default(),
            code_changes: estimate_code_changes(files, change_type),
            git_commit,
            success,
            timestamp,
        });
    }

    entries
}

/// Keep only the most recent `limit` entries per conversation
fn trim_for_persist(
    cache: &HashMap<String, Vec<HistoryEntry>>,
    limit: usize,
) -> HashMap<String, Vec<HistoryEntry>> {
    cache
        .iter()
        .map(|(id, entries)| {
            let start = entries.len().saturating_sub(limit);
            (id.clone(), entries[start..].to_vec())
        })
        .collect()
}

// ============================================================================
// Conversation Tracker
// ============================================================================

/// History assembly and live change tracking for one repository
pub struct ConversationTracker {
    store: Arc<ConversationStore>,
    correlator: Arc<CommitCorrelator>,
    cache: Mutex<HashMap<String, Vec<HistoryEntry>>>,
    persist: JsonStore,
    cache_limit: usize,
    sink: Option<Arc<dyn ChangeSink>>,
}

impl ConversationTracker {
    /// Create a tracker, restoring any persisted cache
    pub fn new(
        store: Arc<ConversationStore>,
        correlator: Arc<CommitCorrelator>,
        persist: JsonStore,
        cache_limit: usize,
        sink: Option<Arc<dyn ChangeSink>>,
    ) -> Self {
        let restored: HashMap<String, Vec<HistoryEntry>> = persist
            .load_optional(HISTORY_CACHE_FILE)
            .ok()
            .flatten()
            .unwrap_or_default();

        if !restored.is_empty() {
            debug!(
                conversations = restored.len(),
                "Restored persisted history cache"
            );
        }

        Self {
            store,
            correlator,
            cache: Mutex::new(restored),
            persist,
            cache_limit,
            sink,
        }
    }

    /// Get the assembled history for a conversation
    ///
    /// A cached list is returned unchanged, with no freshness check. Read
    /// failures degrade to an empty list; this path never surfaces storage
    /// errors.
    pub async fn get_conversation_history(&self, conversation_id: &str) -> Vec<HistoryEntry> {
        // The lock is not held across the store read; it blocks on sqlite
        {
            let cache = self.cache.lock().await;
            if let Some(entries) = cache.get(conversation_id) {
                return entries.clone();
            }
        }

        let messages = match self.store.get_conversation_messages(conversation_id) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(
                    conversation_id = %conversation_id,
                    error = %e,
                    "Failed to load messages for history assembly"
                );
                return Vec::new();
            }
        };

        let assembled = assemble_entries(conversation_id, &messages);

        // A concurrent assembly may have won the race; keep its entry
        let mut cache = self.cache.lock().await;
        let entries = cache
            .entry(conversation_id.to_string())
            .or_insert(assembled)
            .clone();
        self.persist_cache(&cache);
        entries
    }

    /// Drop a conversation's cache entry (for out-of-band store writes)
    pub async fn invalidate(&self, conversation_id: &str) {
        self.cache.lock().await.remove(conversation_id);
    }

    /// Live write path: record one conversational change, attempting a
    /// correlated commit
    ///
    /// The entry's `success` is true if and only if a commit was produced.
    /// A commit failure with local changes present is recorded, not raised.
    pub async fn track_conversation_change(&self, request: CommitRequest) -> Result<HistoryEntry> {
        let change_type = crate::correlate::infer_change_type(&request.user_request);

        let (git_commit, success) = match self.correlator.create_commit(&request).await {
            Ok(outcome) => {
                self.store.link_git_commit(&CommitLinkRecord {
                    conversation_id: request.conversation_id.clone(),
                    message_id: request.message_id.clone(),
                    commit_hash: outcome.commit_hash.clone(),
                    short_hash: outcome.short_hash.clone(),
                    files_changed: request.files_changed.clone(),
                    change_type: outcome.change_type.as_str().to_string(),
                    created_at: String::new(),
                })?;

                (
                    Some(GitCommitInfo {
                        commit_hash: outcome.commit_hash,
                        short_hash: outcome.short_hash,
                    }),
                    true,
                )
            }
            Err(crate::error::EngineError::NoChangesToCommit) => {
                debug!(
                    conversation_id = %request.conversation_id,
                    "Nothing to record for this change"
                );
                (None, false)
            }
            Err(e) => {
                warn!(
                    conversation_id = %request.conversation_id,
                    error = %e,
                    "Commit step failed while tracking change"
                );
                (None, false)
            }
        };

        let entry = HistoryEntry {
            entry_id: Uuid::new_v4().to_string(),
            conversation_id: request.conversation_id.clone(),
            message_id: request.message_id,
            user_request: request.user_request,
            ai_response: request.ai_response,
            code_changes: estimate_code_changes(request.files_changed, change_type),
            git_commit,
            success,
            timestamp: Utc::now(),
        };

        {
            let mut cache = self.cache.lock().await;
            cache
                .entry(request.conversation_id)
                .or_default()
                .push(entry.clone());
            self.persist_cache(&cache);
        }

        // Personalization forwarding is best effort
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.record_change(&entry).await {
                warn!(error = %e, "Failed to forward change to personalization sink");
            }
        }

        Ok(entry)
    }

    /// Persist the most recent entries per conversation (best effort)
    fn persist_cache(&self, cache: &HashMap<String, Vec<HistoryEntry>>) {
        let trimmed = trim_for_persist(cache, self.cache_limit);
        if let Err(e) = self.persist.save(HISTORY_CACHE_FILE, &trimmed) {
            warn!(error = %e, "Failed to persist history cache");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, sender: &str, content: &str, metadata: Option<&str>) -> MessageRecord {
        MessageRecord {
            id: id.to_string(),
            conversation_id: "conv-1".to_string(),
            sender: sender.to_string(),
            content: content.to_string(),
            model: None,
            confidence: None,
            processing_time_ms: None,
            metadata: metadata.map(|s| s.to_string()),
            created_at: "2024-05-01T10:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_estimate_code_changes() {
        let changes = estimate_code_changes(
            vec!["a.html".to_string(), "b.css".to_string()],
            ChangeType::Update,
        );
        assert_eq!(changes.lines_added, 20);
        assert_eq!(changes.lines_removed, 4);
        assert_eq!(changes.files_affected.len(), 2);
    }

    #[test]
    fn test_assemble_pairs_user_with_next_ai() {
        let messages = vec![
            message("m1", "user", "add a navbar", None),
            message("m2", "ai", "navbar added", None),
            message("m3", "user", "fix the footer", None),
            message("m4", "system", "revert notice", None),
            message("m5", "ai", "footer fixed", None),
        ];

        let entries = assemble_entries("conv-1", &messages);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].user_request, "add a navbar");
        assert_eq!(entries[0].ai_response, "navbar added");
        assert_eq!(entries[1].ai_response, "footer fixed");
    }

    #[test]
    fn test_assemble_success_only_with_commit_metadata() {
        let meta = serde_json::to_string(&EmbeddedCommitMeta {
            commit_hash: "a".repeat(40),
            short_hash: "aaaaaaa".to_string(),
            files_changed: vec!["index.html".to_string()],
            change_type: ChangeType::Update,
        })
        .unwrap();

        let messages = vec![
            message("m1", "user", "update the title", None),
            message("m2", "ai", "done", Some(&meta)),
            message("m3", "user", "explain the code", None),
            message("m4", "ai", "sure, here is how it works", None),
        ];

        let entries = assemble_entries("conv-1", &messages);
        assert_eq!(entries.len(), 2);

        assert!(entries[0].success);
        assert_eq!(
            entries[0].git_commit.as_ref().map(|c| c.short_hash.as_str()),
            Some("aaaaaaa")
        );
        assert_eq!(entries[0].code_changes.files_affected, vec!["index.html"]);

        // No commit metadata means success=false, never the reverse
        assert!(!entries[1].success);
        assert!(entries[1].git_commit.is_none());
    }

    #[test]
    fn test_assemble_user_without_ai_response() {
        let messages = vec![message("m1", "user", "do something", None)];
        let entries = assemble_entries("conv-1", &messages);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].ai_response, "");
        assert!(!entries[0].success);
    }

    #[test]
    fn test_trim_for_persist_keeps_most_recent() {
        let mut cache = HashMap::new();
        let entries: Vec<HistoryEntry> = (0..15)
            .map(|i| HistoryEntry {
                entry_id: i.to_string(),
                conversation_id: "conv-1".to_string(),
                message_id: format!("m{}", i),
                user_request: String::new(),
                ai_response: String::new(),
                code_changes: estimate_code_changes(Vec::new(), ChangeType::Feat),
                git_commit: None,
                success: false,
                timestamp: Utc::now(),
            })
            .collect();
        cache.insert("conv-1".to_string(), entries);

        let trimmed = trim_for_persist(&cache, 10);
        let kept = &trimmed["conv-1"];
        assert_eq!(kept.len(), 10);
        assert_eq!(kept[0].message_id, "m5");
        assert_eq!(kept[9].message_id, "m14");
    }
}
