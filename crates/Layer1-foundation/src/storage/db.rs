//! SQLite conversation store
//!
//! Durable store for AI-assisted editing sessions:
//! - Conversations: one row per editing session
//! - Messages: every user/ai/system turn
//! - Commit links: append-only correlation between a message and a commit
//!
//! ## Migration System
//!
//! Database schema is versioned. Migrations run automatically on startup.
//! - Version 1: Initial schema (conversations, messages, commit_links)
//! - Version 2: Add metadata JSON column to messages

use crate::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Current schema version
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// AI metadata attached to an assistant message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiMetadata {
    pub model: String,
    pub confidence: f64,
    pub processing_time_ms: i64,
}

/// Store for conversations, messages and commit links
pub struct ConversationStore {
    conn: Arc<Mutex<Connection>>,
}

impl ConversationStore {
    /// Open (or create) the store under a data directory
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| Error::Storage(format!("Failed to create data directory: {}", e)))?;

        let db_path = data_dir.join("chattrace.db");
        let conn = Connection::open(&db_path)
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| Error::Storage(format!("Failed to set pragmas: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.initialize_schema()?;
        store.run_migrations()?;

        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to create in-memory database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.initialize_schema()?;
        store.run_migrations()?;

        Ok(store)
    }

    /// Get current schema version from database
    pub fn get_schema_version(&self) -> Result<i32> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))?;

        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(|e| Error::Storage(format!("Failed to get schema version: {}", e)))
    }

    /// Initialize database schema (base tables)
    fn initialize_schema(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))?;

        conn.execute_batch(
            r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- Conversations table
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                project_type TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                total_messages INTEGER DEFAULT 0,
                total_commits INTEGER DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Messages table
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                sender TEXT NOT NULL CHECK(sender IN ('user', 'ai', 'system')),
                content TEXT NOT NULL,
                model TEXT,
                confidence REAL,
                processing_time_ms INTEGER,
                created_at TEXT NOT NULL,
                FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON messages(conversation_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_conversations_user
                ON conversations(user_id, updated_at DESC);

            -- Commit links (append-only)
            CREATE TABLE IF NOT EXISTS commit_links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL,
                message_id TEXT NOT NULL,
                commit_hash TEXT NOT NULL,
                short_hash TEXT NOT NULL,
                files_changed TEXT NOT NULL,
                change_type TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_commit_links_conversation
                ON commit_links(conversation_id, created_at);

            -- Insert initial schema version if not exists
            INSERT OR IGNORE INTO schema_version (version) VALUES (1);
            "#,
        )
        .map_err(|e| Error::Storage(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    /// Run all pending migrations
    fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version()?;

        if current_version >= CURRENT_SCHEMA_VERSION {
            debug!(
                "Database schema is up to date (version {})",
                current_version
            );
            return Ok(());
        }

        info!(
            "Running database migrations from version {} to {}",
            current_version, CURRENT_SCHEMA_VERSION
        );

        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))?;

        for version in (current_version + 1)..=CURRENT_SCHEMA_VERSION {
            match version {
                2 => self.migrate_v2(&conn)?,
                _ => {
                    warn!("Unknown migration version: {}", version);
                }
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![version],
            )
            .map_err(|e| Error::Storage(format!("Failed to record migration: {}", e)))?;

            info!("Applied migration to version {}", version);
        }

        Ok(())
    }

    /// Migration to version 2: metadata JSON column on messages
    ///
    /// Used by history assembly to read commit info embedded in AI messages.
    fn migrate_v2(&self, conn: &Connection) -> Result<()> {
        let _ = conn.execute("ALTER TABLE messages ADD COLUMN metadata TEXT", []);
        Ok(())
    }

    // ========================================================================
    // Conversation Operations
    // ========================================================================

    /// Create a new conversation, returning its id
    pub fn create_conversation(&self, user_id: &str, project_type: &str) -> Result<String> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO conversations (id, user_id, project_type, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, 'active', ?4, ?4)
            "#,
            params![id, user_id, project_type, now],
        )
        .map_err(|e| Error::Storage(format!("Failed to create conversation: {}", e)))?;

        Ok(id)
    }

    /// Get a conversation by id
    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRecord>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))?;

        conn.query_row(
            r#"
            SELECT id, user_id, project_type, status, total_messages, total_commits,
                   created_at, updated_at
            FROM conversations WHERE id = ?1
            "#,
            params![id],
            Self::map_conversation,
        )
        .optional()
        .map_err(|e| Error::Storage(format!("Failed to get conversation: {}", e)))
    }

    /// Get a user's conversations, most recently updated first
    pub fn get_user_conversation_history(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ConversationRecord>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))?;

        let mut stmt = conn
            .prepare(
                r#"
                SELECT id, user_id, project_type, status, total_messages, total_commits,
                       created_at, updated_at
                FROM conversations
                WHERE user_id = ?1
                ORDER BY updated_at DESC
                LIMIT ?2
                "#,
            )
            .map_err(|e| Error::Storage(format!("Failed to prepare query: {}", e)))?;

        let conversations = stmt
            .query_map(params![user_id, limit], Self::map_conversation)
            .map_err(|e| Error::Storage(format!("Failed to query conversations: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(conversations)
    }

    fn map_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRecord> {
        Ok(ConversationRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            project_type: row.get(2)?,
            status: row.get(3)?,
            total_messages: row.get(4)?,
            total_commits: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    // ========================================================================
    // Message Operations
    // ========================================================================

    /// Save a message, returning its id
    pub fn save_message(
        &self,
        conversation_id: &str,
        sender: &str,
        content: &str,
        ai: Option<&AiMetadata>,
        metadata: Option<&str>,
    ) -> Result<String> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO messages (id, conversation_id, sender, content, model, confidence,
                                  processing_time_ms, metadata, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                id,
                conversation_id,
                sender,
                content,
                ai.map(|m| m.model.clone()),
                ai.map(|m| m.confidence),
                ai.map(|m| m.processing_time_ms),
                metadata,
                now,
            ],
        )
        .map_err(|e| Error::Storage(format!("Failed to save message: {}", e)))?;

        // Update conversation stats
        conn.execute(
            r#"
            UPDATE conversations SET
                total_messages = total_messages + 1,
                updated_at = ?2
            WHERE id = ?1
            "#,
            params![conversation_id, now],
        )
        .ok();

        Ok(id)
    }

    /// Get all messages for a conversation in chronological order
    pub fn get_conversation_messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))?;

        let mut stmt = conn
            .prepare(
                r#"
                SELECT id, conversation_id, sender, content, model, confidence,
                       processing_time_ms, metadata, created_at
                FROM messages
                WHERE conversation_id = ?1
                ORDER BY created_at ASC, rowid ASC
                "#,
            )
            .map_err(|e| Error::Storage(format!("Failed to prepare query: {}", e)))?;

        let messages = stmt
            .query_map(params![conversation_id], |row| {
                Ok(MessageRecord {
                    id: row.get(0)?,
                    conversation_id: row.get(1)?,
                    sender: row.get(2)?,
                    content: row.get(3)?,
                    model: row.get(4)?,
                    confidence: row.get(5)?,
                    processing_time_ms: row.get(6)?,
                    metadata: row.get(7)?,
                    created_at: row.get(8)?,
                })
            })
            .map_err(|e| Error::Storage(format!("Failed to query messages: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(messages)
    }

    // ========================================================================
    // Commit Link Operations
    // ========================================================================

    /// Record the correlation between a message and a commit (append-only)
    pub fn link_git_commit(&self, link: &CommitLinkRecord) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))?;

        let now = chrono::Utc::now().to_rfc3339();
        let files = serde_json::to_string(&link.files_changed)?;

        conn.execute(
            r#"
            INSERT INTO commit_links (conversation_id, message_id, commit_hash, short_hash,
                                      files_changed, change_type, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                link.conversation_id,
                link.message_id,
                link.commit_hash,
                link.short_hash,
                files,
                link.change_type,
                now,
            ],
        )
        .map_err(|e| Error::Storage(format!("Failed to link commit: {}", e)))?;

        conn.execute(
            r#"
            UPDATE conversations SET
                total_commits = total_commits + 1,
                updated_at = ?2
            WHERE id = ?1
            "#,
            params![link.conversation_id, now],
        )
        .ok();

        Ok(())
    }

    /// Get commit links for a conversation in chronological order
    pub fn get_commit_links(&self, conversation_id: &str) -> Result<Vec<CommitLinkRecord>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))?;

        let mut stmt = conn
            .prepare(
                r#"
                SELECT conversation_id, message_id, commit_hash, short_hash,
                       files_changed, change_type, created_at
                FROM commit_links
                WHERE conversation_id = ?1
                ORDER BY created_at ASC, id ASC
                "#,
            )
            .map_err(|e| Error::Storage(format!("Failed to prepare query: {}", e)))?;

        let links = stmt
            .query_map(params![conversation_id], |row| {
                let files_json: String = row.get(4)?;
                Ok(CommitLinkRecord {
                    conversation_id: row.get(0)?,
                    message_id: row.get(1)?,
                    commit_hash: row.get(2)?,
                    short_hash: row.get(3)?,
                    files_changed: serde_json::from_str(&files_json).unwrap_or_default(),
                    change_type: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })
            .map_err(|e| Error::Storage(format!("Failed to query commit links: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(links)
    }
}

// ============================================================================
// Record Types
// ============================================================================

/// Conversation record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    pub user_id: String,
    pub project_type: Option<String>,
    pub status: String,
    pub total_messages: i32,
    pub total_commits: i32,
    pub created_at: String,
    pub updated_at: String,
}

/// Message record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub conversation_id: String,
    pub sender: String,
    pub content: String,
    pub model: Option<String>,
    pub confidence: Option<f64>,
    pub processing_time_ms: Option<i64>,
    /// Additional metadata (JSON, e.g. embedded commit info on AI messages)
    pub metadata: Option<String>,
    pub created_at: String,
}

/// Commit link record (the message-to-commit correlation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitLinkRecord {
    pub conversation_id: String,
    pub message_id: String,
    pub commit_hash: String,
    pub short_hash: String,
    pub files_changed: Vec<String>,
    pub change_type: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get_conversation() {
        let store = ConversationStore::in_memory().expect("Failed to create store");

        let id = store
            .create_conversation("user-1", "web")
            .expect("Failed to create conversation");

        let conv = store
            .get_conversation(&id)
            .expect("Failed to get conversation")
            .expect("Conversation not found");

        assert_eq!(conv.user_id, "user-1");
        assert_eq!(conv.status, "active");
        assert_eq!(conv.total_messages, 0);
        assert_eq!(conv.total_commits, 0);
    }

    #[test]
    fn test_message_operations() {
        let store = ConversationStore::in_memory().expect("Failed to create store");
        let id = store.create_conversation("user-1", "web").expect("create");

        store
            .save_message(&id, "user", "Add a navbar", None, None)
            .expect("save user message");

        let ai = AiMetadata {
            model: "claude-3".to_string(),
            confidence: 0.9,
            processing_time_ms: 1200,
        };
        store
            .save_message(&id, "ai", "Done, navbar added", Some(&ai), None)
            .expect("save ai message");

        let messages = store.get_conversation_messages(&id).expect("get messages");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, "user");
        assert_eq!(messages[1].model.as_deref(), Some("claude-3"));

        let conv = store.get_conversation(&id).expect("get").expect("found");
        assert_eq!(conv.total_messages, 2);
    }

    #[test]
    fn test_invalid_sender_rejected() {
        let store = ConversationStore::in_memory().expect("Failed to create store");
        let id = store.create_conversation("user-1", "web").expect("create");

        let result = store.save_message(&id, "robot", "hello", None, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_link_git_commit_bumps_counter() {
        let store = ConversationStore::in_memory().expect("Failed to create store");
        let id = store.create_conversation("user-1", "web").expect("create");

        let link = CommitLinkRecord {
            conversation_id: id.clone(),
            message_id: "msg-1".to_string(),
            commit_hash: "a".repeat(40),
            short_hash: "aaaaaaa".to_string(),
            files_changed: vec!["index.html".to_string()],
            change_type: "update".to_string(),
            created_at: String::new(),
        };
        store.link_git_commit(&link).expect("link commit");

        let links = store.get_commit_links(&id).expect("get links");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].files_changed, vec!["index.html".to_string()]);

        let conv = store.get_conversation(&id).expect("get").expect("found");
        assert_eq!(conv.total_commits, 1);
    }

    #[test]
    fn test_user_conversation_history() {
        let store = ConversationStore::in_memory().expect("Failed to create store");
        store.create_conversation("user-1", "web").expect("create");
        store.create_conversation("user-1", "cli").expect("create");
        store.create_conversation("user-2", "web").expect("create");

        let history = store
            .get_user_conversation_history("user-1", 10)
            .expect("history");
        assert_eq!(history.len(), 2);
    }
}
