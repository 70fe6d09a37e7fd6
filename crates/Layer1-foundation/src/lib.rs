//! # chattrace-foundation
//!
//! Foundation layer for ChatTrace:
//! - Error: central error type and `Result` alias
//! - Config: merged global/project JSON configuration
//! - Storage: SQLite conversation store + generic JsonStore

pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{TraceConfig, TRACE_CONFIG_FILE};

// ============================================================================
// Storage
// ============================================================================
pub use storage::{
    AiMetadata, CommitLinkRecord, ConversationRecord, ConversationStore, JsonStore, MessageRecord,
};
