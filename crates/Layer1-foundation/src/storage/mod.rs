//! Storage layer
//!
//! - SQLite: conversations, messages, commit links (runtime data)
//! - JsonStore: config files and persisted caches

pub mod db;
pub mod json;

pub use db::{
    AiMetadata, CommitLinkRecord, ConversationRecord, ConversationStore, MessageRecord,
};
pub use json::JsonStore;
