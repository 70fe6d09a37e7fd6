//! Commit Correlation
//!
//! - `message`: the commit-message wire format (subject prefix, trailers,
//!   sanitization, change-type inference)
//! - `engine`: staging + committing with correlation metadata, and the
//!   conversation-scoped history query

pub mod engine;
pub mod message;

pub use engine::{CommitCorrelator, CommitOutcome, CommitRequest, ConversationCommit};
pub use message::{
    build_commit_message, build_subject, build_summary, build_trailers, file_category_tags,
    infer_change_type, sanitize_text, truncate_text, ChangeType, AI_AUTHOR_EMAIL, AI_AUTHOR_NAME,
    AI_SUBJECT_PREFIX, MAX_SUMMARY_LEN, TRAILER_AI_CONFIDENCE, TRAILER_AI_MODEL,
    TRAILER_AI_RESPONSE, TRAILER_AUTHOR, TRAILER_CONVERSATION_ID, TRAILER_FILES_CHANGED,
    TRAILER_MESSAGE_ID, TRAILER_PROCESSING_TIME, TRAILER_USER_REQUEST,
};
