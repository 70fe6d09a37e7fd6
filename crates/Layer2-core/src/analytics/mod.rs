//! Analytics Extraction
//!
//! Scans all AI-authored commits repository-wide and parses the embedded
//! trailers back into typed records. Missing or malformed trailers degrade
//! to safe defaults; a single bad commit never aborts the scan.

use crate::correlate::{
    AI_SUBJECT_PREFIX, TRAILER_AI_CONFIDENCE, TRAILER_AI_MODEL, TRAILER_CONVERSATION_ID,
    TRAILER_FILES_CHANGED, TRAILER_MESSAGE_ID, TRAILER_PROCESSING_TIME, TRAILER_USER_REQUEST,
};
use crate::error::Result;
use crate::git::{GitOps, LogOptions};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

lazy_static! {
    static ref RE_CONVERSATION: Regex = trailer_regex(TRAILER_CONVERSATION_ID);
    static ref RE_MESSAGE: Regex = trailer_regex(TRAILER_MESSAGE_ID);
    static ref RE_REQUEST: Regex = trailer_regex(TRAILER_USER_REQUEST);
    static ref RE_MODEL: Regex = trailer_regex(TRAILER_AI_MODEL);
    static ref RE_CONFIDENCE: Regex = trailer_regex(TRAILER_AI_CONFIDENCE);
    static ref RE_PROCESSING: Regex = trailer_regex(TRAILER_PROCESSING_TIME);
    static ref RE_FILES: Regex = trailer_regex(TRAILER_FILES_CHANGED);
}

fn trailer_regex(key: &str) -> Regex {
    // Line-anchored; trailer values never contain newlines by the
    // sanitization contract.
    Regex::new(&format!(r"(?m)^{}: (.*)$", regex::escape(key))).expect("valid trailer regex")
}

/// One AI-authored commit decoded for reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    pub commit_hash: String,
    pub conversation_id: String,
    pub message_id: String,
    pub user_request: String,
    pub ai_model: String,
    pub confidence: f64,
    pub processing_time_ms: i64,
    pub files_modified: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Parse one commit message into an analytics record
///
/// Every recognized trailer is matched independently; absent or malformed
/// values fall back to `''` / `0`.
pub fn parse_commit_message(
    commit_hash: &str,
    timestamp: DateTime<Utc>,
    message: &str,
) -> AnalyticsRecord {
    let capture = |re: &Regex| {
        re.captures(message)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default()
    };

    let files_modified: Vec<String> = capture(&RE_FILES)
        .split(',')
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect();

    AnalyticsRecord {
        commit_hash: commit_hash.to_string(),
        conversation_id: capture(&RE_CONVERSATION),
        message_id: capture(&RE_MESSAGE),
        user_request: capture(&RE_REQUEST),
        ai_model: capture(&RE_MODEL),
        confidence: capture(&RE_CONFIDENCE).parse().unwrap_or(0.0),
        processing_time_ms: capture(&RE_PROCESSING).parse().unwrap_or(0),
        files_modified,
        timestamp,
    }
}

/// Decode every AI-authored commit in the repository, oldest first
///
/// This read path never fails on a single bad commit; it yields a partial
/// record with default field values instead.
pub async fn extract_conversation_analytics(git: &GitOps) -> Result<Vec<AnalyticsRecord>> {
    let entries = git
        .log(&LogOptions {
            grep: Some(AI_SUBJECT_PREFIX.to_string()),
            reverse: true,
            max_count: None,
        })
        .await?;

    let records: Vec<AnalyticsRecord> = entries
        .iter()
        .filter(|e| e.subject().starts_with(AI_SUBJECT_PREFIX))
        .map(|e| parse_commit_message(&e.hash, e.timestamp, &e.message))
        .collect();

    debug!(commits = records.len(), "Extracted conversation analytics");
    Ok(records)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlate::{build_commit_message, build_subject, build_trailers, ChangeType};

    #[test]
    fn test_round_trip_sanitized_request() {
        let files = vec!["index.html".to_string()];
        let trailers = build_trailers(
            "conv-1",
            "msg-1",
            "add a \"hero\" section\nwith an image",
            "added the hero section",
            "claude-3",
            0.87,
            2400,
            &files,
            200,
        );
        let subject = build_subject("conv-1", ChangeType::Feat, "add a hero section");
        let message = build_commit_message(&subject, &trailers);

        let record = parse_commit_message("abc123", Utc::now(), &message);

        assert_eq!(record.conversation_id, "conv-1");
        assert_eq!(record.message_id, "msg-1");
        // Sanitized form: quotes converted, newline stripped
        assert_eq!(record.user_request, "add a 'hero' section with an image");
        assert_eq!(record.ai_model, "claude-3");
        assert_eq!(record.confidence, 0.87);
        assert_eq!(record.processing_time_ms, 2400);
        assert_eq!(record.files_modified, vec!["index.html"]);
    }

    #[test]
    fn test_malformed_trailers_degrade_to_defaults() {
        let message = "[AI-Chat-conv-9] fix: something\n\n\
                       Author: AI\n\
                       Conversation-ID: conv-9\n\
                       AI-Confidence: not-a-number\n";

        let record = parse_commit_message("def456", Utc::now(), message);

        assert_eq!(record.conversation_id, "conv-9");
        assert_eq!(record.message_id, "");
        assert_eq!(record.user_request, "");
        assert_eq!(record.ai_model, "");
        assert_eq!(record.confidence, 0.0);
        assert_eq!(record.processing_time_ms, 0);
        assert!(record.files_modified.is_empty());
    }

    #[test]
    fn test_empty_files_trailer_yields_empty_list() {
        let message = "[AI-Chat-conv-9] feat: x\n\nFiles-Changed: \n";
        let record = parse_commit_message("abc", Utc::now(), message);
        assert!(record.files_modified.is_empty());
    }
}
