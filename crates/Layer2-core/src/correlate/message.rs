//! Commit message wire format
//!
//! The commit message is the only persisted protocol: a subject line
//! `[AI-Chat-<conversationId>] <type>: <summary>` followed by one
//! `Key: value` trailer per line. The message alone must be sufficient to
//! reconstruct the correlation without any external index.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Subject prefix marking an AI-authored commit
pub const AI_SUBJECT_PREFIX: &str = "[AI-Chat-";

/// Commit author identity for AI-applied changes
pub const AI_AUTHOR_NAME: &str = "AI";
pub const AI_AUTHOR_EMAIL: &str = "ai@chattrace.local";

// Trailer keys. Trailers are built as an ordered list of pairs, never a map:
// a key-unique mapping would silently drop repeated keys.
pub const TRAILER_AUTHOR: &str = "Author";
pub const TRAILER_CONVERSATION_ID: &str = "Conversation-ID";
pub const TRAILER_MESSAGE_ID: &str = "Message-ID";
pub const TRAILER_USER_REQUEST: &str = "User-Request";
pub const TRAILER_AI_RESPONSE: &str = "AI-Response";
pub const TRAILER_AI_MODEL: &str = "AI-Model";
pub const TRAILER_AI_CONFIDENCE: &str = "AI-Confidence";
pub const TRAILER_PROCESSING_TIME: &str = "Processing-Time";
pub const TRAILER_FILES_CHANGED: &str = "Files-Changed";

/// Maximum length of the summary paraphrase in the subject line
pub const MAX_SUMMARY_LEN: usize = 50;

// ============================================================================
// Change Type
// ============================================================================

/// Conventional change type inferred from the user request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Create,
    Update,
    Remove,
    Style,
    Fix,
    Test,
    Docs,
    #[default]
    Feat,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Create => "create",
            ChangeType::Update => "update",
            ChangeType::Remove => "remove",
            ChangeType::Style => "style",
            ChangeType::Fix => "fix",
            ChangeType::Test => "test",
            ChangeType::Docs => "docs",
            ChangeType::Feat => "feat",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Infer the change type from keywords in the user request
pub fn infer_change_type(user_request: &str) -> ChangeType {
    let request = user_request.to_lowercase();

    let has = |words: &[&str]| words.iter().any(|w| request.contains(w));

    if has(&["create", "new file", "generate"]) {
        ChangeType::Create
    } else if has(&["update", "change", "modify", "edit"]) {
        ChangeType::Update
    } else if has(&["remove", "delete", "drop"]) {
        ChangeType::Remove
    } else if has(&["style", "color", "css", "design", "layout"]) {
        ChangeType::Style
    } else if has(&["fix", "bug", "error", "broken"]) {
        ChangeType::Fix
    } else if has(&["test", "spec"]) {
        ChangeType::Test
    } else if has(&["doc", "readme", "comment"]) {
        ChangeType::Docs
    } else {
        ChangeType::Feat
    }
}

// ============================================================================
// Sanitization
// ============================================================================

/// Sanitize free text for embedding in a trailer value
///
/// Quotes become single quotes and newlines/carriage-returns become spaces,
/// so line-based trailer parsing never breaks on embedded text.
pub fn sanitize_text(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| match c {
            '"' => '\'',
            '\n' | '\r' => ' ',
            c => c,
        })
        .collect();

    // Collapse runs of whitespace introduced by stripped newlines
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate sanitized text to a maximum number of characters
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}

// ============================================================================
// File Category Tags
// ============================================================================

/// Infer file-category tags (HTML/CSS/JS/Config/Asset) from changed paths
pub fn file_category_tags(files: &[String]) -> Vec<&'static str> {
    let mut html = false;
    let mut css = false;
    let mut js = false;
    let mut config = false;
    let mut asset = false;

    for file in files {
        let ext = Path::new(file)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "html" | "htm" => html = true,
            "css" | "scss" | "sass" => css = true,
            "js" | "jsx" | "ts" | "tsx" => js = true,
            "json" | "toml" | "yaml" | "yml" | "ini" => config = true,
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "ico" | "webp" => asset = true,
            _ => {}
        }
    }

    let mut tags = Vec::new();
    if html {
        tags.push("HTML");
    }
    if css {
        tags.push("CSS");
    }
    if js {
        tags.push("JS");
    }
    if config {
        tags.push("Config");
    }
    if asset {
        tags.push("Asset");
    }
    tags
}

// ============================================================================
// Message Building
// ============================================================================

/// Build the subject-line summary: category tags + capped request paraphrase
pub fn build_summary(user_request: &str, files: &[String]) -> String {
    let description = truncate_text(&sanitize_text(user_request), MAX_SUMMARY_LEN);
    let tags = file_category_tags(files);

    if tags.is_empty() {
        description
    } else {
        format!("[{}] {}", tags.join(","), description)
    }
}

/// Build the subject line: `[AI-Chat-<conversationId>] <type>: <summary>`
pub fn build_subject(conversation_id: &str, change_type: ChangeType, summary: &str) -> String {
    format!("{}{}] {}: {}", AI_SUBJECT_PREFIX, conversation_id, change_type, summary)
}

/// Build the ordered trailer list for a correlated commit
#[allow(clippy::too_many_arguments)]
pub fn build_trailers(
    conversation_id: &str,
    message_id: &str,
    user_request: &str,
    ai_response: &str,
    model: &str,
    confidence: f64,
    processing_time_ms: i64,
    files: &[String],
    response_max_len: usize,
) -> Vec<(&'static str, String)> {
    vec![
        (TRAILER_AUTHOR, AI_AUTHOR_NAME.to_string()),
        (TRAILER_CONVERSATION_ID, conversation_id.to_string()),
        (TRAILER_MESSAGE_ID, message_id.to_string()),
        (TRAILER_USER_REQUEST, sanitize_text(user_request)),
        (
            TRAILER_AI_RESPONSE,
            truncate_text(&sanitize_text(ai_response), response_max_len),
        ),
        (TRAILER_AI_MODEL, model.to_string()),
        (TRAILER_AI_CONFIDENCE, confidence.to_string()),
        (TRAILER_PROCESSING_TIME, processing_time_ms.to_string()),
        (TRAILER_FILES_CHANGED, files.join(",")),
    ]
}

/// Assemble the full commit message from subject and trailers
pub fn build_commit_message(subject: &str, trailers: &[(&'static str, String)]) -> String {
    let body: Vec<String> = trailers
        .iter()
        .map(|(key, value)| format!("{}: {}", key, value))
        .collect();

    format!("{}\n\n{}", subject, body.join("\n"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_change_type_keywords() {
        assert_eq!(infer_change_type("Create a landing page"), ChangeType::Create);
        assert_eq!(infer_change_type("please update the header"), ChangeType::Update);
        assert_eq!(infer_change_type("delete the old banner"), ChangeType::Remove);
        assert_eq!(infer_change_type("make the button color blue"), ChangeType::Style);
        assert_eq!(infer_change_type("fix the broken link"), ChangeType::Fix);
        assert_eq!(infer_change_type("add a test for login"), ChangeType::Test);
        assert_eq!(infer_change_type("improve the readme"), ChangeType::Docs);
        assert_eq!(infer_change_type("make it faster"), ChangeType::Feat);
    }

    #[test]
    fn test_sanitize_text_quotes_and_newlines() {
        let input = "say \"hello\"\nand\r\ngoodbye";
        assert_eq!(sanitize_text(input), "say 'hello' and goodbye");
    }

    #[test]
    fn test_truncate_text_respects_cap() {
        let long = "a".repeat(80);
        let capped = truncate_text(&long, 50);
        assert!(capped.chars().count() <= 50);
        assert!(capped.ends_with("..."));

        assert_eq!(truncate_text("short", 50), "short");
    }

    #[test]
    fn test_file_category_tags_order_and_dedup() {
        let files = vec![
            "app.js".to_string(),
            "index.html".to_string(),
            "main.css".to_string(),
            "other.html".to_string(),
        ];
        assert_eq!(file_category_tags(&files), vec!["HTML", "CSS", "JS"]);
    }

    #[test]
    fn test_build_subject_format() {
        let subject = build_subject("conv-1", ChangeType::Fix, "fix the nav");
        assert_eq!(subject, "[AI-Chat-conv-1] fix: fix the nav");
    }

    #[test]
    fn test_build_summary_with_tags() {
        let files = vec!["style.css".to_string()];
        let summary = build_summary("change the theme colors", &files);
        assert!(summary.starts_with("[CSS] "));
    }

    #[test]
    fn test_trailers_are_ordered_pairs() {
        let files = vec!["index.html".to_string(), "app.js".to_string()];
        let trailers = build_trailers(
            "conv-1", "msg-1", "add a navbar", "done", "claude-3", 0.92, 1500, &files, 200,
        );

        let keys: Vec<&str> = trailers.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec![
                TRAILER_AUTHOR,
                TRAILER_CONVERSATION_ID,
                TRAILER_MESSAGE_ID,
                TRAILER_USER_REQUEST,
                TRAILER_AI_RESPONSE,
                TRAILER_AI_MODEL,
                TRAILER_AI_CONFIDENCE,
                TRAILER_PROCESSING_TIME,
                TRAILER_FILES_CHANGED,
            ]
        );
        assert_eq!(trailers[8].1, "index.html,app.js");
    }

    #[test]
    fn test_build_commit_message_layout() {
        let trailers = vec![
            (TRAILER_AUTHOR, "AI".to_string()),
            (TRAILER_CONVERSATION_ID, "conv-1".to_string()),
        ];
        let message = build_commit_message("[AI-Chat-conv-1] feat: add navbar", &trailers);

        let mut lines = message.lines();
        assert_eq!(lines.next(), Some("[AI-Chat-conv-1] feat: add navbar"));
        assert_eq!(lines.next(), Some(""));
        assert_eq!(lines.next(), Some("Author: AI"));
        assert_eq!(lines.next(), Some("Conversation-ID: conv-1"));
    }
}
