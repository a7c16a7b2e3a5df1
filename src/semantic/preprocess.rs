//! Text preparation for note embeddings.
//!
//! Title and body are trimmed, joined and truncated to a fixed character
//! budget on a char boundary.

/// Maximum embedding input length (characters, not tokens)
const MAX_CONTENT_LENGTH: usize = 512;

const TRUNCATION_SUFFIX: &str = "...";

/// Text to embed for a note, or `None` if both title and body are blank.
pub fn note_text(title: &str, body: &str) -> Option<String> {
    let title = title.trim();
    let body = body.split_whitespace().collect::<Vec<_>>().join(" ");

    let content = match (title.is_empty(), body.is_empty()) {
        (true, true) => return None,
        (false, true) => title.to_string(),
        (true, false) => body,
        (false, false) => format!("{title}\n{body}"),
    };

    Some(truncate_chars(&content, MAX_CONTENT_LENGTH))
}

/// Keep at most `max_chars` characters, marking cut text with an ellipsis.
pub fn truncate_chars(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }

    let keep = max_chars.saturating_sub(TRUNCATION_SUFFIX.len());
    let truncated: String = content.chars().take(keep).collect();
    format!("{truncated}{TRUNCATION_SUFFIX}")
}
