//! Pull HTML out of a model reply.

use regex_lite::Regex;
use std::sync::LazyLock;

// First ``` block, with or without an `html` tag.
static FENCED_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:html)?(.*?)```").ok());

/// The interior of the first fenced block, trimmed, or the whole reply
/// trimmed when there is none. Never fails; an empty block yields "".
pub fn extract(raw: &str) -> String {
    FENCED_BLOCK
        .as_ref()
        .and_then(|re| re.captures(raw))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or_else(|| raw.trim())
        .to_string()
}
