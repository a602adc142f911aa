//! Output normalization and code block extraction.
//!
//! Workers format the same answer differently (trailing spaces, extra blank
//! lines, tab indentation). Comparison happens on normalized text so those
//! differences register as formatting, not content.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static HORIZONTAL_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\x0B\x0C]+").unwrap());

static EXCESS_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ ]?([A-Za-z0-9_+#.-]*)[^\n]*\n(.*?)```").unwrap()
});

/// A fenced code block extracted from an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    /// Language tag after the opening fence (empty when absent)
    pub language: String,
    pub body: String,
}

/// Normalize an output for comparison.
///
/// - runs of horizontal whitespace collapse to a single space
/// - each line is trimmed
/// - three or more consecutive newlines collapse to exactly two
/// - leading/trailing whitespace of the whole text is removed
///
/// ```
/// use ensemble_domain::conflict::normalize;
///
/// assert_eq!(normalize("  a \t b  \n\n\n\nc  "), "a b\n\nc");
/// ```
pub fn normalize(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let lines: Vec<String> = text
        .split('\n')
        .map(|line| HORIZONTAL_WS.replace_all(line, " ").trim().to_string())
        .collect();
    let joined = lines.join("\n");
    EXCESS_NEWLINES
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}

/// Extract fenced code blocks in order of appearance.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    CODE_FENCE
        .captures_iter(text)
        .map(|caps| CodeBlock {
            language: caps
                .get(1)
                .map(|m| m.as_str().to_lowercase())
                .unwrap_or_default(),
            body: caps
                .get(2)
                .map(|m| m.as_str().trim_end().to_string())
                .unwrap_or_default(),
        })
        .collect()
}

/// Split text into blank-line separated passages.
///
/// Fenced code blocks are kept whole even when they contain blank lines.
/// Passages keep their original formatting; compare them through
/// [`normalize`].
pub fn passages(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            current.push(line);
            continue;
        }
        if !in_fence && line.trim().is_empty() {
            if !current.is_empty() {
                out.push(current.join("\n"));
                current.clear();
            }
            continue;
        }
        current.push(line);
    }
    if !current.is_empty() {
        out.push(current.join("\n"));
    }
    out
}
