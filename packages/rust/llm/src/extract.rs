//! Parsing of bracket-delimited model output.
//!
//! The question and scoring prompts instruct the model to wrap each usable
//! piece of output in square brackets; everything outside brackets is
//! ignored. Parsing never fails hard — zero matches just means the stage is
//! retried on a later tick.

use std::sync::LazyLock;

use regex::Regex;

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]]+)\]").expect("static pattern"));

static SCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\s*score\s*[:=]?\s*(-?\d+(?:\.\d+)?)\s*\]").expect("static pattern")
});

static BARE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*(-?\d+(?:\.\d+)?)\s*\]").expect("static pattern"));

/// Extract every bracketed segment, trimmed, in order of appearance.
pub fn extract_bracketed(text: &str) -> Vec<String> {
    BRACKETED
        .captures_iter(text)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Extract a numeric score from output like `[Score: 87]`.
///
/// Accepts a bare bracketed number as a fallback since models routinely
/// drop the label.
pub fn extract_score(text: &str) -> Option<f64> {
    let captures = SCORE
        .captures(text)
        .or_else(|| BARE_NUMBER.captures(text))?;
    captures[1].parse().ok()
}
