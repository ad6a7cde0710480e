//! Splits raw model output into the answer shown to the user and the
//! reasoning trace the model wrapped in `<think>` tags.

use once_cell::sync::Lazy;
use regex::Regex;

static THINK_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<think>.*?</think>").expect("think span pattern is valid")
});
static THINK_CAPTURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<think>(.*?)</think>").expect("think capture pattern is valid")
});
static WHITESPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+").expect("whitespace pattern is valid")
});
static MARKUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<[^>]*>").expect("markup pattern is valid")
});

/// Text between the first `<think>` and the first `</think>` after it.
/// Later pairs are ignored; returns an empty string when there is no pair.
pub fn extract_trace(text: &str) -> String {
    THINK_CAPTURE.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Drops every `<think>...</think>` span and nothing else.
pub fn remove_trace(text: &str) -> String {
    THINK_SPAN.replace_all(text, "").into_owned()
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Visible answer: trace spans removed, whitespace collapsed, remaining
/// markup and backslashes stripped.
pub fn clean(text: &str) -> String {
    let without_trace = remove_trace(text);
    let collapsed = collapse_whitespace(&without_trace);
    let without_markup = MARKUP.replace_all(&collapsed, "");
    let without_slashes = without_markup.replace('\\', "");
    // markup and backslash removal can leave doubled or edge spaces behind
    collapse_whitespace(&without_slashes)
}

/// `(clean(text), extract_trace(text))`.
pub fn partition(text: &str) -> (String, String) {
    (clean(text), extract_trace(text))
}
