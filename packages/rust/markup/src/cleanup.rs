//! Text cleanup passes for feed markup and generated content.
//!
//! Each pass is a function `&str -> String`; callers chain the ones they need.

use std::sync::LazyLock;

use regex::Regex;

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

// ---------------------------------------------------------------------------
// Feed markup
// ---------------------------------------------------------------------------

/// Remove CDATA wrappers, keeping their content.
pub fn strip_cdata(text: &str) -> String {
    text.replace(CDATA_OPEN, "").replace(CDATA_CLOSE, "")
}

/// Split description markup into paragraph texts.
///
/// Splits on closing `</p>` tags, drops opening `<p ...>` tags and line breaks,
/// and skips fragments that end up blank.
pub fn paragraph_fragments(markup: &str) -> Vec<String> {
    static P_CLOSE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)</p\s*>").expect("valid regex"));
    static P_OPEN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)<p(?:\s[^>]*)?>").expect("valid regex"));
    static BR_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));

    P_CLOSE_RE
        .split(markup)
        .filter(|fragment| !fragment.trim().is_empty())
        .map(|fragment| {
            let without_p = P_OPEN_RE.replace_all(fragment, "");
            let without_br = BR_RE.replace_all(&without_p, " ");
            collapse_whitespace(&without_br)
        })
        .filter(|p| !p.is_empty())
        .collect()
}

/// Remove every tag, leaving plain text with collapsed whitespace.
pub fn strip_tags(markup: &str) -> String {
    static TAG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

    collapse_whitespace(&TAG_RE.replace_all(&strip_cdata(markup), " "))
}

/// Collapse whitespace runs to a single space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Generated content
// ---------------------------------------------------------------------------

/// Drop `<think>` / `</think>` markers some models wrap their output in.
pub fn strip_reasoning_markers(text: &str) -> String {
    text.replace("<think>", "")
        .replace("</think>", "")
        .trim()
        .to_string()
}

/// Remove markdown emphasis and quoting from short generated copy.
pub fn clean_generated_text(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !matches!(c, '*' | '"' | '\''))
        .collect();
    collapse_whitespace(&stripped)
}
