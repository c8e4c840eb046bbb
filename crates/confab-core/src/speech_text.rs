//! Text preparation for speech — strips markdown so assistant replies read
//! naturally when synthesized.
//!
//! Pure functions, no I/O.

use regex::Regex;
use std::sync::LazyLock;

// Compiled once, reused across calls.
static RE_FENCED_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static RE_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(?:^|\n)(\|[^\n]+\|(?:\n\|[^\n]+\|)*)").unwrap());
static RE_INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`[^`]+`").unwrap());
static RE_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[\s]*[-*_]{3,}[\s]*$").unwrap());
static RE_BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static RE_ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
static RE_HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#{1,6}\s*").unwrap());
static RE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());
static RE_LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[\s]*(?:[-*]|\d+\.)\s+").unwrap());
static RE_LEADING_DOT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\.\s*").unwrap());
static RE_DOUBLE_DOT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.\s*\.").unwrap());
static RE_MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

/// Strip markdown formatting so a reply reads naturally when spoken.
///
/// Fenced code and tables become short spoken placeholders; inline code is
/// dropped; bold/italic/headings/links are unwrapped; list markers become
/// sentence breaks; horizontal rules disappear; whitespace collapses.
pub fn clean_spoken_text(text: &str) -> String {
    // Tables first — they can appear inside fences otherwise stripped below
    let mut s = RE_TABLE
        .replace_all(text, "\nSee the table in the chat.\n")
        .into_owned();
    s = RE_FENCED_CODE
        .replace_all(&s, " See the code in the chat. ")
        .into_owned();
    s = RE_INLINE_CODE.replace_all(&s, "").into_owned();
    s = RE_RULE.replace_all(&s, "").into_owned();
    s = RE_BOLD.replace_all(&s, "$1").into_owned();
    s = RE_ITALIC.replace_all(&s, "$1").into_owned();
    s = RE_HEADING.replace_all(&s, "").into_owned();
    s = RE_LINK.replace_all(&s, "$1").into_owned();
    s = RE_LIST_MARKER.replace_all(&s, ". ").into_owned();
    s = RE_LEADING_DOT.replace(&s, "").into_owned();
    s = RE_DOUBLE_DOT.replace_all(&s, ".").into_owned();
    s = RE_MULTI_SPACE.replace_all(&s, " ").into_owned();

    s.trim().to_string()
}

/// Whether cleaned text is worth sending to the synthesizer at all.
pub fn is_speakable(text: &str) -> bool {
    text.len() >= 2 && text.chars().any(|c| c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_unchanged() {
        assert_eq!(
            clean_spoken_text("Hello, how are you today?"),
            "Hello, how are you today?"
        );
    }

    #[test]
    fn code_blocks_become_placeholder() {
        let input = "before ```rust\nfn main() {}\n``` after";
        assert_eq!(
            clean_spoken_text(input),
            "before See the code in the chat. after"
        );
    }

    #[test]
    fn tables_become_placeholder() {
        let out = clean_spoken_text("intro\n| a | b |\n| 1 | 2 |\nafter");
        assert!(out.contains("See the table in the chat."));
        assert!(out.contains("after"));
    }

    #[test]
    fn inline_code_dropped() {
        assert_eq!(clean_spoken_text("use `println!` here"), "use here");
    }

    #[test]
    fn emphasis_unwrapped() {
        assert_eq!(clean_spoken_text("very **bold** and *subtle*"), "very bold and subtle");
    }

    #[test]
    fn headings_and_links_unwrapped() {
        assert_eq!(clean_spoken_text("## Intro"), "Intro");
        assert_eq!(
            clean_spoken_text("click [here](https://example.com) now"),
            "click here now"
        );
    }

    #[test]
    fn list_markers_become_breaks() {
        let out = clean_spoken_text("items:\n- first\n2. second");
        assert!(out.contains(". first"));
        assert!(out.contains(". second"));
    }

    #[test]
    fn rules_removed_and_whitespace_collapsed() {
        let out = clean_spoken_text("above\n---\nbelow    now");
        assert!(!out.contains("---"));
        assert!(out.contains("below now"));
    }

    #[test]
    fn empty_input() {
        assert_eq!(clean_spoken_text(""), "");
    }

    #[test]
    fn speakable_filter() {
        assert!(is_speakable("hi there"));
        assert!(!is_speakable(""));
        assert!(!is_speakable("!"));
        assert!(!is_speakable("?!."));
    }
}
