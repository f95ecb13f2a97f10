//! Post-processing: deterministic cleanup of model translations.
//!
//! Even well-prompted chat models wrap their answer in artefacts the prompt
//! did not ask for:
//!
//! - echoing the quotes the instruction put around the source text
//!   (`'Bonjour'` instead of `Bonjour`)
//! - wrapping the answer in a ```` ``` ```` fence
//! - Windows-style `\r\n` line endings
//! - zero-width characters that render as tofu in the overlay font
//!
//! Each rule is a pure `&str → String` function. Error placeholders are
//! never cleaned.

use crate::prompts::is_translation_error;
use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a raw model answer for `source`.
///
/// Rules (applied in order):
/// 1. Strip an outer code fence
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim surrounding whitespace, except on an end where the source itself
///    has whitespace
/// 4. Strip a wrapping pair of quotes when the source had none
/// 5. Remove invisible Unicode (zero-width spaces, BOM, soft hyphens)
pub fn clean_translation(source: &str, translated: &str) -> String {
    if is_translation_error(translated) {
        return translated.to_string();
    }
    let s = strip_fences(translated);
    let s = normalise_line_endings(&s);
    let s = trim_like_source(source, &s);
    let s = strip_echoed_quotes(source, &s);
    remove_invisible_chars(&s)
}

// ── Rule 1: Strip outer fences ───────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\n(.*)\n```\s*$").unwrap());

fn strip_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim like the source ─────────────────────────────────────────────

fn trim_like_source(source: &str, input: &str) -> String {
    let mut s = input;
    if !source.starts_with(char::is_whitespace) {
        s = s.trim_start();
    }
    if !source.ends_with(char::is_whitespace) {
        s = s.trim_end();
    }
    s.to_string()
}

// ── Rule 4: Strip echoed quotes ──────────────────────────────────────────────

const QUOTE_PAIRS: [(char, char); 5] = [
    ('\'', '\''),
    ('"', '"'),
    ('“', '”'),
    ('«', '»'),
    ('「', '」'),
];

fn strip_echoed_quotes(source: &str, input: &str) -> String {
    let src = source.trim();
    for (open, close) in QUOTE_PAIRS {
        let wrapped = input.starts_with(open) && input.ends_with(close);
        let source_wrapped = src.starts_with(open) && src.ends_with(close);
        if wrapped && !source_wrapped && input.chars().count() >= 2 {
            let inner = &input[open.len_utf8()..input.len() - close.len_utf8()];
            return inner.trim().to_string();
        }
    }
    input.to_string()
}

// ── Rule 5: Remove invisible characters ──────────────────────────────────────

static RE_INVISIBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new("[\u{200B}\u{200C}\u{200D}\u{2060}\u{FEFF}\u{00AD}]").unwrap());

fn remove_invisible_chars(input: &str) -> String {
    RE_INVISIBLE.replace_all(input, "").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::translation_error;

    #[test]
    fn strips_echoed_single_quotes() {
        assert_eq!(clean_translation("Hello", "'Bonjour'"), "Bonjour");
    }

    #[test]
    fn keeps_quotes_present_in_source() {
        assert_eq!(clean_translation("\"Hello\"", "\"Bonjour\""), "\"Bonjour\"");
    }

    #[test]
    fn strips_guillemets() {
        assert_eq!(clean_translation("Hello", "« Bonjour »"), "Bonjour");
    }

    #[test]
    fn strips_outer_fence() {
        assert_eq!(clean_translation("Hi", "```text\nSalut\n```"), "Salut");
    }

    #[test]
    fn normalises_crlf_and_trims() {
        assert_eq!(
            clean_translation("a\n\nb", "  ligne un\r\n\r\nligne deux \n"),
            "ligne un\n\nligne deux"
        );
    }

    #[test]
    fn whitespace_the_source_carries_is_kept() {
        assert_eq!(clean_translation("Total: ", "Total : "), "Total : ");
        assert_eq!(clean_translation("  - item", "  - élément\n"), "  - élément");
        assert_eq!(clean_translation("\tcode", " code "), " code");
    }

    #[test]
    fn removes_zero_width_chars() {
        assert_eq!(clean_translation("x", "Bon\u{200B}jour\u{FEFF}"), "Bonjour");
    }

    #[test]
    fn never_touches_error_placeholders() {
        let e = translation_error("'quoted' detail ");
        assert_eq!(clean_translation("x", &e), e);
    }

    #[test]
    fn single_quote_char_is_kept() {
        assert_eq!(clean_translation("x", "'"), "'");
    }
}
