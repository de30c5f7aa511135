// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod scheduler;
pub mod source;
pub mod types;

use once_cell::sync::OnceCell;
use regex::Regex;

pub use scheduler::{CycleReport, Driver, DriverState};
pub use source::SourceKind;
pub use types::{Fetcher, PublishableRecord, RawRecord};

const MAX_TEXT_CHARS: usize = 1500;

/// Normalize feed text: decode HTML entities, strip tags, unify quotes,
/// collapse whitespace, cap length.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("static regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (incl. NBSP left over from &nbsp;)
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"[\s\u{a0}]+").expect("static regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_collapses_ws_and_strips_tags() {
        let s = "  <b>Hello,</b>&nbsp;&nbsp; world!  ";
        assert_eq!(normalize_text(s), "Hello, world!");
    }

    #[test]
    fn normalize_text_unifies_quotes() {
        let s = "&ldquo;ok&rdquo; \u{2018}fine\u{2019}";
        assert_eq!(normalize_text(s), r#""ok" 'fine'"#);
    }

    #[test]
    fn normalize_text_caps_length() {
        let long = "x".repeat(MAX_TEXT_CHARS + 20);
        assert_eq!(normalize_text(&long).chars().count(), MAX_TEXT_CHARS);
    }
}
