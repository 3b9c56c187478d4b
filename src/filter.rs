use regex::{Regex, RegexBuilder};

use crate::query::sanitize_search;

/// Highlights occurrences of the active search term in rendered messages
#[derive(Clone, Debug)]
pub struct SearchHighlight {
    /// The sanitized term
    pub term: String,
    compiled: Regex,
}

impl SearchHighlight {
    /// `None` when the raw input sanitizes to nothing
    pub fn new(raw: &str) -> Option<Self> {
        let term = sanitize_search(raw)?;
        let compiled = RegexBuilder::new(&regex::escape(&term))
            .case_insensitive(true)
            .build()
            .ok()?;
        Some(Self { term, compiled })
    }

    /// Split `text` into `(segment, is_match)` runs covering all of it
    pub fn split<'t>(&self, text: &'t str) -> Vec<(&'t str, bool)> {
        let mut parts = Vec::new();
        let mut last = 0;
        for m in self.compiled.find_iter(text) {
            if m.start() > last {
                parts.push((&text[last..m.start()], false));
            }
            parts.push((m.as_str(), true));
            last = m.end();
        }
        if last < text.len() {
            parts.push((&text[last..], false));
        }
        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_term_disables_highlight() {
        assert!(SearchHighlight::new("   ").is_none());
        assert!(SearchHighlight::new("\n\t").is_none());
    }

    #[test]
    fn test_split_case_insensitive() {
        let hl = SearchHighlight::new(" timeout ").unwrap();
        assert_eq!(hl.term, "timeout");
        assert_eq!(
            hl.split("Timeout after timeout."),
            vec![("Timeout", true), (" after ", false), ("timeout", true), (".", false)]
        );
        assert_eq!(hl.split("a TIMEOUT"), vec![("a ", false), ("TIMEOUT", true)]);
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let hl = SearchHighlight::new("a.b(").unwrap();
        assert_eq!(hl.split("axb("), vec![("axb(", false)]);
        assert_eq!(hl.split("xa.b("), vec![("x", false), ("a.b(", true)]);
    }

    #[test]
    fn test_no_match_returns_whole_text() {
        let hl = SearchHighlight::new("zzz").unwrap();
        assert_eq!(hl.split("plain"), vec![("plain", false)]);
        assert!(hl.split("").is_empty());
    }
}
