//! Shared tag classification: void elements, raw-text elements, foreign
//! namespaces, and the first-encounter void memo.
//!
//! Invariant: the memo is idempotent across repeated parses — once a tag name
//! is classified, later classifications return the memoized answer.

use memchr::memchr;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    Html,
    Svg,
    MathMl,
}

fn builtin_void(name: &str) -> Option<bool> {
    match name {
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta"
        | "param" | "source" | "track" | "wbr" => Some(true),
        // Common non-void names are pre-seeded so a truncated document does
        // not memoize them as void.
        "a" | "b" | "body" | "button" | "div" | "em" | "form" | "h1" | "h2" | "h3" | "h4"
        | "h5" | "h6" | "head" | "html" | "i" | "label" | "li" | "ol" | "option" | "p"
        | "script" | "select" | "span" | "strong" | "style" | "table" | "td" | "textarea"
        | "th" | "tr" | "ul" => Some(false),
        _ => None,
    }
}

/// Tag names whose content is one verbatim text child.
pub fn is_rawtext(name: &str) -> bool {
    matches!(name, "script" | "style")
}

/// Static foreign-namespace roots.
pub fn foreign_namespace(name: &str) -> Option<Namespace> {
    match name {
        "svg" => Some(Namespace::Svg),
        "math" => Some(Namespace::MathMl),
        _ => None,
    }
}

/// Injectable classification table with a documented lifecycle:
/// [`TagTable::new`] seeds the builtin sets, [`TagTable::reset_memo`] clears
/// everything learned since.
#[derive(Debug, Default)]
pub struct TagTable {
    memo: HashMap<String, bool>,
}

impl TagTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Memoized answer for a known tag, builtin or learned.
    pub fn known_void(&self, name: &str) -> Option<bool> {
        builtin_void(name).or_else(|| self.memo.get(name).copied())
    }

    /// Classify a tag name, learning from `remainder` (the input after the
    /// open tag) on first encounter: a matching close tag anywhere ahead
    /// means non-void.
    pub fn classify_void(&mut self, name: &str, remainder: &str) -> bool {
        if let Some(known) = self.known_void(name) {
            return known;
        }
        let is_void = !has_close_tag(remainder, name);
        log::trace!(target: "vtree.tags", "memoizing {name:?} as void={is_void}");
        self.memo.insert(name.to_string(), is_void);
        is_void
    }

    /// Drop everything learned via [`TagTable::classify_void`].
    pub fn reset_memo(&mut self) {
        self.memo.clear();
    }
}

/// Scan for `</name` (ASCII case-insensitive) followed by whitespace or `>`.
fn has_close_tag(haystack: &str, name: &str) -> bool {
    let hay = haystack.as_bytes();
    let name = name.as_bytes();
    let n = name.len();
    let mut i = 0;
    while i + n + 2 <= hay.len() {
        let Some(rel) = memchr(b'<', &hay[i..]) else {
            return false;
        };
        i += rel;
        if i + n + 2 > hay.len() {
            return false;
        }
        if hay[i + 1] == b'/' && hay[i + 2..i + 2 + n].eq_ignore_ascii_case(name) {
            let mut k = i + 2 + n;
            while k < hay.len() && hay[k].is_ascii_whitespace() {
                k += 1;
            }
            if k < hay.len() && hay[k] == b'>' {
                return true;
            }
        }
        i += 1;
    }
    false
}
