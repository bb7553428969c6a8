//! Markup → vnode parsing.
//!
//! A three-state scanner (tag attributes / comment body / plain text) with a
//! constrained, practical tag-name character set (ASCII `[A-Za-z0-9:_-]`).
//!
//! Contract:
//! - Permissive by design: malformed markup is never rejected; the scanner
//!   recovers and keeps going.
//! - Text and attribute values are stored verbatim (no entity decoding), so
//!   serialization round-trips.
//! - Adjacent text vnodes are not merged here; normalization is a separate,
//!   explicitly invoked step.
//! - Non-void content is consumed up to the matching close tag with a
//!   same-name nesting depth counter; raw-text tags take their content as one
//!   verbatim text child.

use crate::tags::{Namespace, foreign_namespace, is_rawtext};
use crate::vnode::{VNodeId, VTree};
use memchr::memchr;

const COMMENT_START: &str = "<!--";
const COMMENT_END: &str = "-->";

fn is_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' || byte == b':'
}

impl VTree {
    /// Parse markup into detached vnodes (one per top-level construct).
    pub fn parse_markup(&mut self, markup: &str) -> Vec<VNodeId> {
        let mut out = Vec::new();
        self.parse_fragment(markup, Namespace::Html, &mut out);
        out
    }

    fn parse_fragment(&mut self, input: &str, namespace: Namespace, out: &mut Vec<VNodeId>) {
        let bytes = input.as_bytes();
        let len = bytes.len();
        let mut i = 0;
        // Invariant: slice endpoints always land on UTF-8 char boundaries; we
        // only cut at ASCII structural bytes.
        while i < len {
            let construct = next_construct(bytes, i);
            let text_end = construct.map_or(len, |pos| pos);
            if text_end > i {
                debug_assert!(input.is_char_boundary(i));
                debug_assert!(input.is_char_boundary(text_end));
                let text = self.create_text(&input[i..text_end]);
                out.push(text);
                i = text_end;
            }
            let Some(pos) = construct else {
                break;
            };
            debug_assert_eq!(bytes[pos], b'<');
            if input[pos..].starts_with(COMMENT_START) {
                i = self.parse_comment(input, pos, out);
            } else if bytes[pos + 1] == b'/' {
                // Stray close tag: permissive recovery skips it.
                log::trace!(target: "vtree.parse", "skipping stray close tag at byte {pos}");
                i = match memchr(b'>', &bytes[pos..]) {
                    Some(rel) => pos + rel + 1,
                    None => len,
                };
            } else {
                i = self.parse_element(input, pos, namespace, out);
            }
        }
    }

    fn parse_comment(&mut self, input: &str, start: usize, out: &mut Vec<VNodeId>) -> usize {
        let body_start = start + COMMENT_START.len();
        match input[body_start..].find(COMMENT_END) {
            Some(rel) => {
                let comment = self.create_comment(&input[body_start..body_start + rel]);
                out.push(comment);
                body_start + rel + COMMENT_END.len()
            }
            None => {
                // Unterminated comment runs to end of input.
                let comment = self.create_comment(&input[body_start..]);
                out.push(comment);
                input.len()
            }
        }
    }

    fn parse_element(
        &mut self,
        input: &str,
        start: usize,
        namespace: Namespace,
        out: &mut Vec<VNodeId>,
    ) -> usize {
        let bytes = input.as_bytes();
        let len = bytes.len();
        let name_start = start + 1;
        let mut j = name_start;
        while j < len && is_name_byte(bytes[j]) {
            j += 1;
        }
        let tag = input[name_start..j].to_ascii_lowercase();

        let (attributes, self_closing, content_start) = scan_attributes(input, j);

        let namespace = foreign_namespace(&tag).unwrap_or(namespace);
        let is_void = self.tags.classify_void(&tag, &input[content_start..]);
        let element = self.create_element(&tag, namespace, is_void);
        for (name, value) in &attributes {
            self.apply_attr_value(element, name, Some(value.as_deref().unwrap_or("")));
        }
        out.push(element);

        if is_void || self_closing {
            return content_start;
        }

        let (content_end, resume) = match find_balanced_close(input, content_start, &tag) {
            Some(found) => found,
            // Missing close tag: the remainder is the content (implicit close).
            None => (len, len),
        };
        let content = &input[content_start..content_end];
        if is_rawtext(&tag) {
            if !content.is_empty() {
                let text = self.create_text(content);
                self.push_child(element, text);
            }
        } else {
            let mut children = Vec::new();
            self.parse_fragment(content, namespace, &mut children);
            for child in children {
                self.push_child(element, child);
            }
        }
        resume
    }
}

/// Position of the next construct-starting `<` at or after `from`, or `None`.
///
/// A `<` starts a construct when followed by a name-start character (open
/// tag), `/` (close tag), or the comment opener; any other `<` is text.
fn next_construct(bytes: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() {
        let rel = memchr(b'<', &bytes[i..])?;
        let pos = i + rel;
        match bytes.get(pos + 1) {
            Some(next) if next.is_ascii_alphabetic() || *next == b'/' => return Some(pos),
            Some(b'!') if bytes[pos..].starts_with(b"<!--") => return Some(pos),
            _ => i = pos + 1,
        }
    }
    None
}

/// Scan a tag's attribute list starting just after the tag name.
///
/// Returns the raw attributes (boolean attributes carry `None`), the
/// self-closing flag, and the offset just past the closing `>`.
fn scan_attributes(input: &str, from: usize) -> (Vec<(String, Option<String>)>, bool, usize) {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut attributes: Vec<(String, Option<String>)> = Vec::new();
    let mut self_closing = false;
    let mut k = from;

    loop {
        while k < len && bytes[k].is_ascii_whitespace() {
            k += 1;
        }
        if k >= len {
            break;
        }
        if bytes[k] == b'>' {
            k += 1;
            break;
        }
        if bytes[k] == b'/' {
            if k + 1 < len && bytes[k + 1] == b'>' {
                self_closing = true;
                k += 2;
                break;
            }
            k += 1;
            continue;
        }
        let name_start = k;
        while k < len && is_name_byte(bytes[k]) {
            k += 1;
        }
        if name_start == k {
            k += 1;
            continue;
        }
        let name = input[name_start..k].to_ascii_lowercase();

        while k < len && bytes[k].is_ascii_whitespace() {
            k += 1;
        }
        let value = if k < len && bytes[k] == b'=' {
            k += 1;
            while k < len && bytes[k].is_ascii_whitespace() {
                k += 1;
            }
            if k < len && (bytes[k] == b'"' || bytes[k] == b'\'') {
                let quote = bytes[k];
                k += 1;
                let value_start = k;
                while k < len && bytes[k] != quote {
                    k += 1;
                }
                debug_assert!(input.is_char_boundary(value_start));
                debug_assert!(input.is_char_boundary(k));
                let raw = &input[value_start..k];
                if k < len {
                    k += 1;
                }
                Some(raw.to_string())
            } else {
                let value_start = k;
                while k < len && !bytes[k].is_ascii_whitespace() && bytes[k] != b'>' {
                    if bytes[k] == b'/' && k + 1 < len && bytes[k + 1] == b'>' {
                        break;
                    }
                    k += 1;
                }
                Some(input[value_start..k].to_string())
            }
        } else {
            None
        };
        attributes.push((name, value));
    }
    (attributes, self_closing, k)
}

/// Find the close tag matching an open `name` tag, honoring same-name
/// nesting: an inner open tag of the same name increments the depth, a close
/// tag of the same name decrements it.
///
/// Returns `(content_end, resume)` offsets, or `None` when the input ends
/// before the tag closes.
fn find_balanced_close(input: &str, from: usize, name: &str) -> Option<(usize, usize)> {
    let bytes = input.as_bytes();
    let name = name.as_bytes();
    let len = bytes.len();
    let n = name.len();
    let mut depth = 1usize;
    let mut i = from;
    while i < len {
        let rel = memchr(b'<', &bytes[i..])?;
        let pos = i + rel;
        if pos + 1 >= len {
            return None;
        }
        if bytes[pos + 1] == b'/' {
            let after = pos + 2 + n;
            if after <= len && bytes[pos + 2..after].eq_ignore_ascii_case(name) {
                let mut k = after;
                while k < len && bytes[k].is_ascii_whitespace() {
                    k += 1;
                }
                if k < len && bytes[k] == b'>' {
                    depth -= 1;
                    if depth == 0 {
                        return Some((pos, k + 1));
                    }
                    i = k + 1;
                    continue;
                }
            }
        } else {
            let after = pos + 1 + n;
            if after <= len
                && bytes[pos + 1..after].eq_ignore_ascii_case(name)
                && bytes
                    .get(after)
                    .is_none_or(|b| b.is_ascii_whitespace() || *b == b'>' || *b == b'/')
            {
                // Same-name inner open tag; self-closing ones don't nest.
                let close = memchr(b'>', &bytes[after..]).map(|rel| after + rel);
                let self_closed =
                    close.is_some_and(|end| end > after && bytes[end - 1] == b'/');
                if !self_closed {
                    depth += 1;
                }
                i = close.map_or(len, |end| end + 1);
                continue;
            }
        }
        i = pos + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vnode::{NodeKind, TreeConfig};

    fn parse(markup: &str) -> (VTree, Vec<VNodeId>) {
        let mut tree = VTree::new(TreeConfig::default());
        let roots = tree.parse_markup(markup);
        (tree, roots)
    }

    #[test]
    fn parse_simple_nested_elements() {
        let (tree, roots) = parse("<div id=\"a\"><span>x</span></div>");
        assert_eq!(roots.len(), 1);
        let div = tree.node(roots[0]);
        assert_eq!(div.kind, NodeKind::Element);
        assert_eq!(div.tag, "div");
        assert_eq!(div.attrs.get("id"), Some("a"));
        let span_id = tree.children(roots[0])[0];
        let span = tree.node(span_id);
        assert_eq!(span.tag, "span");
        let text_id = tree.children(span_id)[0];
        assert_eq!(tree.node(text_id).kind, NodeKind::Text);
        assert_eq!(tree.node(text_id).text, "x");
    }

    #[test]
    fn parse_handles_nested_same_name_tags() {
        let (tree, roots) = parse("<div>a<div>b</div>c</div><p>after</p>");
        assert_eq!(roots.len(), 2, "expected outer div to close before <p>");
        let outer = roots[0];
        let children = tree.children(outer).to_vec();
        assert_eq!(children.len(), 3);
        assert_eq!(tree.node(children[0]).text, "a");
        assert_eq!(tree.node(children[1]).tag, "div");
        assert_eq!(tree.node(children[2]).text, "c");
        assert_eq!(tree.node(roots[1]).tag, "p");
    }

    #[test]
    fn parse_void_elements_take_no_children() {
        let (tree, roots) = parse("<br>text<img src=\"x.png\">");
        assert_eq!(roots.len(), 3);
        assert!(tree.node(roots[0]).is_void);
        assert!(tree.children(roots[0]).is_empty());
        assert_eq!(tree.node(roots[1]).text, "text");
        assert_eq!(tree.node(roots[2]).attrs.get("src"), Some("x.png"));
    }

    #[test]
    fn parse_rawtext_content_is_one_verbatim_text_child() {
        let (tree, roots) = parse("<script>if (a < b) { run(); }</script>");
        assert_eq!(roots.len(), 1);
        let children = tree.children(roots[0]);
        assert_eq!(children.len(), 1);
        assert_eq!(tree.node(children[0]).kind, NodeKind::Text);
        assert_eq!(tree.node(children[0]).text, "if (a < b) { run(); }");
    }

    #[test]
    fn parse_comment_preserves_body_verbatim() {
        let (tree, roots) = parse("<!-- keep <this> -->");
        assert_eq!(roots.len(), 1);
        assert_eq!(tree.node(roots[0]).kind, NodeKind::Comment);
        assert_eq!(tree.node(roots[0]).text, " keep <this> ");
    }

    #[test]
    fn parse_unterminated_comment_runs_to_end() {
        let (tree, roots) = parse("<!--dangling");
        assert_eq!(roots.len(), 1);
        assert_eq!(tree.node(roots[0]).text, "dangling");
    }

    #[test]
    fn parse_boolean_and_unquoted_attributes() {
        let (tree, roots) = parse("<input disabled type=text value='a b'>");
        let input = tree.node(roots[0]);
        assert_eq!(input.attrs.get("disabled"), Some(""));
        assert_eq!(input.attrs.get("type"), Some("text"));
        assert_eq!(input.attrs.get("value"), Some("a b"));
    }

    #[test]
    fn parse_stray_close_tag_is_skipped() {
        let (tree, roots) = parse("a</b>c");
        assert_eq!(roots.len(), 2);
        assert_eq!(tree.node(roots[0]).text, "a");
        assert_eq!(tree.node(roots[1]).text, "c");
    }

    #[test]
    fn parse_lone_angle_bracket_is_text() {
        let (tree, roots) = parse("1 < 2");
        assert_eq!(roots.len(), 1, "expected bare < kept as text, got {roots:?}");
        assert_eq!(tree.node(roots[0]).text, "1 < 2");
    }

    #[test]
    fn parse_adjacent_text_nodes_are_not_merged() {
        let (tree, roots) = parse("a</x>b");
        // Two text vnodes survive parsing; normalize is a separate step.
        assert_eq!(roots.len(), 2);
        assert_eq!(tree.node(roots[0]).kind, NodeKind::Text);
        assert_eq!(tree.node(roots[1]).kind, NodeKind::Text);
    }

    #[test]
    fn parse_missing_close_tag_consumes_remainder() {
        let (tree, roots) = parse("<div>a<span>b");
        assert_eq!(roots.len(), 1);
        let div = roots[0];
        let children = tree.children(div).to_vec();
        assert_eq!(children.len(), 2);
        assert_eq!(tree.node(children[1]).tag, "span");
    }

    #[test]
    fn parse_foreign_namespace_is_inherited() {
        let (tree, roots) = parse("<svg><circle r=\"4\"></circle></svg>");
        let svg = roots[0];
        assert_eq!(tree.node(svg).namespace, Namespace::Svg);
        let circle = tree.children(svg)[0];
        assert_eq!(tree.node(circle).namespace, Namespace::Svg);
    }

    #[test]
    fn parse_unknown_tag_learns_voidness_from_close_scan() {
        let (tree, roots) = parse("<x-a>inner</x-a><x-b><p>next</p>");
        assert_eq!(tree.node(roots[0]).tag, "x-a");
        assert!(!tree.node(roots[0]).is_void);
        assert_eq!(tree.children(roots[0]).len(), 1);
        // x-b has no close tag anywhere ahead: classified void.
        assert!(tree.node(roots[1]).is_void);
        assert!(tree.children(roots[1]).is_empty());
    }

    #[test]
    fn parse_self_closed_non_void_takes_no_children() {
        let (tree, roots) = parse("<div/><p>x</p>");
        assert_eq!(roots.len(), 2);
        assert!(tree.children(roots[0]).is_empty());
        assert!(!tree.node(roots[0]).is_void);
        assert_eq!(tree.node(roots[1]).tag, "p");
    }

    #[test]
    fn parse_self_closing_same_name_inner_tag_does_not_nest() {
        let (tree, roots) = parse("<div><div/></div>");
        assert_eq!(roots.len(), 1);
        let children = tree.children(roots[0]);
        assert_eq!(children.len(), 1);
        assert!(tree.children(children[0]).is_empty());
    }

    #[test]
    fn parse_preserves_utf8_text() {
        let (tree, roots) = parse("<p>caf\u{e9} \u{1f600}</p>");
        let text = tree.children(roots[0])[0];
        assert_eq!(tree.node(text).text, "caf\u{e9} \u{1f600}");
    }

    #[test]
    fn parse_keeps_entities_verbatim() {
        let (tree, roots) = parse("<p>a &amp; b</p>");
        let text = tree.children(roots[0])[0];
        assert_eq!(
            tree.node(text).text,
            "a &amp; b",
            "expected escaped content stored verbatim"
        );
    }
}
