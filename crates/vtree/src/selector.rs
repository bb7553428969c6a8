//! Selector matching against the shadow tree.
//!
//! Matching one node against a comma-separated selector list, right-to-left:
//! the rightmost compound must match the candidate, then the walk moves
//! outward per combinator. A leading `>`/`+`/`~` is validated against an
//! explicit related node instead of the structural parent, which is what
//! scoped queries hang off.
//!
//! Contract: matching never raises. An unparseable selector, a malformed nth
//! expression, or missing structural context (no parent where one is needed)
//! all resolve to "no match".

use crate::vnode::{NodeKind, NodeState, VNodeId, VTree};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Combinator {
    Descendant,
    Child,
    Adjacent,
    General,
}

/// Right-hand value of an attribute filter. Unquoted values are coerced to
/// boolean/number for exact comparison; quoted values stay strings.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum AttrValue {
    Str(String),
    Bool(bool),
    Num(f64),
}

impl AttrValue {
    fn coerce(raw: &str) -> AttrValue {
        match raw {
            "true" => AttrValue::Bool(true),
            "false" => AttrValue::Bool(false),
            _ => match raw.parse::<f64>() {
                Ok(num) => AttrValue::Num(num),
                Err(_) => AttrValue::Str(raw.to_string()),
            },
        }
    }

    fn matches(&self, attr: &str) -> bool {
        match self {
            AttrValue::Str(expected) => attr == expected,
            AttrValue::Bool(expected) => {
                matches!(attr, "true" | "false") && (attr == "true") == *expected
            }
            AttrValue::Num(expected) => attr.parse::<f64>().is_ok_and(|n| n == *expected),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum AttrOp {
    Exists,
    Eq(AttrValue),
    Prefix(String),
    Suffix(String),
    Substring(String),
    Word(String),
    Hyphen(String),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct AttrFilter {
    name: String,
    op: AttrOp,
}

/// An `an+b` formula (`even` = `2n`, `odd` = `2n+1`, bare integer = `0n+b`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Nth {
    a: i64,
    b: i64,
}

impl Nth {
    fn parse(raw: &str) -> Option<Nth> {
        let raw = raw.trim().to_ascii_lowercase();
        match raw.as_str() {
            "even" => return Some(Nth { a: 2, b: 0 }),
            "odd" => return Some(Nth { a: 2, b: 1 }),
            _ => {}
        }
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        match compact.find('n') {
            None => compact.parse::<i64>().ok().map(|b| Nth { a: 0, b }),
            Some(pos) => {
                let a = match &compact[..pos] {
                    "" | "+" => 1,
                    "-" => -1,
                    coeff => coeff.parse::<i64>().ok()?,
                };
                let rest = &compact[pos + 1..];
                let b = if rest.is_empty() {
                    0
                } else {
                    let (sign, digits) = rest.split_at(1);
                    let magnitude = digits.parse::<i64>().ok()?;
                    match sign {
                        "+" => magnitude,
                        "-" => -magnitude,
                        _ => return None,
                    }
                };
                Some(Nth { a, b })
            }
        }
    }

    /// Whether the 1-based `index` is produced by the formula. Iterates
    /// candidate multiples, stopping as soon as the sequence provably
    /// diverges past the target. Overflow is divergence: a value outside
    /// the representable range can no longer hit the target, and matching
    /// must never panic.
    fn matches(&self, index: usize) -> bool {
        let index = index as i64;
        let mut k = 0i64;
        loop {
            let Some(value) = self
                .a
                .checked_mul(k)
                .and_then(|v| v.checked_add(self.b))
            else {
                return false;
            };
            if value == index {
                return true;
            }
            match self.a {
                0 => return false,
                a if a > 0 && value > index => return false,
                a if a < 0 && value < 1 => return false,
                _ => k += 1,
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Pseudo {
    FirstChild,
    LastChild,
    OnlyChild,
    FirstOfType,
    LastOfType,
    OnlyOfType,
    Empty,
    NthChild(Nth),
    NthLastChild(Nth),
    NthOfType(Nth),
    NthLastOfType(Nth),
    Not(Box<Compound>),
}

/// One AND-ed token: optional tag plus any number of id/class/attr/pseudo
/// filters.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrFilter>,
    pseudos: Vec<Pseudo>,
}

/// One complex selector: compounds with the combinator to the LEFT of each.
/// The first slot's combinator is the leading one, if any.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ComplexSelector {
    parts: Vec<(Option<Combinator>, Compound)>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SelectorList {
    selectors: Vec<ComplexSelector>,
}

// ---- parsing ----

/// Split on top-level commas (commas inside `[...]`/`(...)` are literal).
fn split_list(input: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth -= 1,
            ',' if depth == 0 => {
                out.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&input[start..]);
    out
}

pub(crate) fn parse_selector_list(input: &str) -> Option<SelectorList> {
    let mut selectors = Vec::new();
    for part in split_list(input) {
        selectors.push(parse_complex(part.trim())?);
    }
    if selectors.is_empty() {
        return None;
    }
    Some(SelectorList { selectors })
}

/// Tokenize one complex selector on whitespace/`>`/`+`/`~`, keeping
/// combinators explicit; those characters are literal inside `[...]`/`(...)`.
fn parse_complex(input: &str) -> Option<ComplexSelector> {
    if input.is_empty() {
        return None;
    }
    let mut parts: Vec<(Option<Combinator>, Compound)> = Vec::new();
    let mut pending: Option<Combinator> = None;
    let mut token = String::new();
    let mut depth = 0i32;

    let mut flush = |pending: &mut Option<Combinator>, token: &mut String| -> Option<bool> {
        if token.is_empty() {
            return Some(false);
        }
        let compound = parse_compound(token)?;
        parts.push((pending.take(), compound));
        token.clear();
        Some(true)
    };

    for c in input.chars() {
        match c {
            '[' | '(' => {
                depth += 1;
                token.push(c);
            }
            ']' | ')' => {
                depth -= 1;
                token.push(c);
            }
            c if depth > 0 => token.push(c),
            c if c.is_whitespace() => {
                if flush(&mut pending, &mut token)? {
                    pending = Some(Combinator::Descendant);
                }
            }
            '>' | '+' | '~' => {
                // May follow a compound directly or override a pending
                // descendant from the whitespace before it.
                let _ = flush(&mut pending, &mut token)?;
                if matches!(pending, Some(c) if c != Combinator::Descendant) {
                    return None;
                }
                pending = Some(match c {
                    '>' => Combinator::Child,
                    '+' => Combinator::Adjacent,
                    _ => Combinator::General,
                });
            }
            c => token.push(c),
        }
    }
    if depth != 0 {
        return None;
    }
    flush(&mut pending, &mut token)?;
    // A trailing combinator has nothing to apply to.
    if pending.is_some() || parts.is_empty() {
        return None;
    }
    Some(ComplexSelector { parts })
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn parse_compound(input: &str) -> Option<Compound> {
    let mut compound = Compound::default();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    let take_name = |chars: &[char], from: usize| -> (String, usize) {
        let mut j = from;
        while j < chars.len() && is_name_char(chars[j]) {
            j += 1;
        }
        (chars[from..j].iter().collect(), j)
    };

    if i < chars.len() && chars[i] == '*' {
        compound.tag = Some("*".to_string());
        i += 1;
    } else if i < chars.len() && is_name_char(chars[i]) {
        let (name, j) = take_name(&chars, i);
        compound.tag = Some(name.to_ascii_lowercase());
        i = j;
    }

    while i < chars.len() {
        match chars[i] {
            '#' => {
                let (name, j) = take_name(&chars, i + 1);
                if name.is_empty() {
                    return None;
                }
                compound.ids.push(name);
                i = j;
            }
            '.' => {
                let (name, j) = take_name(&chars, i + 1);
                if name.is_empty() {
                    return None;
                }
                compound.classes.push(name);
                i = j;
            }
            '[' => {
                let close = find_matching(&chars, i, '[', ']')?;
                let body: String = chars[i + 1..close].iter().collect();
                compound.attrs.push(parse_attr_filter(body.trim())?);
                i = close + 1;
            }
            ':' => {
                let (name, j) = take_name(&chars, i + 1);
                if name.is_empty() {
                    return None;
                }
                let (arg, next) = if j < chars.len() && chars[j] == '(' {
                    let close = find_matching(&chars, j, '(', ')')?;
                    let body: String = chars[j + 1..close].iter().collect();
                    (Some(body), close + 1)
                } else {
                    (None, j)
                };
                compound.pseudos.push(parse_pseudo(&name, arg.as_deref())?);
                i = next;
            }
            _ => return None,
        }
    }
    if compound == Compound::default() {
        return None;
    }
    Some(compound)
}

fn find_matching(chars: &[char], open_at: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in chars.iter().enumerate().skip(open_at) {
        if *c == open {
            depth += 1;
        } else if *c == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

fn parse_attr_filter(body: &str) -> Option<AttrFilter> {
    const OPS: [(&str, fn(AttrValue) -> AttrOp); 5] = [
        ("^=", |v| AttrOp::Prefix(raw_string(v))),
        ("$=", |v| AttrOp::Suffix(raw_string(v))),
        ("*=", |v| AttrOp::Substring(raw_string(v))),
        ("~=", |v| AttrOp::Word(raw_string(v))),
        ("|=", |v| AttrOp::Hyphen(raw_string(v))),
    ];
    fn raw_string(value: AttrValue) -> String {
        match value {
            AttrValue::Str(s) => s,
            AttrValue::Bool(b) => b.to_string(),
            AttrValue::Num(n) => n.to_string(),
        }
    }
    fn parse_value(raw: &str) -> (AttrValue, bool) {
        let raw = raw.trim();
        if raw.len() >= 2
            && ((raw.starts_with('"') && raw.ends_with('"'))
                || (raw.starts_with('\'') && raw.ends_with('\'')))
        {
            (AttrValue::Str(raw[1..raw.len() - 1].to_string()), true)
        } else {
            (AttrValue::coerce(raw), false)
        }
    }

    for (symbol, build) in OPS {
        if let Some(pos) = body.find(symbol) {
            let name = body[..pos].trim();
            if name.is_empty() || !name.chars().all(is_name_char) {
                return None;
            }
            let (value, _) = parse_value(&body[pos + symbol.len()..]);
            return Some(AttrFilter {
                name: name.to_ascii_lowercase(),
                op: build(value),
            });
        }
    }
    if let Some(pos) = body.find('=') {
        let name = body[..pos].trim();
        if name.is_empty() || !name.chars().all(is_name_char) {
            return None;
        }
        let (value, _) = parse_value(&body[pos + 1..]);
        return Some(AttrFilter {
            name: name.to_ascii_lowercase(),
            op: AttrOp::Eq(value),
        });
    }
    if body.is_empty() || !body.chars().all(is_name_char) {
        return None;
    }
    Some(AttrFilter {
        name: body.to_ascii_lowercase(),
        op: AttrOp::Exists,
    })
}

fn parse_pseudo(name: &str, arg: Option<&str>) -> Option<Pseudo> {
    match (name.to_ascii_lowercase().as_str(), arg) {
        ("first-child", None) => Some(Pseudo::FirstChild),
        ("last-child", None) => Some(Pseudo::LastChild),
        ("only-child", None) => Some(Pseudo::OnlyChild),
        ("first-of-type", None) => Some(Pseudo::FirstOfType),
        ("last-of-type", None) => Some(Pseudo::LastOfType),
        ("only-of-type", None) => Some(Pseudo::OnlyOfType),
        ("empty", None) => Some(Pseudo::Empty),
        ("nth-child", Some(arg)) => Nth::parse(arg).map(Pseudo::NthChild),
        ("nth-last-child", Some(arg)) => Nth::parse(arg).map(Pseudo::NthLastChild),
        ("nth-of-type", Some(arg)) => Nth::parse(arg).map(Pseudo::NthOfType),
        ("nth-last-of-type", Some(arg)) => Nth::parse(arg).map(Pseudo::NthLastOfType),
        ("not", Some(arg)) => parse_compound(arg.trim()).map(|c| Pseudo::Not(Box::new(c))),
        _ => None,
    }
}

// ---- matching ----

impl VTree {
    /// Match `node` against a comma-separated selector list.
    pub fn matches_selector(&self, node: VNodeId, selectors: &str) -> bool {
        self.matches_selector_in(node, selectors, None)
    }

    /// Match with an explicit related node for leading-combinator selectors.
    pub fn matches_selector_in(
        &self,
        node: VNodeId,
        selectors: &str,
        related: Option<VNodeId>,
    ) -> bool {
        let Some(list) = parse_selector_list(selectors) else {
            log::trace!(target: "vtree.selector", "unparseable selector {selectors:?}");
            return false;
        };
        list.selectors
            .iter()
            .any(|sel| self.match_seq(&sel.parts, node, related))
    }

    /// First matching Element in depth-first order under `root` (exclusive).
    pub fn query_selector(&self, root: VNodeId, selectors: &str) -> Option<VNodeId> {
        let Some(list) = parse_selector_list(selectors) else {
            return None;
        };
        self.find_first(root, &list, root)
    }

    /// All matching Elements in depth-first order under `root` (exclusive).
    pub fn query_selector_all(&self, root: VNodeId, selectors: &str) -> Vec<VNodeId> {
        let Some(list) = parse_selector_list(selectors) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        self.collect_matches(root, &list, root, &mut out);
        out
    }

    fn find_first(&self, at: VNodeId, list: &SelectorList, scope: VNodeId) -> Option<VNodeId> {
        for child in self.children(at) {
            if self.node(*child).kind == NodeKind::Element {
                if list
                    .selectors
                    .iter()
                    .any(|sel| self.match_seq(&sel.parts, *child, Some(scope)))
                {
                    return Some(*child);
                }
                if let Some(found) = self.find_first(*child, list, scope) {
                    return Some(found);
                }
            }
        }
        None
    }

    fn collect_matches(
        &self,
        at: VNodeId,
        list: &SelectorList,
        scope: VNodeId,
        out: &mut Vec<VNodeId>,
    ) {
        for child in self.children(at) {
            if self.node(*child).kind == NodeKind::Element {
                if list
                    .selectors
                    .iter()
                    .any(|sel| self.match_seq(&sel.parts, *child, Some(scope)))
                {
                    out.push(*child);
                }
                self.collect_matches(*child, list, scope, out);
            }
        }
    }

    fn match_seq(
        &self,
        seq: &[(Option<Combinator>, Compound)],
        node: VNodeId,
        related: Option<VNodeId>,
    ) -> bool {
        let Some(((combinator, compound), rest)) = seq.split_last() else {
            return false;
        };
        if !self.compound_matches(node, compound) {
            return false;
        }
        if rest.is_empty() {
            // Leading combinator validates against the related node.
            return match combinator {
                None => true,
                Some(c) => related.is_some_and(|rel| self.related_via(rel, node, *c)),
            };
        }
        let combinator = combinator.unwrap_or(Combinator::Descendant);
        match combinator {
            Combinator::Child => self
                .parent(node)
                .is_some_and(|p| self.match_seq(rest, p, related)),
            Combinator::Descendant => {
                let mut current = self.parent(node);
                while let Some(ancestor) = current {
                    if self.match_seq(rest, ancestor, related) {
                        return true;
                    }
                    current = self.parent(ancestor);
                }
                false
            }
            Combinator::Adjacent => self
                .prev_element_sibling(node)
                .is_some_and(|s| self.match_seq(rest, s, related)),
            Combinator::General => {
                let mut current = self.prev_element_sibling(node);
                while let Some(sibling) = current {
                    if self.match_seq(rest, sibling, related) {
                        return true;
                    }
                    current = self.prev_element_sibling(sibling);
                }
                false
            }
        }
    }

    /// Whether `rel` relates to `node` via `combinator` (rel on the left).
    fn related_via(&self, rel: VNodeId, node: VNodeId, combinator: Combinator) -> bool {
        match combinator {
            Combinator::Child => self.parent(node) == Some(rel),
            Combinator::Descendant => {
                let mut current = self.parent(node);
                while let Some(ancestor) = current {
                    if ancestor == rel {
                        return true;
                    }
                    current = self.parent(ancestor);
                }
                false
            }
            Combinator::Adjacent => self.prev_element_sibling(node) == Some(rel),
            Combinator::General => {
                let mut current = self.prev_element_sibling(node);
                while let Some(sibling) = current {
                    if sibling == rel {
                        return true;
                    }
                    current = self.prev_element_sibling(sibling);
                }
                false
            }
        }
    }

    fn compound_matches(&self, id: VNodeId, compound: &Compound) -> bool {
        let node = self.node(id);
        if node.kind != NodeKind::Element || node.state == NodeState::Destroyed {
            return false;
        }
        if let Some(tag) = &compound.tag {
            if tag != "*" && node.tag != *tag {
                return false;
            }
        }
        if !compound.ids.is_empty() {
            let Some(actual) = node.attrs.get("id") else {
                return false;
            };
            if !compound.ids.iter().all(|want| want == actual) {
                return false;
            }
        }
        if !compound
            .classes
            .iter()
            .all(|class| node.class_names.contains(class))
        {
            return false;
        }
        for filter in &compound.attrs {
            let value = node.attrs.get(&filter.name);
            let matched = match &filter.op {
                AttrOp::Exists => value.is_some(),
                AttrOp::Eq(expected) => value.is_some_and(|v| expected.matches(v)),
                AttrOp::Prefix(p) => value.is_some_and(|v| v.starts_with(p.as_str())),
                AttrOp::Suffix(s) => value.is_some_and(|v| v.ends_with(s.as_str())),
                AttrOp::Substring(s) => value.is_some_and(|v| v.contains(s.as_str())),
                AttrOp::Word(w) => {
                    value.is_some_and(|v| v.split_ascii_whitespace().any(|t| t == w))
                }
                AttrOp::Hyphen(h) => {
                    value.is_some_and(|v| v == h || v.starts_with(&format!("{h}-")))
                }
            };
            if !matched {
                return false;
            }
        }
        compound
            .pseudos
            .iter()
            .all(|pseudo| self.pseudo_matches(id, pseudo))
    }

    fn pseudo_matches(&self, id: VNodeId, pseudo: &Pseudo) -> bool {
        // Structural pseudos need the parent's Element-only child list;
        // without a parent they resolve to "no match".
        let position = |of_type: bool| -> Option<(usize, usize)> {
            let parent = self.parent(id)?;
            let elements = self.element_children(parent);
            let tag = &self.node(id).tag;
            let peers: Vec<VNodeId> = elements
                .iter()
                .copied()
                .filter(|e| !of_type || self.node(*e).tag == *tag)
                .collect();
            let index = peers.iter().position(|e| *e == id)?;
            Some((index + 1, peers.len()))
        };
        match pseudo {
            Pseudo::FirstChild => position(false).is_some_and(|(i, _)| i == 1),
            Pseudo::LastChild => position(false).is_some_and(|(i, n)| i == n),
            Pseudo::OnlyChild => position(false).is_some_and(|(_, n)| n == 1),
            Pseudo::FirstOfType => position(true).is_some_and(|(i, _)| i == 1),
            Pseudo::LastOfType => position(true).is_some_and(|(i, n)| i == n),
            Pseudo::OnlyOfType => position(true).is_some_and(|(_, n)| n == 1),
            Pseudo::Empty => self.children(id).is_empty(),
            Pseudo::NthChild(nth) => position(false).is_some_and(|(i, _)| nth.matches(i)),
            Pseudo::NthLastChild(nth) => {
                position(false).is_some_and(|(i, n)| nth.matches(n - i + 1))
            }
            Pseudo::NthOfType(nth) => position(true).is_some_and(|(i, _)| nth.matches(i)),
            Pseudo::NthLastOfType(nth) => {
                position(true).is_some_and(|(i, n)| nth.matches(n - i + 1))
            }
            Pseudo::Not(inner) => !self.compound_matches(id, inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nth_parses_all_forms() {
        assert_eq!(Nth::parse("even"), Some(Nth { a: 2, b: 0 }));
        assert_eq!(Nth::parse("odd"), Some(Nth { a: 2, b: 1 }));
        assert_eq!(Nth::parse("3"), Some(Nth { a: 0, b: 3 }));
        assert_eq!(Nth::parse("2n+1"), Some(Nth { a: 2, b: 1 }));
        assert_eq!(Nth::parse("-n+3"), Some(Nth { a: -1, b: 3 }));
        assert_eq!(Nth::parse(" 2N + 1 "), Some(Nth { a: 2, b: 1 }));
        assert_eq!(Nth::parse("n"), Some(Nth { a: 1, b: 0 }));
        assert_eq!(Nth::parse("2x+1"), None);
    }

    #[test]
    fn nth_matching_terminates_on_divergence() {
        let odd = Nth { a: 2, b: 1 };
        assert!(odd.matches(1));
        assert!(odd.matches(5));
        assert!(!odd.matches(4));
        let neg = Nth { a: -1, b: 3 };
        assert!(neg.matches(2));
        assert!(!neg.matches(4), "expected -n+3 to stop below index 4");
        let fixed = Nth { a: 0, b: 2 };
        assert!(fixed.matches(2));
        assert!(!fixed.matches(3));
    }

    #[test]
    fn nth_matching_treats_overflow_as_divergence() {
        let huge = Nth { a: i64::MAX, b: 1 };
        assert!(huge.matches(1), "k = 0 still lands on b");
        assert!(!huge.matches(2), "expected overflow to resolve to no match");
        let huge_negative = Nth { a: i64::MIN, b: 1 };
        assert!(huge_negative.matches(1));
        assert!(!huge_negative.matches(2));
    }

    #[test]
    fn parse_splits_combinators_outside_brackets() {
        let sel = parse_complex("ul > li[data-x=\"a > b\"] + li").expect("parse failed");
        assert_eq!(sel.parts.len(), 3);
        assert_eq!(sel.parts[1].0, Some(Combinator::Child));
        assert_eq!(sel.parts[2].0, Some(Combinator::Adjacent));
    }

    #[test]
    fn parse_rejects_trailing_combinator() {
        assert_eq!(parse_complex("div >"), None);
        assert_eq!(parse_complex(""), None);
    }

    #[test]
    fn parse_unquoted_values_coerce() {
        let filter = parse_attr_filter("data-count=3").expect("parse failed");
        assert_eq!(filter.op, AttrOp::Eq(AttrValue::Num(3.0)));
        let filter = parse_attr_filter("data-on=true").expect("parse failed");
        assert_eq!(filter.op, AttrOp::Eq(AttrValue::Bool(true)));
        let filter = parse_attr_filter("data-on=\"true\"").expect("parse failed");
        assert_eq!(
            filter.op,
            AttrOp::Eq(AttrValue::Str("true".to_string())),
            "expected quoted value kept as string"
        );
    }

    #[test]
    fn leading_combinator_is_kept_on_first_part() {
        let sel = parse_complex("> li").expect("parse failed");
        assert_eq!(sel.parts.len(), 1);
        assert_eq!(sel.parts[0].0, Some(Combinator::Child));
    }
}
