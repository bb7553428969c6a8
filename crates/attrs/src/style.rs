//! Structuring of raw `style` attribute strings.
//!
//! Two input forms are supported:
//! - flat: `"color: red; border: solid 1px black"`
//! - block: `"{color: red;} :hover{color: blue;}"`, a non-standard inline
//!   convention simulating multiple pseudo-state groups.
//!
//! Groups other than [`ELEMENT_GROUP`] are retained only when
//! [`ExtractOptions::pseudo_groups`] is set; otherwise they are silently
//! dropped. Group contents are stored verbatim and never merged into the
//! element group.

use crate::prefix::PrefixResolver;
use crate::transition::{Transition, parse_transition, serialize_transition};

/// Name of the default style group.
pub const ELEMENT_GROUP: &str = "element";

#[derive(Clone, Copy, Debug, Default)]
pub struct ExtractOptions {
    /// Keep pseudo-state groups (`:hover{…}` etc.) from the block form.
    pub pseudo_groups: bool,
}

/// A single stored property value.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    Text(String),
    /// Structured `transition` entries.
    Transitions(Vec<Transition>),
}

impl PropertyValue {
    pub fn serialize(&self) -> String {
        match self {
            PropertyValue::Text(text) => text.clone(),
            PropertyValue::Transitions(entries) => serialize_transition(entries),
        }
    }
}

/// Declaration-ordered property map for one style group.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StyleGroup {
    entries: Vec<(String, PropertyValue)>,
}

impl StyleGroup {
    pub fn get(&self, property: &str) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }

    /// Insert or replace, keeping first-declaration position on replace.
    pub fn set(&mut self, property: &str, value: PropertyValue) {
        if let Some(slot) = self
            .entries
            .iter_mut()
            .find(|(name, _)| name == property)
        {
            slot.1 = value;
        } else {
            self.entries.push((property.to_string(), value));
        }
    }

    pub fn remove(&mut self, property: &str) -> Option<PropertyValue> {
        let index = self.entries.iter().position(|(name, _)| name == property)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// All style groups of one element, declaration-ordered.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Styles {
    groups: Vec<(String, StyleGroup)>,
}

impl Styles {
    pub fn group(&self, name: &str) -> Option<&StyleGroup> {
        self.groups
            .iter()
            .find(|(group, _)| group == name)
            .map(|(_, entries)| entries)
    }

    pub fn group_mut(&mut self, name: &str) -> &mut StyleGroup {
        if let Some(index) = self.groups.iter().position(|(group, _)| group == name) {
            return &mut self.groups[index].1;
        }
        self.groups.push((name.to_string(), StyleGroup::default()));
        &mut self.groups.last_mut().expect("just pushed").1
    }

    /// The default (`element`) group, if present.
    pub fn element(&self) -> Option<&StyleGroup> {
        self.group(ELEMENT_GROUP)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StyleGroup)> {
        self.groups
            .iter()
            .map(|(name, group)| (name.as_str(), group))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|(_, group)| group.is_empty())
    }
}

/// Result of structuring a raw `style` attribute string.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StyleExtract {
    /// Canonical attribute string, `None` when nothing was retained.
    pub attr_style: Option<String>,
    pub styles: Styles,
}

/// Structure a raw `style` value.
///
/// Every property name passes through `prefixes` before storage. Malformed
/// declarations are dropped, never rejected.
pub fn extract_style(
    raw: &str,
    options: ExtractOptions,
    prefixes: &dyn PrefixResolver,
) -> StyleExtract {
    let mut styles = Styles::default();
    if raw.contains('{') {
        parse_block_form(raw, options, prefixes, &mut styles);
    } else {
        parse_declarations_into(raw, prefixes, styles.group_mut(ELEMENT_GROUP));
    }
    styles.groups.retain(|(_, group)| !group.is_empty());
    let attr_style = if styles.is_empty() {
        None
    } else {
        Some(serialize_styles(&styles))
    };
    StyleExtract { attr_style, styles }
}

fn parse_block_form(
    raw: &str,
    options: ExtractOptions,
    prefixes: &dyn PrefixResolver,
    styles: &mut Styles,
) {
    let mut rest = raw;
    while let Some(open) = rest.find('{') {
        let label = rest[..open].trim();
        let body_start = open + 1;
        let (body, next) = match rest[body_start..].find('}') {
            Some(close) => (
                &rest[body_start..body_start + close],
                &rest[body_start + close + 1..],
            ),
            // Unterminated block: take the remainder as the body.
            None => (&rest[body_start..], ""),
        };
        let group_name = if label.is_empty() { ELEMENT_GROUP } else { label };
        if group_name == ELEMENT_GROUP || options.pseudo_groups {
            parse_declarations_into(body, prefixes, styles.group_mut(group_name));
        } else {
            log::trace!(target: "attrs.style", "dropping pseudo group {group_name:?}");
        }
        rest = next;
    }
}

fn parse_declarations_into(
    input: &str,
    prefixes: &dyn PrefixResolver,
    group: &mut StyleGroup,
) {
    for pair in input.split(';') {
        let Some((name, value)) = pair.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();
        if name.is_empty() || value.is_empty() {
            continue;
        }
        let name = prefixes.resolve(&name).unwrap_or(name);
        let value = if name == "transition" {
            PropertyValue::Transitions(parse_transition(value))
        } else {
            PropertyValue::Text(value.to_string())
        };
        group.set(&name, value);
    }
}

/// Inverse of [`extract_style`] modulo whitespace.
///
/// A lone element group serializes in the flat form; any other group set
/// serializes in the block form.
pub fn serialize_styles(styles: &Styles) -> String {
    let only_element = styles
        .groups
        .iter()
        .all(|(name, _)| name == ELEMENT_GROUP);
    if only_element {
        return styles
            .element()
            .map(serialize_group_flat)
            .unwrap_or_default();
    }
    let mut out = String::new();
    for (name, group) in styles.iter() {
        if !out.is_empty() {
            out.push(' ');
        }
        if name != ELEMENT_GROUP {
            out.push_str(name);
        }
        out.push('{');
        out.push_str(&serialize_group_flat(group));
        out.push('}');
    }
    out
}

fn serialize_group_flat(group: &StyleGroup) -> String {
    let mut out = String::new();
    for (name, value) in group.iter() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(name);
        out.push_str(": ");
        out.push_str(&value.serialize());
        out.push(';');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefix::NoPrefix;

    fn text(value: &str) -> PropertyValue {
        PropertyValue::Text(value.to_string())
    }

    #[test]
    fn extract_style_flat_form() {
        let extract = extract_style(
            "color: red; border: solid 1px black",
            ExtractOptions::default(),
            &NoPrefix,
        );
        let element = extract.styles.element().expect("element group");
        assert_eq!(element.get("color"), Some(&text("red")));
        assert_eq!(element.get("border"), Some(&text("solid 1px black")));
        assert_eq!(
            extract.attr_style.as_deref(),
            Some("color: red; border: solid 1px black;"),
            "expected canonical flat form, got: {extract:?}"
        );
    }

    #[test]
    fn extract_style_empty_input_yields_none() {
        let extract = extract_style("  ", ExtractOptions::default(), &NoPrefix);
        assert_eq!(extract.attr_style, None);
        assert!(extract.styles.is_empty());
    }

    #[test]
    fn extract_style_drops_pseudo_groups_by_default() {
        let extract = extract_style(
            "{color: red;} :hover{color: blue;}",
            ExtractOptions::default(),
            &NoPrefix,
        );
        assert!(extract.styles.group(":hover").is_none());
        assert_eq!(
            extract.attr_style.as_deref(),
            Some("color: red;"),
            "expected pseudo group silently dropped, got: {extract:?}"
        );
    }

    #[test]
    fn extract_style_keeps_pseudo_groups_when_enabled() {
        let extract = extract_style(
            "{color: red;} :hover{color: blue;}",
            ExtractOptions {
                pseudo_groups: true,
            },
            &NoPrefix,
        );
        let hover = extract.styles.group(":hover").expect("hover group");
        assert_eq!(hover.get("color"), Some(&text("blue")));
        assert_eq!(
            extract.attr_style.as_deref(),
            Some("{color: red;} :hover{color: blue;}")
        );
    }

    #[test]
    fn extract_style_structures_transition_values() {
        let extract = extract_style(
            "transition: opacity 0.5s ease",
            ExtractOptions::default(),
            &NoPrefix,
        );
        let element = extract.styles.element().expect("element group");
        match element.get("transition") {
            Some(PropertyValue::Transitions(entries)) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].property, "opacity");
            }
            other => panic!("expected structured transition, got: {other:?}"),
        }
    }

    #[test]
    fn extract_style_applies_prefix_resolver() {
        struct WebkitUserSelect;
        impl PrefixResolver for WebkitUserSelect {
            fn resolve(&self, property: &str) -> Option<String> {
                (property == "user-select").then(|| "-webkit-user-select".to_string())
            }
        }
        let extract = extract_style(
            "user-select: none",
            ExtractOptions::default(),
            &WebkitUserSelect,
        );
        let element = extract.styles.element().expect("element group");
        assert_eq!(element.get("-webkit-user-select"), Some(&text("none")));
        assert_eq!(element.get("user-select"), None);
    }

    #[test]
    fn extract_style_drops_malformed_declarations() {
        let extract = extract_style(
            "color red; : blue; border: solid",
            ExtractOptions::default(),
            &NoPrefix,
        );
        let element = extract.styles.element().expect("element group");
        assert_eq!(element.len(), 1, "expected only valid declaration kept");
        assert_eq!(element.get("border"), Some(&text("solid")));
    }

    #[test]
    fn serialize_styles_round_trips_flat_form() {
        let raw = "color: red; border: solid 1px black";
        let first = extract_style(raw, ExtractOptions::default(), &NoPrefix);
        let serialized = serialize_styles(&first.styles);
        let second = extract_style(&serialized, ExtractOptions::default(), &NoPrefix);
        assert_eq!(
            first.styles, second.styles,
            "expected round-trip stability, got: {serialized:?}"
        );
    }

    #[test]
    fn serialize_styles_round_trips_block_form() {
        let raw = "{color: red;} :hover{color: blue; opacity: 0.5;}";
        let options = ExtractOptions {
            pseudo_groups: true,
        };
        let first = extract_style(raw, options, &NoPrefix);
        let serialized = serialize_styles(&first.styles);
        let second = extract_style(&serialized, options, &NoPrefix);
        assert_eq!(first.styles, second.styles);
    }
}
