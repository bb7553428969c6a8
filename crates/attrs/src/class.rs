use std::collections::HashSet;

/// Result of structuring a raw `class` attribute string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassExtract {
    /// Canonical single-spaced attribute string, `None` for empty input.
    pub attr_class: Option<String>,
    pub class_names: HashSet<String>,
}

/// Split a raw `class` value on whitespace runs and rebuild the canonical
/// single-spaced form.
///
/// Token order is preserved in `attr_class`; `class_names` is the set view.
pub fn extract_class(raw: &str) -> ClassExtract {
    let mut canonical = String::with_capacity(raw.len());
    let mut class_names = HashSet::new();
    for token in raw.split_whitespace() {
        if !canonical.is_empty() {
            canonical.push(' ');
        }
        canonical.push_str(token);
        class_names.insert(token.to_string());
    }
    let attr_class = if canonical.is_empty() {
        None
    } else {
        Some(canonical)
    };
    ClassExtract {
        attr_class,
        class_names,
    }
}
