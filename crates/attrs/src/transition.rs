//! Mini-grammar for `transition` property values.
//!
//! Entry form: `[property] duration[s] [timing-function] [delay[s]]`,
//! comma-separated. A bare duration implies property `all`; the keyword
//! `none` yields no entries.

/// One structured transition entry.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub property: String,
    /// Seconds.
    pub duration: f32,
    pub timing_function: Option<String>,
    /// Seconds.
    pub delay: Option<f32>,
}

fn parse_seconds(token: &str) -> Option<f32> {
    let digits = token.strip_suffix('s').unwrap_or(token);
    let value = digits.parse::<f32>().ok()?;
    if value.is_finite() { Some(value) } else { None }
}

/// Parse a raw `transition` value into structured entries.
///
/// Malformed entries are dropped, never rejected.
pub fn parse_transition(raw: &str) -> Vec<Transition> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        return Vec::new();
    }
    let mut entries = Vec::new();
    for part in raw.split(',') {
        let mut tokens = part.split_whitespace().peekable();
        let Some(first) = tokens.next() else {
            continue;
        };
        let (property, duration) = if let Some(duration) = parse_seconds(first) {
            ("all".to_string(), duration)
        } else {
            let Some(duration) = tokens.next().and_then(parse_seconds) else {
                log::trace!(target: "attrs.transition", "dropping entry without duration: {part:?}");
                continue;
            };
            (first.to_string(), duration)
        };
        let timing_function = match tokens.peek() {
            Some(token) if parse_seconds(token).is_none() => {
                Some(tokens.next().unwrap_or_default().to_string())
            }
            _ => None,
        };
        let delay = tokens.next().and_then(parse_seconds);
        entries.push(Transition {
            property,
            duration,
            timing_function,
            delay,
        });
    }
    entries
}

fn push_seconds(out: &mut String, value: f32) {
    out.push_str(&format!("{value}s"));
}

/// Inverse of [`parse_transition`] modulo whitespace.
pub fn serialize_transition(entries: &[Transition]) -> String {
    if entries.is_empty() {
        return "none".to_string();
    }
    let mut out = String::new();
    for entry in entries {
        if !out.is_empty() {
            out.push_str(", ");
        }
        out.push_str(&entry.property);
        out.push(' ');
        push_seconds(&mut out, entry.duration);
        if let Some(timing) = &entry.timing_function {
            out.push(' ');
            out.push_str(timing);
        }
        if let Some(delay) = entry.delay {
            out.push(' ');
            push_seconds(&mut out, delay);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_transition_bare_duration_implies_all() {
        let entries = parse_transition("0.3s");
        assert_eq!(
            entries,
            vec![Transition {
                property: "all".to_string(),
                duration: 0.3,
                timing_function: None,
                delay: None,
            }],
            "expected bare duration to imply `all`, got: {entries:?}"
        );
    }

    #[test]
    fn parse_transition_none_yields_empty() {
        assert!(parse_transition("none").is_empty());
        assert!(parse_transition("  NONE ").is_empty());
        assert!(parse_transition("").is_empty());
    }

    #[test]
    fn parse_transition_full_entry() {
        let entries = parse_transition("opacity 0.5s ease-in 0.1s");
        assert_eq!(
            entries,
            vec![Transition {
                property: "opacity".to_string(),
                duration: 0.5,
                timing_function: Some("ease-in".to_string()),
                delay: Some(0.1),
            }]
        );
    }

    #[test]
    fn parse_transition_multiple_entries() {
        let entries = parse_transition("opacity 0.5s, transform 1s linear");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].property, "opacity");
        assert_eq!(entries[1].property, "transform");
        assert_eq!(entries[1].timing_function.as_deref(), Some("linear"));
    }

    #[test]
    fn parse_transition_drops_entry_without_duration() {
        let entries = parse_transition("opacity ease, transform 1s");
        assert_eq!(entries.len(), 1, "expected malformed entry dropped, got: {entries:?}");
        assert_eq!(entries[0].property, "transform");
    }

    #[test]
    fn serialize_transition_round_trips() {
        let raw = "opacity 0.5s ease-in 0.1s, transform 1s";
        let entries = parse_transition(raw);
        let serialized = serialize_transition(&entries);
        assert_eq!(
            parse_transition(&serialized),
            entries,
            "expected round-trip stability, got: {serialized:?}"
        );
    }

    #[test]
    fn serialize_transition_empty_is_none_keyword() {
        assert_eq!(serialize_transition(&[]), "none");
    }
}
