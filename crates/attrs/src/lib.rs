//! Structured views over the `class` and `style` attribute strings.
//!
//! Contract:
//! - Extraction is permissive: malformed fragments are dropped, never rejected.
//! - `extract_class`/`extract_style` rebuild canonical attribute strings; empty
//!   or whitespace-only input yields `None`.
//! - Serialization is the inverse of extraction modulo whitespace.
//! - Every style property name passes through the injected [`PrefixResolver`]
//!   before storage.

pub mod class;
pub mod prefix;
pub mod style;
pub mod transition;

pub use crate::class::{ClassExtract, extract_class};
pub use crate::prefix::{NoPrefix, PrefixResolver};
pub use crate::style::{
    ELEMENT_GROUP, ExtractOptions, PropertyValue, StyleExtract, StyleGroup, Styles, extract_style,
    serialize_styles,
};
pub use crate::transition::{Transition, parse_transition, serialize_transition};
