/// Injected vendor-prefix lookup.
///
/// The hosting environment owns the prefix tables; extraction only consumes
/// the capability. `resolve` returns the stored (possibly prefixed) property
/// name for a raw property, or `None` to keep the name as written.
pub trait PrefixResolver {
    fn resolve(&self, property: &str) -> Option<String>;
}

/// Identity resolver: every property name is stored as written.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPrefix;

impl PrefixResolver for NoPrefix {
    fn resolve(&self, _property: &str) -> Option<String> {
        None
    }
}
