//! Adoption of an existing host subtree into the shadow tree.
//!
//! Contract:
//! - Every adopted host node is paired with exactly one new vnode; `id`
//!   attributes are registered as part of adoption.
//! - Attribute and tag names are canonicalized to ASCII lowercase on the way
//!   in; derived class/style state is rebuilt from the raw attribute strings.
//! - Raw-text elements collapse their host text children into one verbatim
//!   Text vnode.

use crate::host::{Host, HostKey, HostResult};
use crate::tags::{Namespace, foreign_namespace, is_rawtext};
use crate::vnode::{NodeKind, VNodeId, VTree};

impl VTree {
    /// Adopt the host subtree rooted at `key` and make it the shadow root.
    pub fn mirror_root(&mut self, host: &dyn Host, key: HostKey) -> HostResult<VNodeId> {
        let id = self.mirror_subtree(host, key)?;
        self.set_root(id);
        Ok(id)
    }

    /// Adopt the host subtree rooted at `key`, returning a detached vnode.
    pub fn mirror_subtree(&mut self, host: &dyn Host, key: HostKey) -> HostResult<VNodeId> {
        self.mirror_node(host, key, Namespace::Html)
    }

    fn mirror_node(
        &mut self,
        host: &dyn Host,
        key: HostKey,
        inherited: Namespace,
    ) -> HostResult<VNodeId> {
        let id = match host.kind(key)? {
            NodeKind::Text => {
                let text = host.text(key)?;
                self.create_text(&text)
            }
            NodeKind::Comment => {
                let text = host.text(key)?;
                self.create_comment(&text)
            }
            NodeKind::Element => {
                let tag = host.tag(key)?.to_ascii_lowercase();
                let namespace = foreign_namespace(&tag).unwrap_or(inherited);
                // No remainder to learn from here; unknown host tags with
                // children prove themselves non-void below.
                let is_void = self.tags.known_void(&tag).unwrap_or(false);
                let element = self.create_element(&tag, namespace, is_void);
                for (name, value) in host.attributes(key)? {
                    let name = name.to_ascii_lowercase();
                    self.apply_attr_value(element, &name, Some(&value));
                    if name == "id" {
                        self.registry.register_id(&value, key);
                    }
                }
                let children = host.children(key)?;
                if is_rawtext(&tag) {
                    let mut raw = String::new();
                    for child in &children {
                        if host.kind(*child)? != NodeKind::Element {
                            raw.push_str(&host.text(*child)?);
                        }
                    }
                    if !raw.is_empty() {
                        let text = self.create_text(&raw);
                        if let [only] = children[..] {
                            self.registry.bind(only, text);
                            self.node_mut(text).host = Some(only);
                        }
                        self.push_child(element, text);
                    }
                } else {
                    for child in children {
                        let mirrored = self.mirror_node(host, child, namespace)?;
                        self.push_child(element, mirrored);
                    }
                    if !self.children(element).is_empty() {
                        self.node_mut(element).is_void = false;
                    }
                }
                element
            }
        };
        self.registry.bind(key, id);
        self.node_mut(id).host = Some(key);
        Ok(id)
    }

    /// Pairing lookups, host side and vnode side.
    pub fn vnode_for(&self, key: HostKey) -> Option<VNodeId> {
        self.registry.vnode_of(key)
    }

    /// Resolve a registered `id` attribute to its paired vnode.
    pub fn by_id(&self, id: &str) -> Option<VNodeId> {
        self.registry.lookup_id(id).and_then(|key| self.registry.vnode_of(key))
    }
}
