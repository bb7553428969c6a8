//! Host document boundary.
//!
//! The core consumes this capability set and produces calls against it during
//! reconciliation; it assumes nothing about the hosting environment beyond it.
//!
//! Invariants:
//! - `HostKey` values are allocated by the host and stable for a node's
//!   lifetime; `HostKey::INVALID` never identifies a node.
//! - Operations are applied in order within one call stack.
//! - Removing an already-detached node reports [`HostError::Detached`];
//!   callers treat that as a no-op (teardown is idempotent).

use crate::tags::Namespace;
use crate::vnode::NodeKind;
use std::collections::HashMap;

/// Opaque handle for one live host node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostKey(pub u32);

impl HostKey {
    /// Reserved sentinel for "unassigned/invalid" identity.
    pub const INVALID: HostKey = HostKey(0);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostError {
    UnknownKey(HostKey),
    /// The node exists but is not attached to a parent.
    Detached(HostKey),
    NotAnElement(HostKey),
    /// Text/comment content was requested or written on the wrong kind.
    NotCharacterData(HostKey),
}

pub type HostResult<T> = Result<T, HostError>;

/// Capability set offered by the hosting environment.
pub trait Host {
    fn create_element(&mut self, tag: &str, namespace: Namespace) -> HostKey;
    fn create_text(&mut self, text: &str) -> HostKey;
    fn create_comment(&mut self, text: &str) -> HostKey;

    /// Insert `child` under `parent`, before `before` (append when `None`).
    fn insert_before(
        &mut self,
        parent: HostKey,
        child: HostKey,
        before: Option<HostKey>,
    ) -> HostResult<()>;
    /// Detach a node (and its subtree) from its parent.
    fn remove(&mut self, key: HostKey) -> HostResult<()>;
    /// Release the node's storage; `key` is invalid afterwards. Destroying
    /// a subtree means destroying each node individually.
    fn destroy(&mut self, key: HostKey) -> HostResult<()>;

    fn set_attribute(&mut self, key: HostKey, name: &str, value: &str) -> HostResult<()>;
    fn remove_attribute(&mut self, key: HostKey, name: &str) -> HostResult<()>;
    fn set_text(&mut self, key: HostKey, text: &str) -> HostResult<()>;

    fn kind(&self, key: HostKey) -> HostResult<NodeKind>;
    fn tag(&self, key: HostKey) -> HostResult<String>;
    fn attributes(&self, key: HostKey) -> HostResult<Vec<(String, String)>>;
    fn children(&self, key: HostKey) -> HostResult<Vec<HostKey>>;
    fn text(&self, key: HostKey) -> HostResult<String>;
    fn computed_style(&self, key: HostKey, property: &str) -> HostResult<Option<String>>;
}

/// Reference in-memory host, used by tests and as the contract's executable
/// description.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: HashMap<HostKey, MemoryNode>,
    next_key: u32,
}

#[derive(Debug)]
struct MemoryNode {
    kind: NodeKind,
    tag: String,
    namespace: Namespace,
    attributes: Vec<(String, String)>,
    text: String,
    parent: Option<HostKey>,
    children: Vec<HostKey>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            next_key: 0,
        }
    }

    fn alloc(&mut self, node: MemoryNode) -> HostKey {
        self.next_key += 1;
        let key = HostKey(self.next_key);
        self.nodes.insert(key, node);
        key
    }

    fn node(&self, key: HostKey) -> HostResult<&MemoryNode> {
        self.nodes.get(&key).ok_or(HostError::UnknownKey(key))
    }

    fn node_mut(&mut self, key: HostKey) -> HostResult<&mut MemoryNode> {
        self.nodes.get_mut(&key).ok_or(HostError::UnknownKey(key))
    }

    pub fn parent(&self, key: HostKey) -> HostResult<Option<HostKey>> {
        Ok(self.node(key)?.parent)
    }

    /// Count of live nodes, including detached ones.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, key: HostKey) -> bool {
        self.nodes.contains_key(&key)
    }
}

impl Host for MemoryHost {
    fn create_element(&mut self, tag: &str, namespace: Namespace) -> HostKey {
        self.alloc(MemoryNode {
            kind: NodeKind::Element,
            tag: tag.to_ascii_lowercase(),
            namespace,
            attributes: Vec::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
        })
    }

    fn create_text(&mut self, text: &str) -> HostKey {
        self.alloc(MemoryNode {
            kind: NodeKind::Text,
            tag: String::new(),
            namespace: Namespace::Html,
            attributes: Vec::new(),
            text: text.to_string(),
            parent: None,
            children: Vec::new(),
        })
    }

    fn create_comment(&mut self, text: &str) -> HostKey {
        self.alloc(MemoryNode {
            kind: NodeKind::Comment,
            tag: String::new(),
            namespace: Namespace::Html,
            attributes: Vec::new(),
            text: text.to_string(),
            parent: None,
            children: Vec::new(),
        })
    }

    fn insert_before(
        &mut self,
        parent: HostKey,
        child: HostKey,
        before: Option<HostKey>,
    ) -> HostResult<()> {
        if !self.nodes.contains_key(&parent) {
            return Err(HostError::UnknownKey(parent));
        }
        // Reinserting an attached node moves it.
        if let Some(old_parent) = self.node(child)?.parent {
            let old = self.node_mut(old_parent)?;
            old.children.retain(|k| *k != child);
        }
        let position = match before {
            Some(before) => self
                .node(parent)?
                .children
                .iter()
                .position(|k| *k == before)
                .ok_or(HostError::UnknownKey(before))?,
            None => self.node(parent)?.children.len(),
        };
        self.node_mut(parent)?.children.insert(position, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn remove(&mut self, key: HostKey) -> HostResult<()> {
        let Some(parent) = self.node(key)?.parent else {
            return Err(HostError::Detached(key));
        };
        self.node_mut(parent)?.children.retain(|k| *k != key);
        self.node_mut(key)?.parent = None;
        Ok(())
    }

    fn destroy(&mut self, key: HostKey) -> HostResult<()> {
        let node = self.nodes.remove(&key).ok_or(HostError::UnknownKey(key))?;
        if let Some(parent) = node.parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                parent_node.children.retain(|k| *k != key);
            }
        }
        Ok(())
    }

    fn set_attribute(&mut self, key: HostKey, name: &str, value: &str) -> HostResult<()> {
        let node = self.node_mut(key)?;
        if node.kind != NodeKind::Element {
            return Err(HostError::NotAnElement(key));
        }
        if let Some(slot) = node.attributes.iter_mut().find(|(k, _)| k == name) {
            slot.1 = value.to_string();
        } else {
            node.attributes.push((name.to_string(), value.to_string()));
        }
        Ok(())
    }

    fn remove_attribute(&mut self, key: HostKey, name: &str) -> HostResult<()> {
        let node = self.node_mut(key)?;
        if node.kind != NodeKind::Element {
            return Err(HostError::NotAnElement(key));
        }
        node.attributes.retain(|(k, _)| k != name);
        Ok(())
    }

    fn set_text(&mut self, key: HostKey, text: &str) -> HostResult<()> {
        let node = self.node_mut(key)?;
        if node.kind == NodeKind::Element {
            return Err(HostError::NotCharacterData(key));
        }
        node.text = text.to_string();
        Ok(())
    }

    fn kind(&self, key: HostKey) -> HostResult<NodeKind> {
        Ok(self.node(key)?.kind)
    }

    fn tag(&self, key: HostKey) -> HostResult<String> {
        let node = self.node(key)?;
        if node.kind != NodeKind::Element {
            return Err(HostError::NotAnElement(key));
        }
        Ok(node.tag.clone())
    }

    fn attributes(&self, key: HostKey) -> HostResult<Vec<(String, String)>> {
        let node = self.node(key)?;
        if node.kind != NodeKind::Element {
            return Err(HostError::NotAnElement(key));
        }
        Ok(node.attributes.clone())
    }

    fn children(&self, key: HostKey) -> HostResult<Vec<HostKey>> {
        Ok(self.node(key)?.children.clone())
    }

    fn text(&self, key: HostKey) -> HostResult<String> {
        let node = self.node(key)?;
        if node.kind == NodeKind::Element {
            return Err(HostError::NotCharacterData(key));
        }
        Ok(node.text.clone())
    }

    fn computed_style(&self, key: HostKey, property: &str) -> HostResult<Option<String>> {
        let node = self.node(key)?;
        if node.kind != NodeKind::Element {
            return Err(HostError::NotAnElement(key));
        }
        // The reference host has no layout engine; inline declarations are
        // the only computed source.
        Ok(node
            .attributes
            .iter()
            .find(|(k, _)| k == "style")
            .and_then(|(_, style)| {
                style.split(';').find_map(|pair| {
                    let (name, value) = pair.split_once(':')?;
                    (name.trim().eq_ignore_ascii_case(property))
                        .then(|| value.trim().to_string())
                })
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_before_orders_children() {
        let mut host = MemoryHost::new();
        let parent = host.create_element("div", Namespace::Html);
        let a = host.create_text("a");
        let b = host.create_text("b");
        host.insert_before(parent, b, None).expect("append failed");
        host.insert_before(parent, a, Some(b)).expect("insert failed");
        assert_eq!(
            host.children(parent).expect("children failed"),
            vec![a, b],
            "expected insert before sibling to order children"
        );
    }

    #[test]
    fn remove_detached_node_reports_detached() {
        let mut host = MemoryHost::new();
        let node = host.create_text("x");
        assert_eq!(host.remove(node), Err(HostError::Detached(node)));
    }

    #[test]
    fn reinserting_attached_node_moves_it() {
        let mut host = MemoryHost::new();
        let first = host.create_element("div", Namespace::Html);
        let second = host.create_element("div", Namespace::Html);
        let child = host.create_text("x");
        host.insert_before(first, child, None).expect("append failed");
        host.insert_before(second, child, None).expect("move failed");
        assert!(host.children(first).expect("children").is_empty());
        assert_eq!(host.children(second).expect("children"), vec![child]);
    }

    #[test]
    fn computed_style_reads_inline_declarations() {
        let mut host = MemoryHost::new();
        let node = host.create_element("div", Namespace::Html);
        host.set_attribute(node, "style", "color: red; width: 10px")
            .expect("set failed");
        assert_eq!(
            host.computed_style(node, "width").expect("style failed"),
            Some("10px".to_string())
        );
        assert_eq!(host.computed_style(node, "height").expect("style failed"), None);
    }
}
