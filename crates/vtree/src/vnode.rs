//! Shadow tree storage: node model, arena, navigation, serialization.
//!
//! Contract:
//! - Nodes live in an arena indexed by [`VNodeId`]; ids are never reused, so a
//!   stale id resolves to a `Destroyed` slot rather than a different node.
//! - `parent` is a back-index, never an ownership edge.
//! - The Element-only child view is cached lazily per parent and invalidated
//!   on any structural change to that parent.
//! - Exactly one VNode is paired with one host node at a time (see
//!   [`crate::registry`]).

use crate::host::HostKey;
use crate::notify::{ChangeLog, NodeChanges};
use crate::registry::Registry;
use crate::schedule::{NullScheduler, Scheduler};
use crate::tags::{Namespace, TagTable};
use attrs::{ExtractOptions, NoPrefix, PrefixResolver, Styles, extract_class, extract_style};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
}

/// Node lifecycle: removal keeps a node queryable until its grace deadline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    Live,
    PendingRemoval { deadline: u64 },
    Destroyed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VNodeId(pub u32);

/// Attribute name reserved for the hosting environment; rejected on
/// non-privileged write paths.
pub const RESERVED_ATTR: &str = "is";

/// Insertion-ordered attribute map.
///
/// Lookup order is irrelevant to callers, but serialization preserves the
/// order attributes were first written, keeping round-trips stable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttrMap {
    entries: Vec<(String, String)>,
}

impl AttrMap {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, name: &str, value: &str) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| k == name) {
            slot.1 = value.to_string();
        } else {
            self.entries.push((name.to_string(), value.to_string()));
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One shadow node.
#[derive(Debug)]
pub struct VNode {
    pub kind: NodeKind,
    /// Canonical ASCII-lowercase tag name (Elements only).
    pub tag: String,
    pub namespace: Namespace,
    pub is_void: bool,
    pub attrs: AttrMap,
    pub class_names: HashSet<String>,
    pub styles: Styles,
    /// Escaped content, kept verbatim (Text/Comment only).
    pub text: String,
    pub(crate) children: Vec<VNodeId>,
    pub(crate) parent: Option<VNodeId>,
    pub(crate) host: Option<HostKey>,
    pub(crate) state: NodeState,
    pub(crate) element_children: RefCell<Option<Rc<Vec<VNodeId>>>>,
}

impl VNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            tag: String::new(),
            namespace: Namespace::Html,
            is_void: false,
            attrs: AttrMap::default(),
            class_names: HashSet::new(),
            styles: Styles::default(),
            text: String::new(),
            children: Vec::new(),
            parent: None,
            host: None,
            state: NodeState::Live,
            element_children: RefCell::new(None),
        }
    }
}

/// Tree-wide configuration, fixed at construction.
#[derive(Clone, Debug)]
pub struct TreeConfig {
    /// Caller-declared attribute names rejected on non-privileged writes.
    pub locked_attrs: HashSet<String>,
    /// Ticks a removed node stays queryable before final destruction.
    pub destroy_grace_ticks: u64,
    /// Retain pseudo-state style groups from the block form.
    pub pseudo_groups: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            locked_attrs: HashSet::new(),
            destroy_grace_ticks: 1,
            pseudo_groups: false,
        }
    }
}

/// The shadow tree and everything it owns: arena, tag table, registries,
/// change log, scheduler hook.
pub struct VTree {
    pub(crate) slots: Vec<VNode>,
    pub(crate) root: Option<VNodeId>,
    pub(crate) config: TreeConfig,
    pub(crate) tags: TagTable,
    pub(crate) registry: Registry,
    pub(crate) changes: ChangeLog,
    pub(crate) scheduler: Box<dyn Scheduler>,
    pub(crate) prefixes: Box<dyn PrefixResolver>,
    pub(crate) observer: Option<Box<dyn FnMut(&[NodeChanges])>>,
    /// Tick counter driving grace deadlines.
    pub(crate) now: u64,
    pub(crate) destroy_queue: Vec<VNodeId>,
}

impl VTree {
    pub fn new(config: TreeConfig) -> Self {
        Self {
            slots: Vec::new(),
            root: None,
            config,
            tags: TagTable::new(),
            registry: Registry::new(),
            changes: ChangeLog::new(),
            scheduler: Box::new(NullScheduler),
            prefixes: Box::new(NoPrefix),
            observer: None,
            now: 0,
            destroy_queue: Vec::new(),
        }
    }

    pub fn set_scheduler(&mut self, scheduler: Box<dyn Scheduler>) {
        self.scheduler = scheduler;
    }

    pub fn set_prefix_resolver(&mut self, prefixes: Box<dyn PrefixResolver>) {
        self.prefixes = prefixes;
    }

    pub fn set_observer(&mut self, observer: Box<dyn FnMut(&[NodeChanges])>) {
        self.observer = Some(observer);
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn tags_mut(&mut self) -> &mut TagTable {
        &mut self.tags
    }

    pub fn root(&self) -> Option<VNodeId> {
        self.root
    }

    pub fn set_root(&mut self, id: VNodeId) {
        self.root = Some(id);
    }

    // ---- node storage ----

    pub(crate) fn alloc(&mut self, node: VNode) -> VNodeId {
        let id = VNodeId(self.slots.len() as u32);
        self.slots.push(node);
        id
    }

    pub fn node(&self, id: VNodeId) -> &VNode {
        &self.slots[id.0 as usize]
    }

    pub(crate) fn node_mut(&mut self, id: VNodeId) -> &mut VNode {
        &mut self.slots[id.0 as usize]
    }

    /// Create a detached Element vnode.
    pub fn create_element(&mut self, tag: &str, namespace: Namespace, is_void: bool) -> VNodeId {
        let mut node = VNode::new(NodeKind::Element);
        node.tag = tag.to_ascii_lowercase();
        node.namespace = namespace;
        node.is_void = is_void;
        self.alloc(node)
    }

    /// Create a detached Text vnode; content is stored verbatim.
    pub fn create_text(&mut self, text: &str) -> VNodeId {
        let mut node = VNode::new(NodeKind::Text);
        node.text = text.to_string();
        self.alloc(node)
    }

    /// Create a detached Comment vnode; content is stored verbatim.
    pub fn create_comment(&mut self, text: &str) -> VNodeId {
        let mut node = VNode::new(NodeKind::Comment);
        node.text = text.to_string();
        self.alloc(node)
    }

    // ---- derived attribute state ----

    /// Write one attribute value into the vnode, keeping `class_names`/`styles`
    /// consistent with the raw strings. No host write, no lock checks.
    pub(crate) fn apply_attr_value(&mut self, id: VNodeId, name: &str, value: Option<&str>) {
        match name {
            "class" => {
                let extract = extract_class(value.unwrap_or(""));
                let node = self.node_mut(id);
                node.class_names = extract.class_names;
                match extract.attr_class {
                    Some(canonical) => node.attrs.set("class", &canonical),
                    None => {
                        node.attrs.remove("class");
                    }
                }
            }
            "style" => {
                let options = ExtractOptions {
                    pseudo_groups: self.config.pseudo_groups,
                };
                let extract = extract_style(value.unwrap_or(""), options, self.prefixes.as_ref());
                let node = self.node_mut(id);
                node.styles = extract.styles;
                match extract.attr_style {
                    Some(canonical) => node.attrs.set("style", &canonical),
                    None => {
                        node.attrs.remove("style");
                    }
                }
            }
            _ => {
                let node = self.node_mut(id);
                match value {
                    Some(value) => node.attrs.set(name, value),
                    None => {
                        node.attrs.remove(name);
                    }
                }
            }
        }
    }

    // ---- navigation ----

    pub fn parent(&self, id: VNodeId) -> Option<VNodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: VNodeId) -> &[VNodeId] {
        &self.node(id).children
    }

    pub fn state(&self, id: VNodeId) -> NodeState {
        self.node(id).state
    }

    /// Live-node pairing for `id`; broken only when the node is destroyed.
    pub fn host_of(&self, id: VNodeId) -> Option<HostKey> {
        self.registry.host_of(id)
    }

    /// Element-only children, lazily cached per parent.
    pub fn element_children(&self, id: VNodeId) -> Rc<Vec<VNodeId>> {
        let node = self.node(id);
        let mut cache = node.element_children.borrow_mut();
        if let Some(cached) = cache.as_ref() {
            return Rc::clone(cached);
        }
        let computed = Rc::new(
            node.children
                .iter()
                .copied()
                .filter(|child| self.node(*child).kind == NodeKind::Element)
                .collect::<Vec<_>>(),
        );
        *cache = Some(Rc::clone(&computed));
        computed
    }

    pub fn prev_sibling(&self, id: VNodeId) -> Option<VNodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|s| *s == id)?;
        index.checked_sub(1).map(|i| siblings[i])
    }

    pub fn next_sibling(&self, id: VNodeId) -> Option<VNodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|s| *s == id)?;
        siblings.get(index + 1).copied()
    }

    pub fn prev_element_sibling(&self, id: VNodeId) -> Option<VNodeId> {
        let parent = self.parent(id)?;
        let elements = self.element_children(parent);
        let index = elements.iter().position(|s| *s == id)?;
        index.checked_sub(1).map(|i| elements[i])
    }

    pub fn next_element_sibling(&self, id: VNodeId) -> Option<VNodeId> {
        let parent = self.parent(id)?;
        let elements = self.element_children(parent);
        let index = elements.iter().position(|s| *s == id)?;
        elements.get(index + 1).copied()
    }

    // ---- structural primitives ----

    pub(crate) fn invalidate_element_cache(&mut self, parent: VNodeId) {
        *self.node(parent).element_children.borrow_mut() = None;
    }

    pub(crate) fn push_child(&mut self, parent: VNodeId, child: VNodeId) {
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.push(child);
        self.invalidate_element_cache(parent);
    }

    pub(crate) fn insert_child_at(&mut self, parent: VNodeId, index: usize, child: VNodeId) {
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.insert(index, child);
        self.invalidate_element_cache(parent);
    }

    /// Detach `child` from `parent`'s list; the slot stays queryable.
    pub(crate) fn remove_child(&mut self, parent: VNodeId, child: VNodeId) {
        self.node_mut(parent).children.retain(|c| *c != child);
        self.node_mut(child).parent = None;
        self.invalidate_element_cache(parent);
    }

    // ---- serialization ----

    /// Serialize the node's children back to markup.
    pub fn inner_markup(&self, id: VNodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.write_markup(*child, &mut out);
        }
        out
    }

    /// Serialize the node and its subtree back to markup.
    pub fn outer_markup(&self, id: VNodeId) -> String {
        let mut out = String::new();
        self.write_markup(id, &mut out);
        out
    }

    fn write_markup(&self, id: VNodeId, out: &mut String) {
        let node = self.node(id);
        match node.kind {
            NodeKind::Text => out.push_str(&node.text),
            NodeKind::Comment => {
                out.push_str("<!--");
                out.push_str(&node.text);
                out.push_str("-->");
            }
            NodeKind::Element => {
                out.push('<');
                out.push_str(&node.tag);
                for (name, value) in node.attrs.iter() {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        if value.contains('"') {
                            out.push_str(&value.replace('"', "&quot;"));
                        } else {
                            out.push_str(value);
                        }
                        out.push('"');
                    }
                }
                out.push('>');
                if node.is_void {
                    return;
                }
                for child in &node.children {
                    self.write_markup(*child, out);
                }
                out.push_str("</");
                out.push_str(&node.tag);
                out.push('>');
            }
        }
    }
}
