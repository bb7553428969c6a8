//! Reconciliation: child-list diffing, attribute diffing, text
//! normalization, grace-delayed destruction.
//!
//! Contract:
//! - `set_children` pairs old and desired children by index; each overlapping
//!   pair is classified by kind: same-tag Elements update in place (live-node
//!   identity preserved), matching character-data kinds update text in place,
//!   every other pairing replaces the live node at that position.
//! - Surplus desired children append; surplus old children detach from the
//!   live tree immediately and destroy only after the grace delay.
//! - Locked attribute names and the reserved name are skipped silently by
//!   reconciliation and rejected loudly on the non-privileged write paths.
//! - After any structural change the parent is normalized: empty Text vnodes
//!   go away and newly-adjacent Text siblings merge.

use crate::host::{Host, HostError, HostKey, HostResult};
use crate::notify::ChangeKind;
use crate::vnode::{NodeKind, NodeState, RESERVED_ATTR, VNodeId, VTree};

/// Rejection from a non-privileged attribute write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttrError {
    /// The name is in the caller-declared locked set.
    Locked(String),
    /// The name is reserved for the hosting environment.
    Reserved(String),
    NotAnElement(VNodeId),
    Host(HostError),
}

impl From<HostError> for AttrError {
    fn from(err: HostError) -> Self {
        AttrError::Host(err)
    }
}

impl VTree {
    // ---- public write surface ----

    /// Replace `parent`'s children with the trees parsed from `markup`.
    pub fn set_inner_markup(
        &mut self,
        host: &mut dyn Host,
        parent: VNodeId,
        markup: &str,
    ) -> HostResult<()> {
        let desired = self.parse_markup(markup);
        self.set_children(host, parent, desired)
    }

    /// Reconcile `parent`'s children against `desired` (detached vnodes,
    /// consumed by this call).
    pub fn set_children(
        &mut self,
        host: &mut dyn Host,
        parent: VNodeId,
        desired: Vec<VNodeId>,
    ) -> HostResult<()> {
        let old: Vec<VNodeId> = self.children(parent).to_vec();
        let parent_host = self.host_of(parent);
        let pairs = old.len().max(desired.len());
        let mut kept: Vec<VNodeId> = Vec::with_capacity(desired.len());
        let mut structural = false;

        for i in 0..pairs {
            match (old.get(i).copied(), desired.get(i).copied()) {
                (Some(current), Some(wanted)) => {
                    let current_kind = self.node(current).kind;
                    let wanted_kind = self.node(wanted).kind;
                    if current_kind == NodeKind::Element
                        && wanted_kind == NodeKind::Element
                        && self.node(current).tag == self.node(wanted).tag
                    {
                        self.update_in_place(host, current, wanted)?;
                        kept.push(current);
                    } else if current_kind == wanted_kind && current_kind != NodeKind::Element {
                        let text = self.node(wanted).text.clone();
                        if self.node(current).text != text {
                            self.write_text(host, current, &text)?;
                        }
                        self.node_mut(wanted).state = NodeState::Destroyed;
                        kept.push(current);
                    } else {
                        // Kind or tag mismatch: no identity reuse.
                        if let Some(parent_key) = parent_host {
                            let new_key = self.attach_subtree(host, wanted)?;
                            let anchor = self.host_of(current);
                            host.insert_before(parent_key, new_key, anchor)?;
                        }
                        self.schedule_removal(host, current)?;
                        self.node_mut(wanted).parent = Some(parent);
                        kept.push(wanted);
                        structural = true;
                    }
                }
                (Some(current), None) => {
                    self.schedule_removal(host, current)?;
                    structural = true;
                }
                (None, Some(wanted)) => {
                    if let Some(parent_key) = parent_host {
                        let new_key = self.attach_subtree(host, wanted)?;
                        host.insert_before(parent_key, new_key, None)?;
                    }
                    self.node_mut(wanted).parent = Some(parent);
                    kept.push(wanted);
                    structural = true;
                }
                (None, None) => unreachable!("index bounded by max(old, desired)"),
            }
        }

        self.node_mut(parent).children = kept;
        self.invalidate_element_cache(parent);
        if structural {
            self.record_change(parent, ChangeKind::ChildList);
        }
        self.normalize(host, parent)
    }

    /// Non-privileged attribute write: rejects locked/reserved names, keeps
    /// the id registry in sync, mirrors to the live node.
    pub fn set_attribute(
        &mut self,
        host: &mut dyn Host,
        id: VNodeId,
        name: &str,
        value: &str,
    ) -> Result<(), AttrError> {
        let name = name.to_ascii_lowercase();
        if self.node(id).kind != NodeKind::Element {
            return Err(AttrError::NotAnElement(id));
        }
        self.check_unlocked(&name)?;
        let old = self.node(id).attrs.get(&name).map(String::from);
        self.apply_attr_value(id, &name, Some(value));
        // class/style canonicalize on the way in; a value that canonicalizes
        // to nothing drops the attribute outright.
        let canonical = self.node(id).attrs.get(&name).map(String::from);
        if old.is_none() && canonical.is_none() {
            return Ok(());
        }
        if let Some(key) = self.host_of(id) {
            match &canonical {
                Some(canonical) => host.set_attribute(key, &name, canonical)?,
                None => host.remove_attribute(key, &name)?,
            }
            if name == "id" {
                self.registry.rename_id(old.as_deref(), canonical.as_deref(), key);
            }
        }
        self.record_change(
            id,
            ChangeKind::Attribute {
                name,
                old,
                new: canonical,
            },
        );
        Ok(())
    }

    /// Non-privileged attribute removal; same rejection rules as
    /// [`VTree::set_attribute`].
    pub fn remove_attribute(
        &mut self,
        host: &mut dyn Host,
        id: VNodeId,
        name: &str,
    ) -> Result<(), AttrError> {
        let name = name.to_ascii_lowercase();
        if self.node(id).kind != NodeKind::Element {
            return Err(AttrError::NotAnElement(id));
        }
        self.check_unlocked(&name)?;
        let Some(old) = self.node(id).attrs.get(&name).map(String::from) else {
            return Ok(());
        };
        self.apply_attr_value(id, &name, None);
        if let Some(key) = self.host_of(id) {
            host.remove_attribute(key, &name)?;
            if name == "id" {
                self.registry.rename_id(Some(&old), None, key);
            }
        }
        self.record_change(
            id,
            ChangeKind::Attribute {
                name,
                old: Some(old),
                new: None,
            },
        );
        Ok(())
    }

    /// Update a Text/Comment vnode's content, mirroring to the live node.
    pub fn set_text(&mut self, host: &mut dyn Host, id: VNodeId, text: &str) -> HostResult<()> {
        debug_assert_ne!(self.node(id).kind, NodeKind::Element);
        if self.node(id).text == text {
            return Ok(());
        }
        self.write_text(host, id, text)
    }

    /// Remove empty Text vnodes under `parent` and merge newly-adjacent Text
    /// siblings, so no two Text siblings remain adjacent.
    pub fn normalize(&mut self, host: &mut dyn Host, parent: VNodeId) -> HostResult<()> {
        let children = self.children(parent).to_vec();
        let mut result: Vec<VNodeId> = Vec::with_capacity(children.len());
        let mut changed = false;
        for child in children {
            if self.node(child).kind == NodeKind::Text {
                if self.node(child).text.is_empty() {
                    self.schedule_removal(host, child)?;
                    changed = true;
                    continue;
                }
                if let Some(&prev) = result.last() {
                    if self.node(prev).kind == NodeKind::Text {
                        let merged =
                            format!("{}{}", self.node(prev).text, self.node(child).text);
                        self.write_text(host, prev, &merged)?;
                        self.schedule_removal(host, child)?;
                        changed = true;
                        continue;
                    }
                }
            }
            result.push(child);
        }
        if changed {
            self.node_mut(parent).children = result;
            self.invalidate_element_cache(parent);
            self.record_change(parent, ChangeKind::ChildList);
        }
        Ok(())
    }

    /// Advance the tick counter, finalize due destructions, flush the
    /// notification batch.
    pub fn tick(&mut self, host: &mut dyn Host) {
        self.now += 1;
        let now = self.now;
        let queue = std::mem::take(&mut self.destroy_queue);
        let mut waiting = Vec::new();
        for node in queue {
            match self.state(node) {
                NodeState::PendingRemoval { deadline } if deadline <= now => {
                    self.finalize_destroy(host, node);
                }
                NodeState::PendingRemoval { .. } => waiting.push(node),
                // Revived or already finalized since queueing.
                _ => {}
            }
        }
        self.destroy_queue = waiting;
        if !self.destroy_queue.is_empty() {
            self.scheduler.request_tick();
        }
        self.flush_changes();
    }

    // ---- internals ----

    fn check_unlocked(&self, name: &str) -> Result<(), AttrError> {
        if name == RESERVED_ATTR {
            log::warn!(target: "vtree.reconcile", "rejected write to reserved attribute {name:?}");
            return Err(AttrError::Reserved(name.to_string()));
        }
        if self.config.locked_attrs.contains(name) {
            log::warn!(target: "vtree.reconcile", "rejected write to locked attribute {name:?}");
            return Err(AttrError::Locked(name.to_string()));
        }
        Ok(())
    }

    fn attr_is_protected(&self, name: &str) -> bool {
        name == RESERVED_ATTR || self.config.locked_attrs.contains(name)
    }

    /// Same-tag Element pair: diff attributes by symmetric key difference,
    /// then recurse into children. `template` is consumed.
    fn update_in_place(
        &mut self,
        host: &mut dyn Host,
        current: VNodeId,
        template: VNodeId,
    ) -> HostResult<()> {
        let key = self.host_of(current);
        let old_attrs: Vec<(String, String)> = self
            .node(current)
            .attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let new_attrs: Vec<(String, String)> = self
            .node(template)
            .attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        for (name, old_value) in &old_attrs {
            if new_attrs.iter().any(|(k, _)| k == name) || self.attr_is_protected(name) {
                continue;
            }
            self.apply_attr_value(current, name, None);
            if let Some(key) = key {
                host.remove_attribute(key, name)?;
                if name == "id" {
                    self.registry.rename_id(Some(old_value), None, key);
                }
            }
            self.record_change(
                current,
                ChangeKind::Attribute {
                    name: name.clone(),
                    old: Some(old_value.clone()),
                    new: None,
                },
            );
        }
        for (name, value) in &new_attrs {
            let old = self.node(current).attrs.get(name).map(String::from);
            if old.as_deref() == Some(value.as_str()) || self.attr_is_protected(name) {
                continue;
            }
            self.apply_attr_value(current, name, Some(value));
            if let Some(key) = key {
                host.set_attribute(key, name, value)?;
                if name == "id" {
                    self.registry.rename_id(old.as_deref(), Some(value), key);
                }
            }
            self.record_change(
                current,
                ChangeKind::Attribute {
                    name: name.clone(),
                    old,
                    new: Some(value.clone()),
                },
            );
        }

        let desired = std::mem::take(&mut self.node_mut(template).children);
        self.set_children(host, current, desired)?;
        self.node_mut(template).state = NodeState::Destroyed;
        Ok(())
    }

    /// Create live nodes for a detached vnode subtree, pairing and
    /// registering ids as it goes. Returns the subtree's root key.
    pub(crate) fn attach_subtree(
        &mut self,
        host: &mut dyn Host,
        id: VNodeId,
    ) -> HostResult<HostKey> {
        let key = match self.node(id).kind {
            NodeKind::Element => {
                let tag = self.node(id).tag.clone();
                let namespace = self.node(id).namespace;
                let key = host.create_element(&tag, namespace);
                let attrs: Vec<(String, String)> = self
                    .node(id)
                    .attrs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                for (name, value) in &attrs {
                    host.set_attribute(key, name, value)?;
                    if name == "id" {
                        self.registry.register_id(value, key);
                    }
                }
                key
            }
            NodeKind::Text => host.create_text(&self.node(id).text),
            NodeKind::Comment => host.create_comment(&self.node(id).text),
        };
        self.registry.bind(key, id);
        self.node_mut(id).host = Some(key);
        self.node_mut(id).state = NodeState::Live;
        let children = self.children(id).to_vec();
        for child in children {
            let child_key = self.attach_subtree(host, child)?;
            host.insert_before(key, child_key, None)?;
        }
        Ok(key)
    }

    /// Detach from the live tree now; destruction waits for the grace delay.
    /// Removing an already-detached live node is a no-op.
    pub(crate) fn schedule_removal(
        &mut self,
        host: &mut dyn Host,
        id: VNodeId,
    ) -> HostResult<()> {
        if let Some(key) = self.host_of(id) {
            match host.remove(key) {
                Ok(()) | Err(HostError::Detached(_)) => {}
                Err(err) => return Err(err),
            }
        }
        let deadline = self.now + self.config.destroy_grace_ticks;
        self.node_mut(id).parent = None;
        self.node_mut(id).state = NodeState::PendingRemoval { deadline };
        self.destroy_queue.push(id);
        self.scheduler.request_tick();
        Ok(())
    }

    fn write_text(&mut self, host: &mut dyn Host, id: VNodeId, text: &str) -> HostResult<()> {
        let old = std::mem::replace(&mut self.node_mut(id).text, text.to_string());
        if let Some(key) = self.host_of(id) {
            host.set_text(key, text)?;
        }
        self.record_change(
            id,
            ChangeKind::Text {
                old,
                new: text.to_string(),
            },
        );
        Ok(())
    }

    fn finalize_destroy(&mut self, host: &mut dyn Host, root: VNodeId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(key) = self.node(id).host {
                if let Some(id_attr) = self.node(id).attrs.get("id") {
                    let id_attr = id_attr.to_string();
                    // Another node may have claimed the id since.
                    if self.registry.lookup_id(&id_attr) == Some(key) {
                        self.registry.unregister_id(&id_attr);
                    }
                }
                self.registry.unbind_host(key);
                if let Err(err) = host.destroy(key) {
                    log::debug!(
                        target: "vtree.reconcile",
                        "destroy of {key:?} reported {err:?}"
                    );
                }
            }
            let node = self.node_mut(id);
            node.host = None;
            node.state = NodeState::Destroyed;
            stack.extend(node.children.iter().copied());
        }
        log::trace!(target: "vtree.reconcile", "destroyed subtree at {root:?}");
    }
}
