//! Id registry and host↔vnode pairing.
//!
//! Both are explicit injectable state owned by the tree (no ambient globals):
//! the `id string → host key` table and the bidirectional pairing between
//! host nodes and vnodes.
//!
//! Invariants:
//! - Exactly one vnode per host key at a time; rebinding an occupied key is a
//!   caller bug and is logged before the old entry is dropped.
//! - The id table always reflects the current `id` attribute of every paired
//!   Element vnode; renames unregister the old entry first.

use crate::host::HostKey;
use crate::vnode::VNodeId;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Registry {
    ids: HashMap<String, HostKey>,
    host_to_vnode: HashMap<HostKey, VNodeId>,
    vnode_to_host: HashMap<VNodeId, HostKey>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- pairing ----

    pub fn bind(&mut self, host: HostKey, vnode: VNodeId) {
        if let Some(existing) = self.host_to_vnode.insert(host, vnode) {
            if existing != vnode {
                log::error!(
                    target: "vtree.registry",
                    "host {host:?} was already paired with {existing:?}; rebinding to {vnode:?}"
                );
                self.vnode_to_host.remove(&existing);
            }
        }
        self.vnode_to_host.insert(vnode, host);
    }

    pub fn unbind_host(&mut self, host: HostKey) {
        if let Some(vnode) = self.host_to_vnode.remove(&host) {
            self.vnode_to_host.remove(&vnode);
        }
    }

    pub fn vnode_of(&self, host: HostKey) -> Option<VNodeId> {
        self.host_to_vnode.get(&host).copied()
    }

    pub fn host_of(&self, vnode: VNodeId) -> Option<HostKey> {
        self.vnode_to_host.get(&vnode).copied()
    }

    // ---- id table ----

    pub fn register_id(&mut self, id: &str, host: HostKey) {
        if id.is_empty() {
            return;
        }
        self.ids.insert(id.to_string(), host);
    }

    pub fn unregister_id(&mut self, id: &str) {
        self.ids.remove(id);
    }

    /// Apply an `id` attribute change: old entry out, new entry in.
    pub fn rename_id(&mut self, old: Option<&str>, new: Option<&str>, host: HostKey) {
        if let Some(old) = old {
            // Another node may have claimed the id since; only drop our own entry.
            if self.ids.get(old) == Some(&host) {
                self.ids.remove(old);
            }
        }
        if let Some(new) = new {
            self.register_id(new, host);
        }
    }

    pub fn lookup_id(&self, id: &str) -> Option<HostKey> {
        self.ids.get(id).copied()
    }
}
