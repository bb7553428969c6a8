//! Replay of an external mutation feed.
//!
//! When the live tree changes outside this library's own writes, the embedder
//! hands the observed records here and the shadow state is re-derived from
//! them.
//!
//! Contract:
//! - Replay is echo-safe: a record describing state the shadow tree already
//!   holds (the feed reporting our own write back) is skipped without
//!   re-notifying.
//! - Removal records are idempotent; re-adding a node inside its grace window
//!   revives it instead of mirroring a duplicate.
//! - Records naming a live node this tree has never paired fail with
//!   [`ReplayError::UnknownTarget`], except added children, which are
//!   mirrored on first sight.

use crate::host::{Host, HostError, HostKey};
use crate::notify::ChangeKind;
use crate::vnode::{NodeState, VNodeId, VTree};

#[derive(Clone, Debug, PartialEq)]
pub enum MutationRecord {
    /// Attribute changed (`Some`) or removed (`None`).
    Attribute {
        target: HostKey,
        name: String,
        value: Option<String>,
    },
    ChildList {
        target: HostKey,
        added: Vec<HostKey>,
        removed: Vec<HostKey>,
    },
    CharacterData { target: HostKey, text: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayError {
    UnknownTarget(HostKey),
    Host(HostError),
}

impl From<HostError> for ReplayError {
    fn from(err: HostError) -> Self {
        ReplayError::Host(err)
    }
}

impl VTree {
    /// Apply a batch of observed records to the shadow tree.
    pub fn replay(
        &mut self,
        host: &dyn Host,
        records: &[MutationRecord],
    ) -> Result<(), ReplayError> {
        for record in records {
            match record {
                MutationRecord::Attribute {
                    target,
                    name,
                    value,
                } => self.replay_attribute(*target, name, value.as_deref())?,
                MutationRecord::ChildList {
                    target,
                    added,
                    removed,
                } => self.replay_child_list(host, *target, added, removed)?,
                MutationRecord::CharacterData { target, text } => {
                    self.replay_character_data(*target, text)?
                }
            }
        }
        Ok(())
    }

    fn replay_attribute(
        &mut self,
        target: HostKey,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), ReplayError> {
        let id = self
            .registry
            .vnode_of(target)
            .ok_or(ReplayError::UnknownTarget(target))?;
        let name = name.to_ascii_lowercase();
        let old = self.node(id).attrs.get(&name).map(String::from);
        if old.as_deref() == value {
            // Echo of our own write.
            log::trace!(target: "vtree.mutations", "skipping attribute echo on {target:?}");
            return Ok(());
        }
        self.apply_attr_value(id, &name, value);
        if name == "id" {
            self.registry.rename_id(old.as_deref(), value, target);
        }
        self.record_change(
            id,
            ChangeKind::Attribute {
                name,
                old,
                new: value.map(String::from),
            },
        );
        Ok(())
    }

    fn replay_character_data(&mut self, target: HostKey, text: &str) -> Result<(), ReplayError> {
        let id = self
            .registry
            .vnode_of(target)
            .ok_or(ReplayError::UnknownTarget(target))?;
        if self.node(id).text == text {
            return Ok(());
        }
        let old = std::mem::replace(&mut self.node_mut(id).text, text.to_string());
        self.record_change(
            id,
            ChangeKind::Text {
                old,
                new: text.to_string(),
            },
        );
        Ok(())
    }

    fn replay_child_list(
        &mut self,
        host: &dyn Host,
        target: HostKey,
        added: &[HostKey],
        removed: &[HostKey],
    ) -> Result<(), ReplayError> {
        let parent = self
            .registry
            .vnode_of(target)
            .ok_or(ReplayError::UnknownTarget(target))?;
        let mut changed = false;

        for key in removed {
            let Some(child) = self.registry.vnode_of(*key) else {
                // Never paired; nothing to undo.
                continue;
            };
            if self.parent(child) != Some(parent) {
                // Already detached on our side; teardown is idempotent.
                continue;
            }
            self.remove_child(parent, child);
            let deadline = self.now + self.config.destroy_grace_ticks;
            self.node_mut(child).state = NodeState::PendingRemoval { deadline };
            self.destroy_queue.push(child);
            self.scheduler.request_tick();
            changed = true;
        }

        let host_children = host.children(target)?;
        for key in added {
            let child = match self.registry.vnode_of(*key) {
                Some(existing) => {
                    if self.parent(existing) == Some(parent) {
                        continue;
                    }
                    // Re-added within the grace window: revive instead of
                    // mirroring a duplicate.
                    if matches!(self.state(existing), NodeState::PendingRemoval { .. }) {
                        self.node_mut(existing).state = NodeState::Live;
                    }
                    if let Some(old_parent) = self.parent(existing) {
                        self.remove_child(old_parent, existing);
                        self.record_change(old_parent, ChangeKind::ChildList);
                    }
                    existing
                }
                None => self.mirror_subtree(host, *key)?,
            };
            let index = self.shadow_index(parent, &host_children, *key);
            self.insert_child_at(parent, index, child);
            changed = true;
        }

        if changed {
            self.record_change(parent, ChangeKind::ChildList);
        }
        Ok(())
    }

    /// Map a live child's position to the index it should occupy in the
    /// shadow child list: count preceding live siblings the shadow already
    /// tracks.
    fn shadow_index(&self, parent: VNodeId, host_children: &[HostKey], key: HostKey) -> usize {
        let Some(position) = host_children.iter().position(|k| *k == key) else {
            return self.children(parent).len();
        };
        host_children[..position]
            .iter()
            .filter(|k| {
                self.registry
                    .vnode_of(**k)
                    .is_some_and(|v| self.parent(v) == Some(parent))
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::tags::Namespace;
    use crate::vnode::{NodeKind, TreeConfig, VNodeId};

    fn mirrored(host: &mut MemoryHost) -> (VTree, VNodeId, HostKey) {
        let root_key = host.create_element("div", Namespace::Html);
        let mut tree = VTree::new(TreeConfig::default());
        let root = tree.mirror_root(host, root_key).expect("mirror failed");
        (tree, root, root_key)
    }

    #[test]
    fn external_attribute_change_updates_shadow() {
        let mut host = MemoryHost::new();
        let (mut tree, root, root_key) = mirrored(&mut host);
        host.set_attribute(root_key, "class", "late").expect("attr failed");
        tree.replay(
            &host,
            &[MutationRecord::Attribute {
                target: root_key,
                name: "class".to_string(),
                value: Some("late".to_string()),
            }],
        )
        .expect("replay failed");
        assert_eq!(tree.node(root).attrs.get("class"), Some("late"));
        assert!(tree.node(root).class_names.contains("late"));
    }

    #[test]
    fn echo_of_own_write_is_skipped_without_renotifying() {
        let mut host = MemoryHost::new();
        let (mut tree, root, root_key) = mirrored(&mut host);
        tree.set_attribute(&mut host, root, "data-x", "1")
            .expect("set failed");
        tree.tick(&mut host);
        tree.replay(
            &host,
            &[MutationRecord::Attribute {
                target: root_key,
                name: "data-x".to_string(),
                value: Some("1".to_string()),
            }],
        )
        .expect("replay failed");
        assert!(
            tree.changes.is_empty(),
            "expected echo record to leave no pending notification"
        );
    }

    #[test]
    fn external_child_addition_is_mirrored_in_position() {
        let mut host = MemoryHost::new();
        let (mut tree, root, root_key) = mirrored(&mut host);
        tree.set_inner_markup(&mut host, root, "<p>a</p><p>c</p>")
            .expect("set failed");
        let anchor = host.children(root_key).expect("children")[1];
        let b = host.create_element("span", Namespace::Html);
        host.insert_before(root_key, b, Some(anchor)).expect("insert failed");
        tree.replay(
            &host,
            &[MutationRecord::ChildList {
                target: root_key,
                added: vec![b],
                removed: vec![],
            }],
        )
        .expect("replay failed");
        let children = tree.children(root);
        assert_eq!(children.len(), 3);
        assert_eq!(tree.node(children[1]).tag, "span");
        assert_eq!(tree.vnode_for(b), Some(children[1]));
    }

    #[test]
    fn external_removal_is_idempotent() {
        let mut host = MemoryHost::new();
        let (mut tree, root, root_key) = mirrored(&mut host);
        tree.set_inner_markup(&mut host, root, "<p>a</p>")
            .expect("set failed");
        let p_key = host.children(root_key).expect("children")[0];
        let p = tree.children(root)[0];
        host.remove(p_key).expect("remove failed");
        let record = MutationRecord::ChildList {
            target: root_key,
            added: vec![],
            removed: vec![p_key],
        };
        tree.replay(&host, std::slice::from_ref(&record)).expect("replay failed");
        assert!(matches!(tree.state(p), NodeState::PendingRemoval { .. }));
        assert!(tree.children(root).is_empty());
        // Same record again is a no-op.
        tree.replay(&host, std::slice::from_ref(&record)).expect("replay failed");
        assert!(tree.children(root).is_empty());
    }

    #[test]
    fn readd_during_grace_revives_instead_of_duplicating() {
        let mut host = MemoryHost::new();
        let (mut tree, root, root_key) = mirrored(&mut host);
        tree.set_inner_markup(&mut host, root, "<p id=\"keep\">a</p>")
            .expect("set failed");
        let p_key = host.children(root_key).expect("children")[0];
        let p = tree.children(root)[0];
        host.remove(p_key).expect("remove failed");
        tree.replay(
            &host,
            &[MutationRecord::ChildList {
                target: root_key,
                added: vec![],
                removed: vec![p_key],
            }],
        )
        .expect("replay failed");
        host.insert_before(root_key, p_key, None).expect("insert failed");
        tree.replay(
            &host,
            &[MutationRecord::ChildList {
                target: root_key,
                added: vec![p_key],
                removed: vec![],
            }],
        )
        .expect("replay failed");
        assert_eq!(tree.children(root), &[p][..], "expected same vnode revived");
        assert_eq!(tree.state(p), NodeState::Live);
        // The queued destroy must see the revived state and stand down.
        tree.tick(&mut host);
        assert_eq!(tree.state(p), NodeState::Live);
    }

    #[test]
    fn character_data_record_updates_text() {
        let mut host = MemoryHost::new();
        let (mut tree, root, root_key) = mirrored(&mut host);
        tree.set_inner_markup(&mut host, root, "before")
            .expect("set failed");
        let text_key = host.children(root_key).expect("children")[0];
        host.set_text(text_key, "after").expect("set failed");
        tree.replay(
            &host,
            &[MutationRecord::CharacterData {
                target: text_key,
                text: "after".to_string(),
            }],
        )
        .expect("replay failed");
        let text = tree.children(root)[0];
        assert_eq!(tree.node(text).kind, NodeKind::Text);
        assert_eq!(tree.node(text).text, "after");
    }

    #[test]
    fn unknown_target_fails() {
        let host = MemoryHost::new();
        let mut tree = VTree::new(TreeConfig::default());
        let result = tree.replay(
            &host,
            &[MutationRecord::CharacterData {
                target: HostKey(7),
                text: "x".to_string(),
            }],
        );
        assert_eq!(result, Err(ReplayError::UnknownTarget(HostKey(7))));
    }
}
