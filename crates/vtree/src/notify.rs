//! Coalesced change notification.
//!
//! Contract:
//! - Changes are recorded per affected node and flushed as one batch per
//!   tick; within a batch each node appears at most once.
//! - Coalescing merges repeated changes: an attribute keeps the oldest `old`
//!   and the newest `new`, text likewise, and child-list churn collapses to a
//!   single marker.
//! - A suppression guard lets the tree's own internal writes bypass
//!   recording (mutation-feed replay would otherwise re-report them).

use crate::vnode::{VNodeId, VTree};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Attribute {
        name: String,
        old: Option<String>,
        new: Option<String>,
    },
    ChildList,
    Text {
        old: String,
        new: String,
    },
}

/// All coalesced changes for one node within one batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeChanges {
    pub node: VNodeId,
    pub changes: Vec<ChangeKind>,
}

#[derive(Debug, Default)]
pub struct ChangeLog {
    pending: Vec<NodeChanges>,
    suppress: u32,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suppressed(&self) -> bool {
        self.suppress > 0
    }

    pub(crate) fn begin_suppress(&mut self) {
        self.suppress += 1;
    }

    pub(crate) fn end_suppress(&mut self) {
        debug_assert!(self.suppress > 0, "unbalanced suppression guard");
        self.suppress = self.suppress.saturating_sub(1);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn record(&mut self, node: VNodeId, change: ChangeKind) {
        if self.suppressed() {
            return;
        }
        let entry = match self.pending.iter_mut().find(|entry| entry.node == node) {
            Some(entry) => entry,
            None => {
                self.pending.push(NodeChanges {
                    node,
                    changes: Vec::new(),
                });
                self.pending.last_mut().expect("just pushed")
            }
        };
        match change {
            ChangeKind::Attribute { name, old, new } => {
                let merged = entry.changes.iter_mut().find_map(|existing| match existing {
                    ChangeKind::Attribute {
                        name: existing_name,
                        new: existing_new,
                        ..
                    } if *existing_name == name => Some(existing_new),
                    _ => None,
                });
                match merged {
                    Some(existing_new) => *existing_new = new,
                    None => entry.changes.push(ChangeKind::Attribute { name, old, new }),
                }
            }
            ChangeKind::ChildList => {
                if !entry
                    .changes
                    .iter()
                    .any(|existing| matches!(existing, ChangeKind::ChildList))
                {
                    entry.changes.push(ChangeKind::ChildList);
                }
            }
            ChangeKind::Text { old, new } => {
                let merged = entry.changes.iter_mut().find_map(|existing| match existing {
                    ChangeKind::Text {
                        new: existing_new, ..
                    } => Some(existing_new),
                    _ => None,
                });
                match merged {
                    Some(existing_new) => *existing_new = new,
                    None => entry.changes.push(ChangeKind::Text { old, new }),
                }
            }
        }
    }

    pub(crate) fn take_batch(&mut self) -> Vec<NodeChanges> {
        std::mem::take(&mut self.pending)
    }
}

impl VTree {
    /// Record a change for `node` and request a flush tick on the first
    /// record of a batch.
    pub(crate) fn record_change(&mut self, node: VNodeId, change: ChangeKind) {
        if self.changes.suppressed() {
            return;
        }
        let was_empty = self.changes.is_empty();
        self.changes.record(node, change);
        if was_empty && !self.changes.is_empty() {
            self.scheduler.request_tick();
        }
    }

    /// Run `f` with notification recording suppressed.
    pub fn with_suppressed<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.changes.begin_suppress();
        let result = f(self);
        self.changes.end_suppress();
        result
    }

    /// Deliver and clear the pending batch. Called from `tick`.
    pub(crate) fn flush_changes(&mut self) {
        if self.changes.is_empty() {
            return;
        }
        let batch = self.changes.take_batch();
        if let Some(observer) = self.observer.as_mut() {
            observer(&batch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_attribute_changes_coalesce_per_node() {
        let mut changelog = ChangeLog::new();
        let node = VNodeId(1);
        changelog.record(
            node,
            ChangeKind::Attribute {
                name: "class".to_string(),
                old: None,
                new: Some("a".to_string()),
            },
        );
        changelog.record(
            node,
            ChangeKind::Attribute {
                name: "class".to_string(),
                old: Some("a".to_string()),
                new: Some("b".to_string()),
            },
        );
        let batch = changelog.take_batch();
        assert_eq!(batch.len(), 1);
        assert_eq!(
            batch[0].changes,
            vec![ChangeKind::Attribute {
                name: "class".to_string(),
                old: None,
                new: Some("b".to_string()),
            }],
            "expected oldest old and newest new, got: {batch:?}"
        );
    }

    #[test]
    fn child_list_churn_collapses_to_one_marker() {
        let mut changelog = ChangeLog::new();
        let node = VNodeId(1);
        changelog.record(node, ChangeKind::ChildList);
        changelog.record(node, ChangeKind::ChildList);
        let batch = changelog.take_batch();
        assert_eq!(batch[0].changes, vec![ChangeKind::ChildList]);
    }

    #[test]
    fn suppression_drops_records() {
        let mut changelog = ChangeLog::new();
        changelog.begin_suppress();
        changelog.record(VNodeId(1), ChangeKind::ChildList);
        changelog.end_suppress();
        assert!(changelog.is_empty(), "expected suppressed record dropped");
    }

    #[test]
    fn distinct_nodes_keep_distinct_entries() {
        let mut changelog = ChangeLog::new();
        changelog.record(VNodeId(1), ChangeKind::ChildList);
        changelog.record(VNodeId(2), ChangeKind::ChildList);
        assert_eq!(changelog.take_batch().len(), 2);
    }
}
