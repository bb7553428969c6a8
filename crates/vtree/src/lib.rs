pub mod host;
pub mod mutations;
pub mod notify;
pub mod reconcile;
pub mod schedule;
pub mod selector;
pub mod tags;
pub mod vnode;

mod mirror;
mod parse;
mod registry;

// Re-exports so embedders can just use `vtree::...` nicely.
pub use host::{Host, HostError, HostKey, HostResult, MemoryHost};
pub use mutations::{MutationRecord, ReplayError};
pub use notify::{ChangeKind, NodeChanges};
pub use reconcile::AttrError;
pub use schedule::{ManualScheduler, NullScheduler, Scheduler};
pub use tags::{Namespace, TagTable};
pub use vnode::{AttrMap, NodeKind, NodeState, RESERVED_ATTR, TreeConfig, VNode, VNodeId, VTree};
