// src/task/mod.rs

//! The task tree and its lifecycle.
//!
//! - [`node`] holds the per-task entity and its state-machine fields.
//! - [`tree`] is the arena owning every node; links between nodes are
//!   non-owning [`TaskId`]s.
//! - [`materialize`] builds subtrees from protocol elements.
//! - [`lifecycle`] implements start / setup / stop and the record cycle.
//! - [`end_task`] implements the two-phase close protocol.
//! - [`broadcast`] delivers internal events to cooperating tasks.
//! - [`cache_protocol`] keeps subform caches consistent with the live views.
//! - [`enablement`] forwards action-ledger changes to the presentation layer.
//! - [`locate`] drives incremental locate and its debounce timer.

pub mod broadcast;
pub mod cache_protocol;
pub mod enablement;
pub mod end_task;
pub mod lifecycle;
pub mod locate;
pub mod materialize;
pub mod node;
pub mod tree;

use std::fmt;

pub use materialize::TaskElement;
pub use node::{
    DefinitionId, FlowControl, LocateQuery, RecordCycle, StopState, TaskNode, TaskPhase,
};
pub use tree::TaskTree;

/// Non-owning handle to a task in the [`TaskTree`].
///
/// Ids are allocated in creation order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u32);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
