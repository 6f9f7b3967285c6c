// src/collab/mod.rs

//! Narrow interfaces to the collaborators the engine drives.
//!
//! The engine never talks to the server, the widgets or the record store
//! directly. It issues calls through these traits:
//!
//! - [`DataLayer`]: data-view lifecycle operations and snapshots.
//! - [`Presentation`]: action enablement, refresh, form setup.
//! - [`Transport`]: outbound commands to the server.
//! - [`TaskService`]: per-task policy decisions during setup.
//! - [`EventDispatcher`]: running a task's handlers for an event.
//! - [`TimerScheduler`]: cancellable scheduled callbacks.
//!
//! [`memory`] and [`console`] provide in-process implementations used by the
//! binary and the tests; [`timer`] provides the tokio-backed scheduler.

use std::time::Duration;

use crate::actions::ActionCode;
use crate::cache::{CacheKey, FieldValue, ViewSnapshot};
use crate::engine::EngineState;
use crate::errors::Result;
use crate::event::EventDescriptor;
use crate::task::{TaskId, TaskNode};
use crate::types::RefreshScope;

pub mod console;
pub mod memory;
pub mod timer;

pub use console::{DefaultTaskService, PassiveDispatcher, TracingPresentation, TracingTransport};
pub use memory::InMemoryDataLayer;
pub use timer::{InertTimers, TokioTimers};

/// Outcome of an operation that may fail without being an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnResult {
    success: bool,
    description: Option<String>,
}

impl ReturnResult {
    pub fn success() -> Self {
        Self {
            success: true,
            description: None,
        }
    }

    pub fn failure(description: impl Into<String>) -> Self {
        Self {
            success: false,
            description: Some(description.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Data-view lifecycle operations, issued as opaque commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataViewOp {
    CreateFirstRecord,
    Init,
    Prepare,
    InitDataControlViews,
    FirstChunk,
    Clear,
    RecomputeCurrentRecord,
    Locate(String),
}

pub trait DataLayer {
    fn execute(&mut self, task_tag: &str, op: &DataViewOp) -> Result<ReturnResult>;
    /// Owned deep copy of the task's live view, for cache insertion.
    fn replicate(&self, task_tag: &str) -> Option<ViewSnapshot>;
    fn is_changed(&self, task_tag: &str) -> bool;
    fn set_changed(&mut self, task_tag: &str, changed: bool);
    /// Position fingerprint of the live view.
    fn position_key(&self, task_tag: &str) -> Option<CacheKey>;
    /// Replace the live view's content with a cached snapshot.
    fn swap_in(&mut self, task_tag: &str, snapshot: ViewSnapshot);
    /// Current value of a field; `None` when the task or field is unknown.
    fn field_value(&self, task_tag: &str, field_index: usize) -> Option<FieldValue>;
}

pub trait Presentation {
    fn enable_action(&mut self, task_tag: &str, code: ActionCode, on: bool);
    fn refresh_display(&mut self, task_tag: &str, scope: RefreshScope);
    fn init_form(&mut self, task_tag: &str) -> Result<()>;
    fn save_ui_state(&mut self, task_tag: &str);
    fn detach_task(&mut self, task_tag: &str);
    fn show_error(&mut self, task_tag: &str, message: &str);
}

/// Outbound command, targeted at a task by tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Execute { target_tag: String, name: String },
    TaskExited { tag: String },
    Close { tag: String },
    Commit { tag: String, trans_id: String },
    CacheEvictions { tag: String, keys: String },
}

impl ClientCommand {
    pub fn target_tag(&self) -> &str {
        match self {
            ClientCommand::Execute { target_tag, .. } => target_tag,
            ClientCommand::TaskExited { tag }
            | ClientCommand::Close { tag }
            | ClientCommand::Commit { tag, .. }
            | ClientCommand::CacheEvictions { tag, .. } => tag,
        }
    }
}

pub trait Transport {
    fn send(&mut self, commands: Vec<ClientCommand>) -> Result<()>;
}

pub trait TaskService {
    /// Whether the task prefix counts as already executed when setup begins.
    fn task_prefix_executed(&self, task: &TaskNode) -> bool;

    /// Final per-task decisions (subform caching, modal coercion).
    fn prepare_task(&mut self, task: &mut TaskNode) -> Result<ReturnResult>;
}

/// Whether handler execution asked the engine to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Continue,
    StopExecution,
}

/// Runs a task's handlers for an event.
///
/// Handlers may re-enter the lifecycle (for example end a task from inside a
/// suffix handler); `state` gives them the same engine state the caller is
/// operating on and `self` serves as the dispatcher for nested calls.
pub trait EventDispatcher {
    fn deliver(
        &mut self,
        state: &mut EngineState,
        task: TaskId,
        event: &EventDescriptor,
    ) -> Result<Delivery>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

pub trait TimerScheduler {
    fn schedule(&mut self, task_tag: &str, delay: Duration) -> TimerHandle;
    fn cancel(&mut self, handle: TimerHandle);
}
