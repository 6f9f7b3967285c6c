// src/collab/console.rs

//! Collaborators that only log, for running the engine without a UI or a
//! server.

use tracing::{debug, info, warn};

use crate::actions::ActionCode;
use crate::collab::{
    ClientCommand, Delivery, EventDispatcher, Presentation, ReturnResult, TaskService, Transport,
};
use crate::engine::EngineState;
use crate::errors::Result;
use crate::event::EventDescriptor;
use crate::task::{TaskId, TaskNode};
use crate::types::RefreshScope;

#[derive(Debug, Default)]
pub struct TracingPresentation;

impl Presentation for TracingPresentation {
    fn enable_action(&mut self, task_tag: &str, code: ActionCode, on: bool) {
        debug!(task = %task_tag, code, on, "action state changed");
    }

    fn refresh_display(&mut self, task_tag: &str, scope: RefreshScope) {
        debug!(task = %task_tag, ?scope, "refresh display");
    }

    fn init_form(&mut self, task_tag: &str) -> Result<()> {
        debug!(task = %task_tag, "form initialised");
        Ok(())
    }

    fn save_ui_state(&mut self, task_tag: &str) {
        debug!(task = %task_tag, "ui state saved");
    }

    fn detach_task(&mut self, task_tag: &str) {
        debug!(task = %task_tag, "presentation references cleared");
    }

    fn show_error(&mut self, task_tag: &str, message: &str) {
        warn!(task = %task_tag, %message, "error shown to user");
    }
}

#[derive(Debug, Default)]
pub struct TracingTransport;

impl Transport for TracingTransport {
    fn send(&mut self, commands: Vec<ClientCommand>) -> Result<()> {
        for command in commands {
            info!(?command, "outbound command");
        }
        Ok(())
    }
}

/// Caching only applies to subforms; child windows open modal.
#[derive(Debug, Default)]
pub struct DefaultTaskService;

impl TaskService for DefaultTaskService {
    fn task_prefix_executed(&self, _task: &TaskNode) -> bool {
        false
    }

    fn prepare_task(&mut self, task: &mut TaskNode) -> Result<ReturnResult> {
        if task.cached && !task.is_subform {
            debug!(task = %task.tag, "caching requested on a non-subform task; disabled");
            task.cached = false;
        }
        if task.has_form && !task.is_subform && task.parent.is_some() {
            task.modal = true;
        }
        Ok(ReturnResult::success())
    }
}

/// Dispatcher with no handlers: every event is accepted.
#[derive(Debug, Default)]
pub struct PassiveDispatcher;

impl EventDispatcher for PassiveDispatcher {
    fn deliver(
        &mut self,
        state: &mut EngineState,
        task: TaskId,
        event: &EventDescriptor,
    ) -> Result<Delivery> {
        let tag = state.tree.tag_of(task).unwrap_or("?");
        debug!(task = %tag, ?event, "event delivered");
        Ok(Delivery::Continue)
    }
}
