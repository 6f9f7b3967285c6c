// src/engine/core.rs

//! Synchronous engine core.
//!
//! [`Engine`] owns the [`EngineState`] and the event dispatcher and exposes
//! the lifecycle operations as methods. It has no channels and performs no
//! IO of its own: everything goes through the collaborators, so the core can
//! be driven step by step from tests.

use std::fmt;

use crate::actions::{ActionCode, ActionGroup};
use crate::cache::{CacheKey, CapacityPolicy};
use crate::collab::{ClientCommand, EventDispatcher, PassiveDispatcher};
use crate::engine::event_handlers::{
    EngineStep, discard_if_ended_root, flush_commands, handle_broadcast, handle_end_task,
    handle_locate_key, handle_locate_timer, handle_open_task,
};
use crate::engine::{Collaborators, EngineEvent, EngineSettings, EngineState};
use crate::errors::Result;
use crate::event::InternalCode;
use crate::task::enablement::{self, ControlFocus};
use crate::task::lifecycle::{self, StartOutcome};
use crate::task::materialize::materialize;
use crate::task::{TaskElement, TaskId, broadcast, cache_protocol, end_task, locate};
use crate::types::{FlowDirection, FlowMode, TaskMode};

pub struct Engine {
    state: EngineState,
    dispatcher: Box<dyn EventDispatcher>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Collaborators::default())
    }
}

impl Engine {
    pub fn new(collab: Collaborators) -> Self {
        Self {
            state: EngineState::new(collab),
            dispatcher: Box::new(PassiveDispatcher),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Box<dyn EventDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_capacity_policy(mut self, policy: Box<dyn CapacityPolicy>) -> Self {
        self.state.capacity = policy;
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.state.settings = settings;
        self
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut EngineState {
        &mut self.state
    }

    /// Resolve a tag to a live task.
    pub fn task(&self, tag: &str) -> Result<TaskId> {
        self.state.tree.id_of(tag)
    }

    /// Handle a single engine event.
    pub fn step(&mut self, event: EngineEvent) -> Result<EngineStep> {
        let dispatcher = self.dispatcher.as_mut();
        let state = &mut self.state;
        match event {
            EngineEvent::OpenTask { tag } => handle_open_task(state, dispatcher, &tag),
            EngineEvent::EndTask { tag, reversible } => {
                handle_end_task(state, dispatcher, &tag, reversible)
            }
            EngineEvent::Broadcast { tag, code } => handle_broadcast(state, dispatcher, &tag, code),
            EngineEvent::LocateKey { tag, ch } => handle_locate_key(state, &tag, ch),
            EngineEvent::LocateTimerFired { tag } => handle_locate_timer(state, dispatcher, &tag),
            EngineEvent::ShutdownRequested => Ok(EngineStep {
                keep_running: false,
            }),
        }
    }

    pub fn materialize(&mut self, element: &TaskElement, parent: Option<TaskId>) -> Result<TaskId> {
        materialize(&mut self.state, element, parent)
    }

    pub fn start(
        &mut self,
        task: TaskId,
        move_to_first_control: bool,
        call_by_dest_subform: bool,
    ) -> Result<StartOutcome> {
        lifecycle::start(
            &mut self.state,
            self.dispatcher.as_mut(),
            task,
            move_to_first_control,
            call_by_dest_subform,
        )
    }

    pub fn open_task(&mut self, task: TaskId) -> Result<Option<TaskId>> {
        lifecycle::open_task(&mut self.state, self.dispatcher.as_mut(), task)
    }

    pub fn record_prefix(&mut self, task: TaskId) -> Result<bool> {
        lifecycle::record_prefix(&mut self.state, self.dispatcher.as_mut(), task)
    }

    pub fn record_suffix(&mut self, task: TaskId) -> Result<bool> {
        lifecycle::record_suffix(&mut self.state, self.dispatcher.as_mut(), task)
    }

    pub fn stop(&mut self, task: TaskId) {
        lifecycle::stop(&mut self.state, task)
    }

    pub fn end_task(
        &mut self,
        task: TaskId,
        reversible_exit: bool,
        only_descendants: bool,
        subform_destination: bool,
        due_to_verify_error: bool,
    ) -> Result<bool> {
        end_task::end_task(
            &mut self.state,
            self.dispatcher.as_mut(),
            task,
            reversible_exit,
            only_descendants,
            subform_destination,
            due_to_verify_error,
        )
    }

    /// Remove an ended (or setup-failed) root subtree from the tree.
    pub fn discard_root(&mut self, task: TaskId) -> bool {
        discard_if_ended_root(&mut self.state, task)
    }

    pub fn handle_event_on_slave_tasks(
        &mut self,
        task: TaskId,
        code: InternalCode,
    ) -> Result<Option<TaskId>> {
        broadcast::handle_event_on_slave_tasks(&mut self.state, self.dispatcher.as_mut(), task, code)
    }

    pub fn enable_action(&mut self, task: TaskId, code: ActionCode, on: bool) -> Result<bool> {
        enablement::enable_action(&mut self.state, task, code, on)
    }

    pub fn enable_action_list(
        &mut self,
        task: TaskId,
        codes: &[ActionCode],
        on: bool,
        only_if_changed: bool,
    ) -> Result<Vec<ActionCode>> {
        enablement::enable_action_list(&mut self.state, task, codes, on, only_if_changed)
    }

    pub fn enable_group(&mut self, task: TaskId, group: ActionGroup, on: bool) -> Result<()> {
        enablement::enable_group(&mut self.state, task, group, on)
    }

    pub fn set_mode(&mut self, task: TaskId, mode: TaskMode) -> Result<()> {
        enablement::set_mode(&mut self.state, task, mode)
    }

    pub fn focus_changed(&mut self, task: TaskId, focus: ControlFocus) -> Result<()> {
        enablement::focus_changed(&mut self.state, task, focus)
    }

    pub fn set_flow(
        &mut self,
        task: TaskId,
        direction: FlowDirection,
        mode: FlowMode,
    ) -> Result<bool> {
        enablement::set_flow(&mut self.state, task, direction, mode)
    }

    pub fn descriptor_fingerprint(&self, task: TaskId) -> Result<CacheKey> {
        cache_protocol::descriptor_fingerprint(&self.state, task)
    }

    pub fn prepare_cache(&mut self, task: TaskId, ignore_current: bool) -> Result<bool> {
        cache_protocol::prepare_cache(&mut self.state, task, ignore_current)
    }

    pub fn test_and_set(&mut self, task: TaskId, ignore_current: bool) -> Result<bool> {
        cache_protocol::test_and_set(&mut self.state, task, ignore_current)
    }

    pub fn clear_cache(&mut self, task: TaskId) -> Result<Vec<CacheKey>> {
        cache_protocol::clear_cache(&mut self.state, task)
    }

    pub fn deleted_list_to_wire(&self, task: TaskId) -> Result<String> {
        cache_protocol::deleted_list_to_wire(&self.state, task)
    }

    pub fn clear_deleted_list(&mut self, task: TaskId) -> Result<()> {
        cache_protocol::clear_deleted_list(&mut self.state, task)
    }

    pub fn locate_key(&mut self, task: TaskId, ch: char) -> Result<()> {
        locate::locate_key(&mut self.state, task, ch)
    }

    pub fn on_locate_timer(&mut self, task: TaskId) -> Result<bool> {
        locate::on_locate_timer(&mut self.state, self.dispatcher.as_mut(), task)
    }

    pub fn free_timer(&mut self, task: TaskId) -> Result<()> {
        locate::free_timer(&mut self.state, task)
    }

    /// Queue a command for the next send (or for a task not started yet).
    pub fn queue_command(&mut self, command: ClientCommand) {
        self.state.commands.push(command);
    }

    pub fn flush_commands(&mut self) -> Result<usize> {
        flush_commands(&mut self.state)
    }
}
