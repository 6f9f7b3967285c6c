// src/engine/state.rs

//! Everything the lifecycle operates on, minus the event dispatcher.

use std::collections::VecDeque;
use std::time::Duration;

use crate::actions::ActionCounter;
use crate::cache::{CapacityPolicy, Unbounded};
use crate::collab::{
    ClientCommand, DataLayer, DefaultTaskService, InMemoryDataLayer, InertTimers, Presentation,
    TaskService, TimerScheduler, TracingPresentation, TracingTransport, Transport,
};
use crate::event::{EventContext, EventDescriptor, InternalCode, Modifier, ResolvedUserEvent};
use crate::task::{TaskId, TaskTree};
use crate::transaction::TransactionRegistry;

/// Tunables read from `[engine]`.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub locate_delay: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            locate_delay: Duration::from_millis(400),
        }
    }
}

/// Process-wide flags shared with the event-dispatch collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineFlags {
    /// Cleared before every internal delivery; a handler (or the dispatcher
    /// on its behalf) raises it to stop the running operation.
    pub stop_execution: bool,
    /// Owned by the dispatcher; end-task restores it on the way out.
    pub processing_topmost_end_task: bool,
}

/// Boxed collaborators the lifecycle calls into.
pub struct Collaborators {
    pub data: Box<dyn DataLayer>,
    pub ui: Box<dyn Presentation>,
    pub transport: Box<dyn Transport>,
    pub service: Box<dyn TaskService>,
    pub timers: Box<dyn TimerScheduler>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            data: Box::new(InMemoryDataLayer::new()),
            ui: Box::new(TracingPresentation),
            transport: Box::new(TracingTransport),
            service: Box::new(DefaultTaskService),
            timers: Box::new(InertTimers::default()),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Timer and expression handlers registered at a task's data set.
///
/// Filled from each element's handler list during materialization.
#[derive(Debug, Default)]
pub struct HandlerTable {
    entries: Vec<(TaskId, EventDescriptor)>,
}

impl HandlerTable {
    pub fn register(&mut self, task: TaskId, event: EventDescriptor) {
        self.entries.push((task, event));
    }

    pub fn for_task(&self, task: TaskId) -> impl Iterator<Item = &EventDescriptor> {
        self.entries
            .iter()
            .filter(move |(t, _)| *t == task)
            .map(|(_, e)| e)
    }

    /// Drop every handler registered by `task`; returns how many were dropped.
    pub fn detach_task(&mut self, task: TaskId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(t, _)| *t != task);
        before - self.entries.len()
    }
}

#[derive(Debug)]
pub struct EngineState {
    pub tree: TaskTree,
    pub transactions: TransactionRegistry,
    pub flags: EngineFlags,
    /// Commands waiting for their target task (or for the next send).
    pub commands: Vec<ClientCommand>,
    /// Events queued for delivery once the application root finishes closing.
    pub pending_events: VecDeque<(TaskId, EventDescriptor)>,
    pub handlers: HandlerTable,
    pub collab: Collaborators,
    pub counter: ActionCounter,
    pub capacity: Box<dyn CapacityPolicy>,
    pub settings: EngineSettings,
    /// Task whose keyboard mapping applies to incoming keys.
    pub active_task: Option<TaskId>,
}

impl EngineState {
    pub fn new(collab: Collaborators) -> Self {
        Self {
            tree: TaskTree::new(),
            transactions: TransactionRegistry::new(),
            flags: EngineFlags::default(),
            commands: Vec::new(),
            pending_events: VecDeque::new(),
            handlers: HandlerTable::default(),
            collab,
            counter: ActionCounter::new(),
            capacity: Box::new(Unbounded),
            settings: EngineSettings::default(),
            active_task: None,
        }
    }

    /// Remove and return queued commands addressed to `tag`.
    pub fn take_commands_for(&mut self, tag: &str) -> Vec<ClientCommand> {
        let (matching, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.commands)
            .into_iter()
            .partition(|c| c.target_tag() == tag);
        self.commands = rest;
        matching
    }
}

impl EventContext for EngineState {
    fn user_event(&self, owner_tag: &str, index: usize) -> Option<ResolvedUserEvent> {
        let id = self.tree.find_by_tag(owner_tag)?;
        let def = self.tree.get(id)?.user_events.get(index)?;
        Some(ResolvedUserEvent {
            task: id,
            index,
            public_name: def.public_name.clone(),
        })
    }

    fn keyboard_action(&self, key_code: u16, modifier: Modifier) -> Option<InternalCode> {
        let task = self.tree.get(self.active_task?)?;
        task.keymap.get(&(key_code, modifier)).copied()
    }
}
