// src/engine/event_handlers.rs

//! Event handling logic for the engine core.

use tracing::{debug, info, warn};

use crate::collab::{ClientCommand, EventDispatcher};
use crate::engine::EngineState;
use crate::errors::Result;
use crate::event::InternalCode;
use crate::task::{TaskId, TaskPhase};
use crate::task::broadcast::handle_event_on_slave_tasks;
use crate::task::end_task::end_task;
use crate::task::lifecycle::{discard_subtree, open_task};
use crate::task::locate::{locate_key, on_locate_timer};

/// Decision returned by the core after handling a single `EngineEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStep {
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl EngineStep {
    fn running(state: &EngineState) -> Self {
        Self {
            keep_running: state.tree.application_root().is_some(),
        }
    }

    /// Stop once the application root has left the tree.
    fn after_close(state: &EngineState, id: TaskId, was_application_root: bool) -> Self {
        if was_application_root && !state.tree.contains(id) {
            return Self {
                keep_running: false,
            };
        }
        Self::running(state)
    }
}

/// Open the task tagged `tag`.
pub fn handle_open_task(
    state: &mut EngineState,
    dispatcher: &mut dyn EventDispatcher,
    tag: &str,
) -> Result<EngineStep> {
    let id = state.tree.id_of(tag)?;
    let was_application_root = state.tree.is_application_root(id);
    if let Some(child) = open_task(state, dispatcher, id)? {
        debug!(task = %tag, %child, "non-interactive child started");
    }
    discard_if_ended_root(state, id);
    Ok(EngineStep::after_close(state, id, was_application_root))
}

/// Close the task tagged `tag`; an ended root is discarded from the tree.
pub fn handle_end_task(
    state: &mut EngineState,
    dispatcher: &mut dyn EventDispatcher,
    tag: &str,
    reversible: bool,
) -> Result<EngineStep> {
    let id = state.tree.id_of(tag)?;
    let was_application_root = state.tree.is_application_root(id);
    let ended = end_task(state, dispatcher, id, reversible, false, false, false)?;
    if ended {
        discard_if_ended_root(state, id);
    } else {
        info!(task = %tag, "end task did not complete");
    }
    Ok(EngineStep::after_close(state, id, was_application_root))
}

pub fn handle_broadcast(
    state: &mut EngineState,
    dispatcher: &mut dyn EventDispatcher,
    tag: &str,
    code: InternalCode,
) -> Result<EngineStep> {
    let id = state.tree.id_of(tag)?;
    if let Some(failed) = handle_event_on_slave_tasks(state, dispatcher, id, code)? {
        let failed_tag = state.tree.tag_of(failed).unwrap_or("?");
        warn!(task = %tag, slave = %failed_tag, "broadcast stopped at slave");
    }
    Ok(EngineStep::running(state))
}

pub fn handle_locate_key(state: &mut EngineState, tag: &str, ch: char) -> Result<EngineStep> {
    let id = state.tree.id_of(tag)?;
    locate_key(state, id, ch)?;
    Ok(EngineStep::running(state))
}

/// A timer may outlive its task; firing into a missing task is ignored.
pub fn handle_locate_timer(
    state: &mut EngineState,
    dispatcher: &mut dyn EventDispatcher,
    tag: &str,
) -> Result<EngineStep> {
    match state.tree.find_by_tag(tag) {
        Some(id) => {
            on_locate_timer(state, dispatcher, id)?;
        }
        None => debug!(task = %tag, "locate timer fired after task was discarded"),
    }
    Ok(EngineStep::running(state))
}

/// Remove `id` from the tree if it is a root that ended or failed setup.
pub fn discard_if_ended_root(state: &mut EngineState, id: TaskId) -> bool {
    let discardable = state.tree.get(id).is_some_and(|n| {
        n.parent.is_none() && matches!(n.phase, TaskPhase::Ended | TaskPhase::SetupFailed)
    });
    if !discardable {
        return false;
    }

    let removed = discard_subtree(state, id);
    info!(%id, removed, "root discarded");
    true
}

/// Send queued commands whose target can receive them.
///
/// `Execute` commands wait until their target task has started; everything
/// else goes out with the next send. On failure the commands are put back.
pub fn flush_commands(state: &mut EngineState) -> Result<usize> {
    let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut state.commands)
        .into_iter()
        .partition(|c| match c {
            ClientCommand::Execute { target_tag, .. } => state
                .tree
                .find_by_tag(target_tag)
                .and_then(|id| state.tree.get(id))
                .is_some_and(|n| n.is_started()),
            _ => true,
        });
    state.commands = waiting;
    if ready.is_empty() {
        return Ok(0);
    }

    let count = ready.len();
    if let Err(e) = state.collab.transport.send(ready.clone()) {
        state.commands.extend(ready);
        return Err(e);
    }
    debug!(count, "queued commands flushed");
    Ok(count)
}
