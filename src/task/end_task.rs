// src/task/end_task.rs

//! The two-phase close protocol.
//!
//! A close runs a *try* phase (exit events to children, record and task
//! suffix, transaction commit, server notification) followed by a *finally*
//! phase over the whole subtree that always runs, whatever the try phase did:
//!
//! - `InEndTask` is cleared on every visited node;
//! - on success every node's phase becomes `Ended` (with only-descendants
//!   the task itself stays started and running);
//! - on a failed reversible exit `TryingToStop` is cleared as well, so the
//!   subtree is fully alive again.
//!
//! The dispatcher-owned `processing_topmost_end_task` flag is saved on entry
//! and restored on exit, including on every nested close.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::collab::{ClientCommand, EventDispatcher};
use crate::engine::EngineState;
use crate::errors::Result;
use crate::event::{EventDescriptor, internal};
use crate::task::TaskId;
use crate::task::lifecycle::{deliver_internal, record_suffix};
use crate::task::node::{StopState, TaskPhase};
use crate::types::TransLevel;

/// Close `task`.
///
/// Returns `Ok(false)` when the close did not happen: a handler stopped it,
/// or the task was already inside its own close (a nested call must not
/// report success, or the outer caller would run its post-close logic
/// twice).
pub fn end_task(
    state: &mut EngineState,
    dispatcher: &mut dyn EventDispatcher,
    task: TaskId,
    reversible_exit: bool,
    only_descendants: bool,
    subform_destination: bool,
    due_to_verify_error: bool,
) -> Result<bool> {
    let saved = state.flags.processing_topmost_end_task;
    let result = end_task_guarded(
        state,
        dispatcher,
        task,
        reversible_exit,
        only_descendants,
        subform_destination,
        due_to_verify_error,
    );
    state.flags.processing_topmost_end_task = saved;
    result
}

fn end_task_guarded(
    state: &mut EngineState,
    dispatcher: &mut dyn EventDispatcher,
    task: TaskId,
    reversible_exit: bool,
    only_descendants: bool,
    subform_destination: bool,
    due_to_verify_error: bool,
) -> Result<bool> {
    let node = state.tree.node(task)?;

    // A subform closes together with its parent unless the parent is already
    // closing or the subform itself is being replaced.
    if node.is_subform && !subform_destination {
        if let Some(parent) = node.parent {
            let parent_ending = state
                .tree
                .get(parent)
                .is_some_and(|p| p.stop_state.in_end_task());
            if !parent_ending && state.tree.contains(parent) {
                debug!(task = %node.tag, %parent, "delegating subform close to parent");
                return end_task(
                    state,
                    dispatcher,
                    parent,
                    reversible_exit,
                    only_descendants,
                    false,
                    due_to_verify_error,
                );
            }
        }
    }

    if node.stop_state.in_end_task() {
        debug!(task = %node.tag, "end_task re-entered; not executing");
        return Ok(false);
    }

    if node.aborting {
        finally_phase(state, task, true, reversible_exit, only_descendants);
        return Ok(true);
    }

    let tag = node.tag.clone();
    let already_trying = node.stop_state.trying_to_stop();
    state.tree.node_mut(task)?.stop_state = StopState::InEndTask;
    if !already_trying {
        for id in state.tree.subtree(task).into_iter().skip(1) {
            if let Some(n) = state.tree.get_mut(id) {
                if n.stop_state == StopState::Running {
                    n.stop_state = StopState::TryingToStop;
                }
            }
        }
    }

    let outcome = try_phase(
        state,
        dispatcher,
        task,
        reversible_exit,
        only_descendants,
        subform_destination,
        due_to_verify_error,
    );

    let succeeded = matches!(outcome, Ok(true));
    finally_phase(state, task, succeeded, reversible_exit, only_descendants);

    match &outcome {
        Ok(true) => info!(task = %tag, "task ended"),
        Ok(false) => info!(task = %tag, "task close was stopped"),
        Err(e) => warn!(task = %tag, error = %e, "task close failed"),
    }
    outcome
}

fn try_phase(
    state: &mut EngineState,
    dispatcher: &mut dyn EventDispatcher,
    task: TaskId,
    reversible_exit: bool,
    only_descendants: bool,
    subform_destination: bool,
    due_to_verify_error: bool,
) -> Result<bool> {
    if reversible_exit {
        for child in state.tree.children_of(task) {
            if !state.tree.contains(child) {
                continue;
            }
            if deliver_internal(state, dispatcher, child, internal::EXIT)? && !due_to_verify_error
            {
                return Ok(false);
            }
        }

        if state.tree.is_application_root(task) {
            let others: Vec<TaskId> = state
                .tree
                .roots()
                .iter()
                .copied()
                .filter(|r| *r != task)
                .collect();
            for root in others {
                if deliver_internal(state, dispatcher, root, internal::EXIT)?
                    && !due_to_verify_error
                {
                    return Ok(false);
                }
            }
        }
    }

    if only_descendants {
        for child in state.tree.children_of(task) {
            if state.tree.contains(child)
                && !end_task(
                    state,
                    dispatcher,
                    child,
                    reversible_exit,
                    false,
                    true,
                    due_to_verify_error,
                )?
            {
                return Ok(false);
            }
        }
        return Ok(true);
    }

    let (is_main, is_subform, suffix_executed) = {
        let node = state.tree.node(task)?;
        (node.is_main_program, node.is_subform, node.task_suffix_executed)
    };

    if !due_to_verify_error && !is_main && !record_suffix(state, dispatcher, task)? {
        return Ok(false);
    }

    commit_record_transaction(state, task)?;

    if !(is_subform && !subform_destination) && !suffix_executed {
        let before: HashSet<TaskId> = state.tree.children_of(task).into_iter().collect();
        state.tree.node_mut(task)?.task_suffix_executed = true;
        if deliver_internal(state, dispatcher, task, internal::TASK_SUFFIX)? {
            return Ok(false);
        }

        // Tasks opened by the suffix handler itself must not outlive it.
        for child in state.tree.children_of(task) {
            if !before.contains(&child) && state.tree.contains(child) {
                debug!(%task, %child, "force-exiting task opened during task suffix");
                end_task(state, dispatcher, child, false, false, true, false)?;
            }
        }
    }

    commit_task_transaction(state, task)?;

    if state.tree.is_application_root(task) {
        while let Some((target, event)) = state.pending_events.pop_front() {
            if !state.tree.contains(target) {
                continue;
            }
            dispatcher.deliver(state, target, &event)?;
        }
    }

    notify_exited(state, task)?;
    queue_parent_close(state, task)?;
    Ok(true)
}

fn finally_phase(
    state: &mut EngineState,
    task: TaskId,
    succeeded: bool,
    reversible_exit: bool,
    only_descendants: bool,
) {
    for id in state.tree.subtree(task) {
        let Some(node) = state.tree.get_mut(id) else {
            continue;
        };
        if node.stop_state.in_end_task() {
            node.stop_state = StopState::TryingToStop;
        }
        if succeeded {
            if only_descendants && id == task {
                node.stop_state = StopState::Running;
            } else if node.phase == TaskPhase::Started {
                node.phase = TaskPhase::Ended;
            }
        } else if reversible_exit {
            node.stop_state = StopState::Running;
        }
    }
}

/// Commit a record-level transaction owned by `task`.
fn commit_record_transaction(state: &mut EngineState, task: TaskId) -> Result<()> {
    let node = state.tree.node(task)?;
    let Some(trans) = node.transaction.clone() else {
        return Ok(());
    };
    if !state.transactions.is_owned_by(&trans, task)
        || state.transactions.level_of(&trans) != TransLevel::Record
    {
        return Ok(());
    }
    let tag = node.tag.clone();
    state.collab.transport.send(vec![ClientCommand::Commit {
        tag,
        trans_id: trans.clone(),
    }])?;
    state.transactions.set_level(&trans, TransLevel::None);
    debug!(%task, trans = %trans, "record-level transaction committed");
    Ok(())
}

/// Commit and release any transaction still owned by `task`.
fn commit_task_transaction(state: &mut EngineState, task: TaskId) -> Result<()> {
    let node = state.tree.node(task)?;
    let Some(trans) = node.transaction.clone() else {
        return Ok(());
    };
    if !state.transactions.is_owned_by(&trans, task) {
        return Ok(());
    }
    let tag = node.tag.clone();
    if state.transactions.level_of(&trans) != TransLevel::None {
        state.collab.transport.send(vec![ClientCommand::Commit {
            tag,
            trans_id: trans.clone(),
        }])?;
    }
    state.transactions.clear(&trans, task);
    state.tree.node_mut(task)?.transaction = None;
    Ok(())
}

/// Tell the server the task is gone.
///
/// For the main program a failed send is not fatal: the close command is
/// queued for the next successful round trip instead.
fn notify_exited(state: &mut EngineState, task: TaskId) -> Result<()> {
    let node = state.tree.node(task)?;
    let tag = node.tag.clone();
    let is_main = node.is_main_program;

    match state
        .collab
        .transport
        .send(vec![ClientCommand::TaskExited { tag: tag.clone() }])
    {
        Ok(()) => Ok(()),
        Err(e) if is_main => {
            warn!(task = %tag, error = %e, "exit notification failed; re-queueing close");
            state.commands.push(ClientCommand::Close { tag });
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// A top-level program with an end condition closes once a child exits.
fn queue_parent_close(state: &mut EngineState, task: TaskId) -> Result<()> {
    let Some(parent) = state.tree.node(task)?.parent else {
        return Ok(());
    };
    let Some(parent_node) = state.tree.get(parent) else {
        return Ok(());
    };
    if parent_node.parent.is_some() || !parent_node.end_condition {
        return Ok(());
    }
    if let Some(root) = state.tree.application_root() {
        debug!(%task, %root, "queueing close for application root");
        state
            .pending_events
            .push_back((root, EventDescriptor::internal(internal::CLOSE)));
    }
    Ok(())
}
