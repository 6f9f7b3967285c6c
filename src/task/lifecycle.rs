// src/task/lifecycle.rs

//! Start, setup, stop and the record cycle.

use tracing::{debug, info, warn};

use crate::actions::ActionGroup;
use crate::collab::{DataViewOp, Delivery, EventDispatcher, ReturnResult};
use crate::engine::EngineState;
use crate::errors::Result;
use crate::event::{EventDescriptor, InternalCode, internal};
use crate::task::TaskId;
use crate::task::end_task::end_task;
use crate::task::enablement::enable_group;
use crate::task::node::{RecordCycle, TaskPhase};

/// Result of [`start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// The task was already started; nothing happened.
    AlreadyStarted,
    /// Setup failed; the caller is responsible for closing the task.
    /// Children that fail setup are closed by `start` itself.
    SetupFailed(ReturnResult),
    /// The task and its children were started. Carries the single
    /// non-interactive child started along the way, if any.
    Started { non_interactive_child: Option<TaskId> },
}

/// Deliver an internal event to `task`.
///
/// The stop-execution flag is cleared before the delivery. Returns `true`
/// when the handler asked to stop, either through its return value or by
/// raising the flag itself; the flag is left raised in that case.
pub fn deliver_internal(
    state: &mut EngineState,
    dispatcher: &mut dyn EventDispatcher,
    task: TaskId,
    code: InternalCode,
) -> Result<bool> {
    let event = EventDescriptor::internal(code);
    state.flags.stop_execution = false;
    let delivery = dispatcher.deliver(state, task, &event)?;
    let stopped = delivery == Delivery::StopExecution || state.flags.stop_execution;
    if stopped {
        state.flags.stop_execution = true;
        debug!(%task, event = internal::name_of(code), "delivery stopped execution");
    }
    Ok(stopped)
}

fn data_op(state: &mut EngineState, task: TaskId, op: DataViewOp) -> Result<ReturnResult> {
    let node = state.tree.node(task)?;
    if node.aborting {
        return Ok(ReturnResult::failure(format!("task {} is aborting", node.tag)));
    }
    let tag = node.tag.clone();
    state.collab.data.execute(&tag, &op)
}

/// Start `task` and, recursively, its children.
pub fn start(
    state: &mut EngineState,
    dispatcher: &mut dyn EventDispatcher,
    task: TaskId,
    move_to_first_control: bool,
    call_by_dest_subform: bool,
) -> Result<StartOutcome> {
    if state.tree.node(task)?.is_started() {
        return Ok(StartOutcome::AlreadyStarted);
    }

    let depth = state.tree.depth_of(task);
    {
        let node = state.tree.node_mut(task)?;
        node.exec_depth = depth;
        node.first_record_cycle = true;
        node.move_to_first_control = move_to_first_control;
        node.opened_by_destination = call_by_dest_subform;
    }

    let setup_result = setup(state, task)?;
    if !setup_result.is_success() {
        let node = state.tree.node_mut(task)?;
        warn!(
            task = %node.tag,
            reason = setup_result.description().unwrap_or(""),
            "task setup failed"
        );
        node.phase = TaskPhase::SetupFailed;
        node.last_setup_result = Some(setup_result.clone());
        return Ok(StartOutcome::SetupFailed(setup_result));
    }

    let (tag, is_main, has_form) = {
        let node = state.tree.node_mut(task)?;
        node.phase = TaskPhase::Started;
        node.last_setup_result = Some(setup_result);
        (node.tag.clone(), node.is_main_program, node.has_form)
    };
    info!(task = %tag, depth, "task started");

    enable_group(state, task, ActionGroup::Baseline, true)?;
    if is_main {
        enable_group(state, task, ActionGroup::MainFrame, true)?;
    }
    if has_form {
        state.collab.ui.init_form(&tag)?;
    }

    let chunk = data_op(state, task, DataViewOp::FirstChunk)?;
    if !chunk.is_success() {
        warn!(task = %tag, reason = chunk.description().unwrap_or(""), "first chunk fetch failed");
    }

    let mut non_interactive_child = None;
    for child in state.tree.children_of(task) {
        let nested = match start(state, dispatcher, child, false, false)? {
            StartOutcome::Started {
                non_interactive_child: nested,
            } => nested,
            StartOutcome::SetupFailed(result) => {
                close_failed_child(state, dispatcher, child, &result)?;
                continue;
            }
            StartOutcome::AlreadyStarted => continue,
        };

        let candidate = if state.tree.get(child).is_some_and(|c| !c.interactive) {
            Some(child)
        } else {
            nested
        };
        if let Some(found) = candidate {
            match non_interactive_child {
                None => non_interactive_child = Some(found),
                Some(existing) => warn!(
                    task = %tag,
                    %existing,
                    ignored = %found,
                    "more than one non-interactive child started"
                ),
            }
        }
    }

    Ok(StartOutcome::Started {
        non_interactive_child,
    })
}

/// A child whose setup failed is reported and closed on the spot, then
/// dropped from the tree so nothing addresses it afterwards.
fn close_failed_child(
    state: &mut EngineState,
    dispatcher: &mut dyn EventDispatcher,
    child: TaskId,
    result: &ReturnResult,
) -> Result<()> {
    let tag = state.tree.node(child)?.tag.clone();
    let message = result.description().unwrap_or("task setup failed");
    state.collab.ui.show_error(&tag, message);

    if end_task(state, dispatcher, child, false, false, true, false)? {
        let removed = discard_subtree(state, child);
        debug!(task = %tag, removed, "failed child discarded");
    } else {
        warn!(task = %tag, "closing a child that failed setup was stopped");
    }
    Ok(())
}

/// Remove `task` and everything below it from the tree, cancelling pending
/// locate timers and dropping registered handlers. Returns the node count.
pub fn discard_subtree(state: &mut EngineState, task: TaskId) -> usize {
    let removed = state.tree.remove_subtree(task);
    for node in &removed {
        if let Some(handle) = node.locate.timer {
            state.collab.timers.cancel(handle);
        }
        state.handlers.detach_task(node.id);
    }
    removed.len()
}

/// Prepare a task for its first record cycle.
///
/// Steps short-circuit on the first failing result.
pub fn setup(state: &mut EngineState, task: TaskId) -> Result<ReturnResult> {
    let prefix_executed = state.collab.service.task_prefix_executed(state.tree.node(task)?);
    state.tree.node_mut(task)?.task_prefix_executed = prefix_executed;

    for op in [DataViewOp::CreateFirstRecord, DataViewOp::Init] {
        let result = data_op(state, task, op)?;
        if !result.is_success() {
            return Ok(result);
        }
    }

    let tag = state.tree.node(task)?.tag.clone();
    let deferred = state.take_commands_for(&tag);
    if !deferred.is_empty() {
        debug!(task = %tag, count = deferred.len(), "running commands deferred for this task");
        state.collab.transport.send(deferred)?;
    }

    let result = data_op(state, task, DataViewOp::Prepare)?;
    if !result.is_success() {
        return Ok(result);
    }

    let EngineState { tree, collab, .. } = state;
    let result = collab.service.prepare_task(tree.node_mut(task)?)?;
    if !result.is_success() {
        return Ok(result);
    }

    data_op(state, task, DataViewOp::InitDataControlViews)
}

/// Start `task` and run its first cycle; close it if setup fails.
pub fn open_task(
    state: &mut EngineState,
    dispatcher: &mut dyn EventDispatcher,
    task: TaskId,
) -> Result<Option<TaskId>> {
    match start(state, dispatcher, task, true, false)? {
        StartOutcome::AlreadyStarted => Ok(None),
        StartOutcome::SetupFailed(result) => {
            let tag = state.tree.node(task)?.tag.clone();
            let message = result.description().unwrap_or("task setup failed").to_string();
            state.collab.ui.show_error(&tag, &message);
            end_task(state, dispatcher, task, false, false, false, false)?;
            Ok(None)
        }
        StartOutcome::Started {
            non_interactive_child,
        } => {
            for id in state.tree.subtree(task) {
                if state.tree.get(id).is_some_and(|n| n.is_started() && !n.task_prefix_executed) {
                    state.tree.node_mut(id)?.task_prefix_executed = true;
                    if deliver_internal(state, dispatcher, id, internal::TASK_PREFIX)? {
                        return Ok(non_interactive_child);
                    }
                    record_prefix(state, dispatcher, id)?;
                }
            }
            Ok(non_interactive_child)
        }
    }
}

/// Enter the record cycle of `task`. Returns `false` if the prefix stopped.
pub fn record_prefix(
    state: &mut EngineState,
    dispatcher: &mut dyn EventDispatcher,
    task: TaskId,
) -> Result<bool> {
    if state.tree.node(task)?.record_cycle == RecordCycle::InRecordCycle {
        return Ok(true);
    }
    if deliver_internal(state, dispatcher, task, internal::RECORD_PREFIX)? {
        return Ok(false);
    }
    let node = state.tree.node_mut(task)?;
    node.record_cycle = RecordCycle::InRecordCycle;
    node.first_record_cycle = false;
    node.needs_record_cycle = false;
    Ok(true)
}

/// Leave the record cycle of `task`. Returns `false` if the suffix stopped.
pub fn record_suffix(
    state: &mut EngineState,
    dispatcher: &mut dyn EventDispatcher,
    task: TaskId,
) -> Result<bool> {
    if state.tree.node(task)?.record_cycle == RecordCycle::Idle {
        return Ok(true);
    }
    if deliver_internal(state, dispatcher, task, internal::RECORD_SUFFIX)? {
        return Ok(false);
    }
    state.tree.node_mut(task)?.record_cycle = RecordCycle::Idle;
    Ok(true)
}

/// Tear down `task` and its subtree without running any suffix handler.
///
/// Children are stopped before the task detaches itself. Never fails:
/// problems are logged and teardown continues.
pub fn stop(state: &mut EngineState, task: TaskId) {
    let Some(node) = state.tree.get(task) else {
        warn!(%task, "stop on unknown task");
        return;
    };
    if node.aborting {
        return;
    }

    for child in state.tree.children_of(task) {
        stop(state, child);
    }

    let Some(node) = state.tree.get_mut(task) else {
        return;
    };
    if !node.is_main_program {
        node.aborting = true;
    }
    let tag = node.tag.clone();
    let is_subform = node.is_subform;
    let trans = if is_subform { node.transaction.take() } else { None };
    let timer = node.locate.timer.take();

    state.collab.ui.save_ui_state(&tag);
    state.tree.detach(task);

    if let Some(handle) = timer {
        state.collab.timers.cancel(handle);
    }

    if is_subform {
        let dropped = state.handlers.detach_task(task);
        if let Some(trans) = trans {
            if state.transactions.is_owned_by(&trans, task) {
                state.transactions.clear(&trans, task);
            }
        }
        state.collab.ui.detach_task(&tag);
        debug!(task = %tag, handlers = dropped, "subform detached from its data set");
    }

    match state.collab.data.execute(&tag, &DataViewOp::Clear) {
        Ok(r) if !r.is_success() => {
            warn!(task = %tag, reason = r.description().unwrap_or(""), "clearing data view failed")
        }
        Err(e) => warn!(task = %tag, error = %e, "clearing data view failed"),
        Ok(_) => {}
    }

    state.tree.remove_node(task);
    info!(task = %tag, "task stopped");
}
