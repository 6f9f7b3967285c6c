// src/task/enablement.rs

//! Forwarding action-ledger changes to the presentation layer.
//!
//! The ledger itself only reports which codes changed; every change is
//! forwarded to the presentation layer exactly once from here.

use tracing::debug;

use crate::actions::codes::{ACT_CREATE, ACT_DELETE, ACT_MODIFY, ACT_QUERY};
use crate::actions::{ActionCode, ActionGroup};
use crate::engine::EngineState;
use crate::errors::Result;
use crate::task::TaskId;
use crate::types::{FlowDirection, FlowMode, RefreshScope, TaskMode};

/// What kind of control just received focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlFocus {
    pub editable: bool,
    pub multi_line: bool,
    pub in_table: bool,
}

fn notify(state: &mut EngineState, task: TaskId, changed: &[ActionCode], on: bool) -> Result<()> {
    if changed.is_empty() {
        return Ok(());
    }
    let tag = state.tree.node(task)?.tag.clone();
    for &code in changed {
        state.collab.ui.enable_action(&tag, code, on);
    }
    Ok(())
}

/// Enable or disable one action. Returns whether its state changed.
pub fn enable_action(
    state: &mut EngineState,
    task: TaskId,
    code: ActionCode,
    on: bool,
) -> Result<bool> {
    let changed = state.tree.node_mut(task)?.actions.enable(code, on);
    if changed {
        notify(state, task, &[code], on)?;
    }
    Ok(changed)
}

/// Apply `on` to a list of actions; returns the codes whose state changed.
pub fn enable_action_list(
    state: &mut EngineState,
    task: TaskId,
    codes: &[ActionCode],
    on: bool,
    only_if_changed: bool,
) -> Result<Vec<ActionCode>> {
    let changed = state
        .tree
        .node_mut(task)?
        .actions
        .enable_list(codes, on, only_if_changed);
    notify(state, task, &changed, on)?;
    Ok(changed)
}

pub fn enable_group(
    state: &mut EngineState,
    task: TaskId,
    group: ActionGroup,
    on: bool,
) -> Result<()> {
    let changed = enable_action_list(state, task, group.codes(), on, true)?;
    if !changed.is_empty() {
        debug!(%task, ?group, on, changed = changed.len(), "action group toggled");
    }
    Ok(())
}

/// Switch the task's running mode and the mode actions with it.
///
/// Query mode disables editing; the action of the current mode is disabled
/// and the others enabled, so the user can only switch away from it.
pub fn set_mode(state: &mut EngineState, task: TaskId, mode: TaskMode) -> Result<()> {
    let node = state.tree.node_mut(task)?;
    if node.mode == mode {
        return Ok(());
    }
    node.mode = mode;
    let tag = node.tag.clone();

    let current = match mode {
        TaskMode::Create => Some(ACT_CREATE),
        TaskMode::Modify => Some(ACT_MODIFY),
        TaskMode::Query => Some(ACT_QUERY),
        TaskMode::AsParent => None,
    };
    for code in [ACT_CREATE, ACT_MODIFY, ACT_QUERY] {
        enable_action(state, task, code, Some(code) != current)?;
    }

    let editable = mode != TaskMode::Query;
    enable_action(state, task, ACT_DELETE, editable)?;
    enable_group(state, task, ActionGroup::TextEditing, editable)?;
    enable_group(state, task, ActionGroup::PasteOnly, editable)?;

    state.collab.ui.refresh_display(&tag, RefreshScope::Form);
    debug!(task = %tag, ?mode, "task mode changed");
    Ok(())
}

/// Re-toggle the editing and navigation groups for the focused control.
pub fn focus_changed(state: &mut EngineState, task: TaskId, focus: ControlFocus) -> Result<()> {
    let editable = focus.editable && state.tree.node(task)?.mode != TaskMode::Query;
    enable_group(state, task, ActionGroup::TextEditing, editable)?;
    enable_group(state, task, ActionGroup::PasteOnly, editable)?;
    enable_group(state, task, ActionGroup::MultiLineEditing, editable && focus.multi_line)?;
    enable_group(state, task, ActionGroup::TableNavigation, focus.in_table)?;
    Ok(())
}

/// Set flow direction and mode together.
///
/// Returns `false` (and changes nothing) if either value is locked to a
/// different non-neutral setting.
pub fn set_flow(
    state: &mut EngineState,
    task: TaskId,
    direction: FlowDirection,
    mode: FlowMode,
) -> Result<bool> {
    let flow = &mut state.tree.node_mut(task)?.flow;
    let mut next = *flow;
    if !next.set_direction(direction) || !next.set_mode(mode) {
        debug!(%task, ?direction, ?mode, current = ?flow, "flow change rejected");
        return Ok(false);
    }
    *flow = next;
    Ok(true)
}
