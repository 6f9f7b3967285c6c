// src/task/broadcast.rs

//! Transaction-scoped delivery of internal events to cooperating tasks.

use tracing::{debug, info};

use crate::collab::{DataViewOp, EventDispatcher};
use crate::engine::EngineState;
use crate::errors::Result;
use crate::event::{InternalCode, internal};
use crate::task::TaskId;
use crate::task::lifecycle::deliver_internal;

/// Tasks that must see an internal event raised on `task`, in delivery order.
///
/// When `task` owns its transaction this is every other task sharing the
/// transaction (subforms excluded), followed by the orphans: sharers whose
/// previous parent no longer exists. Otherwise it is the direct subform
/// children of `task`.
pub fn slave_tasks(state: &EngineState, task: TaskId) -> Result<Vec<TaskId>> {
    let node = state.tree.node(task)?;

    let owned = node
        .transaction
        .as_deref()
        .filter(|t| state.transactions.is_owned_by(t, task));

    let Some(trans) = owned else {
        return Ok(node
            .children
            .iter()
            .copied()
            .filter(|c| state.tree.get(*c).is_some_and(|n| n.is_subform))
            .collect());
    };

    let sharers: Vec<TaskId> = state
        .tree
        .ids()
        .filter(|id| *id != task)
        .filter(|id| {
            state
                .tree
                .get(*id)
                .is_some_and(|n| n.transaction.as_deref() == Some(trans))
        })
        .collect();

    let mut slaves: Vec<TaskId> = sharers
        .iter()
        .copied()
        .filter(|id| state.tree.get(*id).is_some_and(|n| !n.is_subform))
        .collect();

    for id in sharers {
        let orphaned = state.tree.get(id).is_some_and(|n| {
            n.previous_parent_tag
                .as_deref()
                .is_some_and(|p| state.tree.find_by_tag(p).is_none())
        });
        if orphaned && !slaves.contains(&id) {
            slaves.push(id);
        }
    }
    Ok(slaves)
}

/// Deliver `code` to every slave of `task`.
///
/// Stops at the first slave whose delivery sets the stop-execution flag and
/// returns it. Slaves notified before it are not rolled back.
pub fn handle_event_on_slave_tasks(
    state: &mut EngineState,
    dispatcher: &mut dyn EventDispatcher,
    task: TaskId,
    code: InternalCode,
) -> Result<Option<TaskId>> {
    let slaves = slave_tasks(state, task)?;
    debug!(%task, event = internal::name_of(code), slaves = slaves.len(), "broadcasting");

    for slave in slaves {
        let Some(node) = state.tree.get(slave) else {
            continue;
        };
        if !node.is_started() {
            continue;
        }

        if code == internal::RECORD_PREFIX && node.form_refreshed {
            let tag = node.tag.clone();
            state
                .collab
                .data
                .execute(&tag, &DataViewOp::RecomputeCurrentRecord)?;
        }

        if deliver_internal(state, dispatcher, slave, code)? {
            info!(%task, %slave, event = internal::name_of(code), "broadcast aborted by slave");
            return Ok(Some(slave));
        }
    }
    Ok(None)
}
