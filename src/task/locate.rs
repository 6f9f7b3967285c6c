// src/task/locate.rs

//! Incremental locate.
//!
//! Keystrokes accumulate in the task's locate buffer and re-arm a debounce
//! timer. When the timer fires, the buffer becomes the active query, the
//! data layer repositions, and `LOCATE` is delivered to the task.

use tracing::{debug, warn};

use crate::collab::{DataViewOp, EventDispatcher};
use crate::engine::EngineState;
use crate::errors::Result;
use crate::event::internal;
use crate::task::TaskId;
use crate::task::lifecycle::deliver_internal;

/// Append `ch` to the locate buffer and re-arm the debounce timer.
pub fn locate_key(state: &mut EngineState, task: TaskId, ch: char) -> Result<()> {
    let delay = state.settings.locate_delay;
    let node = state.tree.node_mut(task)?;
    if node.aborting {
        return Ok(());
    }
    node.locate.buffer.push(ch);
    let previous = node.locate.timer.take();
    let tag = node.tag.clone();

    if let Some(handle) = previous {
        state.collab.timers.cancel(handle);
    }
    let handle = state.collab.timers.schedule(&tag, delay);
    state.tree.node_mut(task)?.locate.timer = Some(handle);
    debug!(task = %tag, ?delay, "locate timer armed");
    Ok(())
}

/// Timer callback. Returns `false` if the `LOCATE` handler stopped execution.
pub fn on_locate_timer(
    state: &mut EngineState,
    dispatcher: &mut dyn EventDispatcher,
    task: TaskId,
) -> Result<bool> {
    let Some(node) = state.tree.get_mut(task) else {
        debug!(%task, "locate timer fired for a task that no longer exists");
        return Ok(true);
    };
    if node.aborting || node.locate.timer.is_none() {
        return Ok(true);
    }
    node.locate.timer = None;
    let query = std::mem::take(&mut node.locate.buffer);
    node.locate.active_query = Some(query.clone());
    let tag = node.tag.clone();

    let result = state.collab.data.execute(&tag, &DataViewOp::Locate(query))?;
    if !result.is_success() {
        warn!(task = %tag, reason = result.description().unwrap_or(""), "locate failed");
        return Ok(true);
    }
    Ok(!deliver_internal(state, dispatcher, task, internal::LOCATE)?)
}

/// Cancel a pending locate timer and drop the collected keystrokes.
pub fn free_timer(state: &mut EngineState, task: TaskId) -> Result<()> {
    let node = state.tree.node_mut(task)?;
    node.locate.buffer.clear();
    if let Some(handle) = node.locate.timer.take() {
        state.collab.timers.cancel(handle);
        debug!(%task, "locate timer freed");
    }
    Ok(())
}

/// Leave locate mode; later cache insertions use the ordinary path.
pub fn clear_locate_query(state: &mut EngineState, task: TaskId) -> Result<()> {
    free_timer(state, task)?;
    state.tree.node_mut(task)?.locate.active_query = None;
    Ok(())
}
