// src/task/cache_protocol.rs

//! Keeping subform result caches consistent with the live data views.
//!
//! Before a request goes to the server, [`prepare_cache`] stores every
//! reusable subform view and evicts the stale ones. When the request could be
//! answered locally, [`test_and_set`] swaps cached views into the subforms.

use tracing::{debug, warn};

use crate::cache::policy::enforce;
use crate::cache::{CacheKey, Snapshot, fingerprint};
use crate::collab::ClientCommand;
use crate::engine::EngineState;
use crate::errors::{EngineError, Result};
use crate::task::TaskId;

/// Cache key for the current values of `task`'s descriptor fields.
pub fn descriptor_fingerprint(state: &EngineState, task: TaskId) -> Result<CacheKey> {
    let node = state.tree.node(task)?;
    let mut values = Vec::with_capacity(node.descriptor.len());
    for part in &node.descriptor {
        if state.tree.find_by_tag(&part.owner_task_tag).is_none() {
            return Err(EngineError::TaskNotFound(part.owner_task_tag.clone()));
        }
        values.push(
            state
                .collab
                .data
                .field_value(&part.owner_task_tag, part.field_index),
        );
    }
    Ok(fingerprint::fingerprint_of(&values))
}

/// Store reusable views and evict stale ones across the subtree of `task`.
///
/// Returns `false` when some task in the subtree must be fetched from the
/// server. Every child is visited whatever the verdict so far.
pub fn prepare_cache(state: &mut EngineState, task: TaskId, ignore_current: bool) -> Result<bool> {
    let mut ok = true;

    if !ignore_current {
        ok = prepare_one(state, task)?;
    }

    for child in state.tree.children_of(task) {
        if !prepare_cache(state, child, false)? {
            ok = false;
        }
    }
    Ok(ok)
}

fn prepare_one(state: &mut EngineState, task: TaskId) -> Result<bool> {
    let node = state.tree.node(task)?;
    if !node.uses_cache() {
        return Ok(!node.is_subform);
    }
    let tag = node.tag.clone();
    let mode = node.mode;
    let locating = node.locate.is_active();

    if state.collab.data.is_changed(&tag) {
        if let Some(key) = state.collab.data.position_key(&tag) {
            state.tree.node_mut(task)?.cache.remove_from_cache(key, true);
            debug!(task = %tag, %key, "changed view evicted from cache");
        }
        return Ok(false);
    }

    if locating {
        locate_put_in_cache(state, task)?;
        return Ok(true);
    }

    let Some(snapshot) = state.collab.data.replicate(&tag) else {
        warn!(task = %tag, "no live view to cache");
        return Ok(true);
    };
    if snapshot.includes_first() {
        let EngineState { tree, capacity, .. } = state;
        let cache = &mut tree.node_mut(task)?.cache;
        cache.put_in_cache(snapshot, mode);
        enforce(cache, capacity.as_ref());
    }
    Ok(true)
}

/// Swap cached views into the subtree of `task` where the descriptor moved.
///
/// Returns `false` on the first cache miss; no further children are checked
/// because the request has to go to the server anyway.
pub fn test_and_set(state: &mut EngineState, task: TaskId, ignore_current: bool) -> Result<bool> {
    if !ignore_current && !test_and_set_one(state, task)? {
        return Ok(false);
    }

    for child in state.tree.children_of(task) {
        if !test_and_set(state, child, false)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn test_and_set_one(state: &mut EngineState, task: TaskId) -> Result<bool> {
    let node = state.tree.node(task)?;
    if !node.uses_cache() {
        return Ok(true);
    }
    let tag = node.tag.clone();

    let wanted = descriptor_fingerprint(state, task)?;
    if state.collab.data.position_key(&tag) == Some(wanted) {
        return Ok(true);
    }

    let node = state.tree.node_mut(task)?;
    let Some(snapshot) = node.cache.get_cached_snapshot(wanted) else {
        debug!(task = %tag, key = %wanted, "cache miss");
        return Ok(false);
    };
    node.needs_record_cycle = true;
    state.collab.data.swap_in(&tag, snapshot);
    debug!(task = %tag, key = %wanted, "cache hit; view swapped in");
    Ok(true)
}

/// Insertion path used while an incremental locate query is active.
///
/// An existing entry survives only if its first-record marker still matches
/// the live view and the view is unchanged.
pub fn locate_put_in_cache(state: &mut EngineState, task: TaskId) -> Result<()> {
    let node = state.tree.node(task)?;
    let tag = node.tag.clone();
    let mode = node.mode;
    let changed = state.collab.data.is_changed(&tag);
    let Some(live) = state.collab.data.replicate(&tag) else {
        return Ok(());
    };
    let key = live.position_key();

    let EngineState { tree, capacity, .. } = state;
    let cache = &mut tree.node_mut(task)?.cache;
    match cache.entry(key).map(|e| e.first_record_marker()) {
        Some(marker) => {
            if changed || marker != live.first_record_marker() {
                cache.remove_from_cache(key, true);
                debug!(task = %tag, %key, "locate entry no longer matches; evicted");
            }
        }
        None if !changed => {
            cache.put_in_cache(live, mode);
            enforce(cache, capacity.as_ref());
        }
        None => {}
    }
    Ok(())
}

/// Evict everything cached by `task` and its subforms.
///
/// The live view is marked changed afterwards so it is not re-admitted on the
/// next round trip. Returns every evicted key.
pub fn clear_cache(state: &mut EngineState, task: TaskId) -> Result<Vec<CacheKey>> {
    let node = state.tree.node_mut(task)?;
    let mut evicted = node.cache.evict_all();
    let tag = node.tag.clone();

    for child in state.tree.children_of(task) {
        if state.tree.get(child).is_some_and(|c| c.is_subform) {
            evicted.extend(clear_cache(state, child)?);
        }
    }

    state.collab.data.set_changed(&tag, true);
    debug!(task = %tag, evicted = evicted.len(), "cache cleared");
    Ok(evicted)
}

/// Eviction ledger of `task` in wire form.
pub fn deleted_list_to_wire(state: &EngineState, task: TaskId) -> Result<String> {
    Ok(state.tree.node(task)?.cache.deleted_list_to_wire())
}

/// Forget reported evictions once the server acknowledged them.
pub fn clear_deleted_list(state: &mut EngineState, task: TaskId) -> Result<()> {
    state.tree.node_mut(task)?.cache.clear_deleted_list();
    Ok(())
}

/// Queue the eviction ledger of `task` for the next outbound request.
///
/// The ledger is left untouched until [`clear_deleted_list`] is called.
pub fn queue_eviction_report(state: &mut EngineState, task: TaskId) -> Result<bool> {
    let node = state.tree.node(task)?;
    if node.cache.deleted_list().is_empty() {
        return Ok(false);
    }
    let command = ClientCommand::CacheEvictions {
        tag: node.tag.clone(),
        keys: node.cache.deleted_list_to_wire(),
    };
    state.commands.push(command);
    Ok(true)
}
