// src/collab/memory.rs

//! In-memory data layer.
//!
//! Cloning shares the underlying store, so a test can hand one clone to the
//! engine and inspect the other.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::cache::{CacheKey, FieldValue, ViewSnapshot};
use crate::collab::{DataLayer, DataViewOp, ReturnResult};
use crate::errors::Result;

#[derive(Debug, Clone, Default)]
struct LiveView {
    snapshot: ViewSnapshot,
    changed: bool,
    fields: HashMap<usize, FieldValue>,
}

#[derive(Debug, Default)]
struct Store {
    views: HashMap<String, LiveView>,
    failing: HashSet<(String, String)>,
    log: Vec<(String, DataViewOp)>,
}

fn op_name(op: &DataViewOp) -> &'static str {
    match op {
        DataViewOp::CreateFirstRecord => "create_first_record",
        DataViewOp::Init => "init",
        DataViewOp::Prepare => "prepare",
        DataViewOp::InitDataControlViews => "init_data_control_views",
        DataViewOp::FirstChunk => "first_chunk",
        DataViewOp::Clear => "clear",
        DataViewOp::RecomputeCurrentRecord => "recompute_current_record",
        DataViewOp::Locate(_) => "locate",
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryDataLayer {
    store: Arc<Mutex<Store>>,
}

impl InMemoryDataLayer {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the live view of `task_tag`.
    pub fn set_view(&self, task_tag: &str, snapshot: ViewSnapshot) {
        let mut store = self.store();
        store.views.entry(task_tag.to_string()).or_default().snapshot = snapshot;
    }

    pub fn view(&self, task_tag: &str) -> Option<ViewSnapshot> {
        self.store().views.get(task_tag).map(|v| v.snapshot.clone())
    }

    pub fn set_field(&self, task_tag: &str, field_index: usize, value: FieldValue) {
        let mut store = self.store();
        store
            .views
            .entry(task_tag.to_string())
            .or_default()
            .fields
            .insert(field_index, value);
    }

    /// Flag the live view of `task_tag` as modified (or not).
    pub fn mark_changed(&self, task_tag: &str, changed: bool) {
        let mut store = self.store();
        store.views.entry(task_tag.to_string()).or_default().changed = changed;
    }

    /// Make `op` (matched by kind) fail for `task_tag`.
    pub fn fail_on(&self, task_tag: &str, op: &DataViewOp) {
        let mut store = self.store();
        store
            .failing
            .insert((task_tag.to_string(), op_name(op).to_string()));
    }

    /// Operations executed for `task_tag`, in order.
    pub fn ops_for(&self, task_tag: &str) -> Vec<DataViewOp> {
        self.store()
            .log
            .iter()
            .filter(|(tag, _)| tag == task_tag)
            .map(|(_, op)| op.clone())
            .collect()
    }
}

impl DataLayer for InMemoryDataLayer {
    fn execute(&mut self, task_tag: &str, op: &DataViewOp) -> Result<ReturnResult> {
        let mut store = self.store();
        store.log.push((task_tag.to_string(), op.clone()));

        if store
            .failing
            .contains(&(task_tag.to_string(), op_name(op).to_string()))
        {
            debug!(task = %task_tag, op = op_name(op), "data view operation failed");
            return Ok(ReturnResult::failure(format!(
                "{} failed for task {task_tag}",
                op_name(op)
            )));
        }

        let view = store.views.entry(task_tag.to_string()).or_default();
        match op {
            DataViewOp::Clear => {
                view.snapshot.records.clear();
                view.changed = false;
            }
            DataViewOp::CreateFirstRecord if view.snapshot.records.is_empty() => {
                view.snapshot.records.push(Vec::new());
            }
            _ => {}
        }
        Ok(ReturnResult::success())
    }

    fn replicate(&self, task_tag: &str) -> Option<ViewSnapshot> {
        self.view(task_tag)
    }

    fn is_changed(&self, task_tag: &str) -> bool {
        self.store().views.get(task_tag).is_some_and(|v| v.changed)
    }

    fn set_changed(&mut self, task_tag: &str, changed: bool) {
        self.store()
            .views
            .entry(task_tag.to_string())
            .or_default()
            .changed = changed;
    }

    fn position_key(&self, task_tag: &str) -> Option<CacheKey> {
        self.store()
            .views
            .get(task_tag)
            .and_then(|v| v.snapshot.position)
    }

    fn swap_in(&mut self, task_tag: &str, snapshot: ViewSnapshot) {
        let mut store = self.store();
        let view = store.views.entry(task_tag.to_string()).or_default();
        view.snapshot = snapshot;
        view.changed = false;
    }

    fn field_value(&self, task_tag: &str, field_index: usize) -> Option<FieldValue> {
        self.store()
            .views
            .get(task_tag)
            .and_then(|v| v.fields.get(&field_index).cloned())
    }
}
