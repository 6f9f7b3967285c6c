// src/task/tree.rs

//! Arena owning every task node.
//!
//! Ownership runs strictly parent → children through `children` lists;
//! `parent`, `path_parent` and `triggering_task` are plain ids that may
//! outlive the node they point at.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::errors::{EngineError, Result};
use crate::task::TaskId;
use crate::task::node::TaskNode;

#[derive(Debug, Default)]
pub struct TaskTree {
    nodes: BTreeMap<TaskId, TaskNode>,
    /// Top-level application roots; the first one is the main application.
    roots: Vec<TaskId>,
    next_id: u32,
}

impl TaskTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `node` under `parent` (or as a new root) and return its id.
    pub fn insert(&mut self, mut node: TaskNode, parent: Option<TaskId>) -> Result<TaskId> {
        self.next_id += 1;
        let id = TaskId(self.next_id);
        node.id = id;
        node.parent = parent;

        match parent {
            Some(p) => self.node_mut(p)?.children.push(id),
            None => self.roots.push(id),
        }
        debug!(task = %node.tag, %id, ?parent, "task inserted into tree");
        self.nodes.insert(id, node);
        Ok(id)
    }

    pub fn get(&self, id: TaskId) -> Option<&TaskNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut TaskNode> {
        self.nodes.get_mut(&id)
    }

    pub fn node(&self, id: TaskId) -> Result<&TaskNode> {
        self.nodes
            .get(&id)
            .ok_or_else(|| EngineError::TaskNotFound(id.to_string()))
    }

    pub fn node_mut(&mut self, id: TaskId) -> Result<&mut TaskNode> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| EngineError::TaskNotFound(id.to_string()))
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All live ids in creation order.
    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn roots(&self) -> &[TaskId] {
        &self.roots
    }

    /// The root of the whole application, if any.
    pub fn application_root(&self) -> Option<TaskId> {
        self.roots.first().copied()
    }

    pub fn is_application_root(&self, id: TaskId) -> bool {
        self.application_root() == Some(id)
    }

    pub fn find_by_tag(&self, tag: &str) -> Option<TaskId> {
        self.nodes
            .values()
            .find(|n| n.tag == tag)
            .map(|n| n.id)
    }

    pub fn id_of(&self, tag: &str) -> Result<TaskId> {
        self.find_by_tag(tag)
            .ok_or_else(|| EngineError::TaskNotFound(tag.to_string()))
    }

    pub fn tag_of(&self, id: TaskId) -> Option<&str> {
        self.nodes.get(&id).map(|n| n.tag.as_str())
    }

    /// Snapshot of the children list (the list may change while iterating).
    pub fn children_of(&self, id: TaskId) -> Vec<TaskId> {
        self.nodes
            .get(&id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// `id` followed by its descendants, depth-first, parents before children.
    pub fn subtree(&self, id: TaskId) -> Vec<TaskId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Number of ancestors of `id`.
    pub fn depth_of(&self, id: TaskId) -> usize {
        let mut depth = 0;
        let mut current = self.nodes.get(&id).and_then(|n| n.parent);
        while let Some(p) = current {
            depth += 1;
            current = self.nodes.get(&p).and_then(|n| n.parent);
        }
        depth
    }

    /// Unlink `id` from its parent's children (or from the root list).
    pub fn detach(&mut self, id: TaskId) {
        let parent = self.nodes.get(&id).and_then(|n| n.parent);
        match parent {
            Some(p) => {
                if let Some(pn) = self.nodes.get_mut(&p) {
                    pn.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }
    }

    /// Detach `id` and drop it together with all its descendants.
    pub fn remove_subtree(&mut self, id: TaskId) -> Vec<TaskNode> {
        if !self.nodes.contains_key(&id) {
            warn!(%id, "remove_subtree on unknown task");
            return Vec::new();
        }
        self.detach(id);
        let ids = self.subtree(id);
        ids.into_iter()
            .filter_map(|i| self.nodes.remove(&i))
            .collect()
    }

    /// Drop a single, already detached node.
    pub(crate) fn remove_node(&mut self, id: TaskId) -> Option<TaskNode> {
        self.nodes.remove(&id)
    }
}
