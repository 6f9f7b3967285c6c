// src/task/materialize.rs

//! Building task subtrees from protocol elements.

use std::collections::HashSet;

use tracing::debug;

use crate::engine::EngineState;
use crate::errors::{EngineError, Result};
use crate::event::EventDescriptor;
use crate::task::TaskId;
use crate::task::lifecycle::discard_subtree;
use crate::task::node::TaskNode;
use crate::types::TransLevel;

/// One task element of the inbound stream: its attributes in arrival order,
/// the timer and expression handlers it registers, and its nested task
/// elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskElement {
    pub attributes: Vec<(String, String)>,
    pub handlers: Vec<Vec<(String, String)>>,
    pub children: Vec<TaskElement>,
}

impl TaskElement {
    pub fn new(tag: &str) -> Self {
        Self {
            attributes: vec![("tag".to_string(), tag.to_string())],
            handlers: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, key: &str, value: &str) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    /// Attach a handler event, given as event attributes (`type` = `T` or `E`).
    pub fn handler(mut self, attributes: &[(&str, &str)]) -> Self {
        self.handlers.push(
            attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    pub fn child(mut self, child: TaskElement) -> Self {
        self.children.push(child);
        self
    }
}

/// A parsed element, not yet in the tree.
struct Planned {
    node: TaskNode,
    handlers: Vec<EventDescriptor>,
    children: Vec<Planned>,
}

/// Create the subtree described by `element` under `parent`.
///
/// The whole subtree is parsed before anything touches the tree, and tree
/// links given by tag (`path_parent`, `triggering_task`) are resolved once
/// every node exists, so an element may refer to a sibling that arrives
/// after it. On any error the tree is left as it was.
pub fn materialize(
    state: &mut EngineState,
    element: &TaskElement,
    parent: Option<TaskId>,
) -> Result<TaskId> {
    if let Some(p) = parent {
        state.tree.node(p)?;
    }
    let mut seen = HashSet::new();
    let plan = plan_element(state, element, &mut seen)?;

    let mut created = Vec::new();
    let root = insert_planned(state, plan, parent, &mut created)?;

    let mut resolved = Vec::with_capacity(created.len());
    for &id in &created {
        match resolve_links(state, id) {
            Ok(links) => resolved.push((id, links)),
            Err(e) => {
                let removed = discard_subtree(state, root);
                debug!(%root, removed, error = %e, "materialize rolled back");
                return Err(e);
            }
        }
    }
    for (id, links) in resolved {
        apply_links(state, id, links)?;
    }
    Ok(root)
}

fn plan_element(
    state: &EngineState,
    element: &TaskElement,
    seen: &mut HashSet<String>,
) -> Result<Planned> {
    let mut node = TaskNode::new("", state.counter.clone());
    for (key, value) in &element.attributes {
        node.set_attribute(key, value)?;
    }
    if node.tag.is_empty() {
        return Err(EngineError::invalid_attribute("tag", "", "task element without a tag"));
    }
    if state.tree.find_by_tag(&node.tag).is_some() || !seen.insert(node.tag.clone()) {
        return Err(EngineError::invalid_attribute("tag", &node.tag, "duplicate task tag"));
    }

    let handlers = element
        .handlers
        .iter()
        .map(|attrs| {
            let event = EventDescriptor::fill(attrs, Some(node.tag.as_str()))?;
            match event {
                EventDescriptor::Timer { .. } | EventDescriptor::Expression { .. } => Ok(event),
                _ => {
                    let kind = attrs
                        .iter()
                        .find(|(k, _)| k == "type")
                        .map(|(_, v)| v.as_str())
                        .unwrap_or("");
                    Err(EngineError::invalid_attribute(
                        "handler",
                        kind,
                        "only timer and expression handlers register with a task",
                    ))
                }
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let children = element
        .children
        .iter()
        .map(|child| plan_element(state, child, seen))
        .collect::<Result<Vec<_>>>()?;

    Ok(Planned {
        node,
        handlers,
        children,
    })
}

fn insert_planned(
    state: &mut EngineState,
    plan: Planned,
    parent: Option<TaskId>,
    created: &mut Vec<TaskId>,
) -> Result<TaskId> {
    let id = state.tree.insert(plan.node, parent)?;
    created.push(id);
    for event in plan.handlers {
        state.handlers.register(id, event);
    }
    for child in plan.children {
        insert_planned(state, child, Some(id), created)?;
    }
    Ok(id)
}

struct ResolvedLinks {
    path_parent: Option<TaskId>,
    triggering: Option<TaskId>,
    trans_owner: bool,
    trans_level: Option<TransLevel>,
}

fn resolve_links(state: &EngineState, id: TaskId) -> Result<ResolvedLinks> {
    let node = state.tree.node(id)?;
    let path_parent = match &node.links.path_parent {
        Some(tag) => Some(state.tree.id_of(tag)?),
        None => node.parent,
    };
    let triggering = match &node.links.triggering_task {
        Some(tag) => Some(state.tree.id_of(tag)?),
        None => None,
    };
    Ok(ResolvedLinks {
        path_parent,
        triggering,
        trans_owner: node.links.trans_owner,
        trans_level: node.links.trans_level,
    })
}

fn apply_links(state: &mut EngineState, id: TaskId, links: ResolvedLinks) -> Result<()> {
    let node = state.tree.node_mut(id)?;
    node.path_parent = links.path_parent;
    node.triggering_task = links.triggering;
    let trans = node.transaction.clone();

    if let Some(trans) = trans {
        state.transactions.resolve_or_create(&trans);
        if links.trans_owner {
            state.transactions.transfer_ownership(&trans, id);
        }
        if let Some(level) = links.trans_level {
            state.transactions.set_level(&trans, level);
        }
        debug!(%id, trans = %trans, owner = links.trans_owner, "task joined transaction");
    }
    Ok(())
}
