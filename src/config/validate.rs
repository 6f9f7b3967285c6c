// src/config/validate.rs

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::actions::ActionCounter;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{EngineError, Result};
use crate::task::TaskNode;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = EngineError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.engine, raw.cache, raw.task))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_engine_section(cfg)?;
    validate_task_tags(cfg)?;
    validate_parents(cfg)?;
    validate_tree(cfg)?;
    validate_attributes(cfg)?;
    Ok(())
}

fn validate_engine_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.engine.event_channel_capacity == 0 {
        return Err(EngineError::ConfigError(
            "[engine].event_channel_capacity must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.cache.max_bytes == Some(0) {
        return Err(EngineError::ConfigError(
            "[cache].max_bytes must be >= 1 when set (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_task_tags(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for task in &cfg.task {
        if task.tag.trim().is_empty() {
            return Err(EngineError::ConfigError(
                "every [[task]] needs a non-empty `tag`".to_string(),
            ));
        }
        if !seen.insert(task.tag.as_str()) {
            return Err(EngineError::ConfigError(format!(
                "duplicate task tag '{}'",
                task.tag
            )));
        }
    }
    Ok(())
}

fn validate_parents(cfg: &RawConfigFile) -> Result<()> {
    for task in &cfg.task {
        let Some(parent) = task.parent_tag() else {
            continue;
        };
        if parent == task.tag {
            return Err(EngineError::ConfigError(format!(
                "task '{}' cannot be its own parent",
                task.tag
            )));
        }
        if !cfg.task.iter().any(|t| t.tag == parent) {
            return Err(EngineError::ConfigError(format!(
                "task '{}' has unknown parent '{}'",
                task.tag, parent
            )));
        }
    }
    Ok(())
}

fn validate_tree(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: parent -> child.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for task in &cfg.task {
        graph.add_node(task.tag.as_str());
    }
    for task in &cfg.task {
        if let Some(parent) = task.parent_tag() {
            graph.add_edge(parent, task.tag.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(EngineError::ConfigError(format!(
            "cycle detected in task tree involving task '{}'",
            cycle.node_id()
        ))),
    }
}

fn validate_attributes(cfg: &RawConfigFile) -> Result<()> {
    let counter = ActionCounter::new();
    for task in &cfg.task {
        if task.attributes.contains_key("tag") {
            return Err(EngineError::ConfigError(format!(
                "task '{}': set the tag with `tag`, not inside `attributes`",
                task.tag
            )));
        }
        let mut node = TaskNode::new(task.tag.as_str(), counter.clone());
        for (key, value) in &task.attributes {
            node.set_attribute(key, value)?;
        }
    }
    Ok(())
}
