// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::{CapacityPolicy, MaxBytes, Unbounded};
use crate::engine::EngineSettings;
use crate::task::TaskElement;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [engine]
/// locate_delay_ms = 400
/// event_channel_capacity = 64
///
/// [cache]
/// max_bytes = 1048576
///
/// [[task]]
/// tag = "1"
/// attributes = { name = "Main", main = "Y" }
///
/// [[task]]
/// tag = "2"
/// parent = "1"
/// attributes = { subform = "Y", cached = "Y", descriptor = "1,0" }
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub cache: CacheSection,

    /// Fixture task tree, in declaration order.
    #[serde(default)]
    pub task: Vec<TaskConfig>,
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Debounce for incremental locate keystrokes.
    #[serde(default = "default_locate_delay_ms")]
    pub locate_delay_ms: u64,

    /// Capacity of the runtime event channel.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_locate_delay_ms() -> u64 {
    400
}

fn default_event_channel_capacity() -> usize {
    64
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            locate_delay_ms: default_locate_delay_ms(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CacheSection {
    /// Upper bound on each subform cache's tracked size; absent = unbounded.
    #[serde(default)]
    pub max_bytes: Option<usize>,
}

/// One `[[task]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub tag: String,

    /// Tag of the parent task; absent or empty for a root.
    #[serde(default)]
    pub parent: Option<String>,

    /// Protocol attributes applied through `TaskNode::set_attribute`.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl TaskConfig {
    /// Parent tag, treating an empty string as "no parent".
    pub fn parent_tag(&self) -> Option<&str> {
        self.parent.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

/// Validated configuration. Construct through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub engine: EngineSection,
    pub cache: CacheSection,
    pub task: Vec<TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        engine: EngineSection,
        cache: CacheSection,
        task: Vec<TaskConfig>,
    ) -> Self {
        Self {
            engine,
            cache,
            task,
        }
    }

    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            locate_delay: Duration::from_millis(self.engine.locate_delay_ms),
        }
    }

    pub fn capacity_policy(&self) -> Box<dyn CapacityPolicy> {
        match self.cache.max_bytes {
            Some(max) => Box::new(MaxBytes(max)),
            None => Box::new(Unbounded),
        }
    }

    /// Tags of the root tasks, in declaration order.
    pub fn root_tags(&self) -> Vec<&str> {
        self.task
            .iter()
            .filter(|t| t.parent_tag().is_none())
            .map(|t| t.tag.as_str())
            .collect()
    }

    /// The fixture tree as nested task elements, one per root.
    pub fn task_elements(&self) -> Vec<TaskElement> {
        self.root_tags()
            .into_iter()
            .map(|tag| self.element_for(tag))
            .collect()
    }

    fn element_for(&self, tag: &str) -> TaskElement {
        let mut element = TaskElement::new(tag);
        if let Some(task) = self.task.iter().find(|t| t.tag == tag) {
            for (key, value) in &task.attributes {
                element = element.attr(key, value);
            }
        }
        for child in self.task.iter().filter(|t| t.parent_tag() == Some(tag)) {
            element = element.child(self.element_for(&child.tag));
        }
        element
    }
}
