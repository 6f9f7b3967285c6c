#![allow(dead_code)]

use std::collections::BTreeMap;

use taskengine::cache::{CacheKey, FieldKind, FieldValue, ViewSnapshot};
use taskengine::collab::InMemoryDataLayer;
use taskengine::config::{CacheSection, ConfigFile, EngineSection, RawConfigFile, TaskConfig};
use taskengine::engine::{Collaborators, Engine};
use taskengine::task::TaskId;

use crate::fakes::{ManualTimers, RecordingPresentation, RecordingTransport, ScriptedDispatcher};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                engine: EngineSection::default(),
                cache: CacheSection::default(),
                task: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, task: TaskConfig) -> Self {
        self.config.task.push(task);
        self
    }

    pub fn with_max_bytes(mut self, max: usize) -> Self {
        self.config.cache.max_bytes = Some(max);
        self
    }

    pub fn with_locate_delay_ms(mut self, ms: u64) -> Self {
        self.config.engine.locate_delay_ms = ms;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(tag: &str) -> Self {
        Self {
            task: TaskConfig {
                tag: tag.to_string(),
                parent: None,
                attributes: BTreeMap::new(),
            },
        }
    }

    pub fn parent(mut self, tag: &str) -> Self {
        self.task.parent = Some(tag.to_string());
        self
    }

    pub fn attr(mut self, key: &str, value: &str) -> Self {
        self.task.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// An engine wired to recording fakes, with handles kept for assertions.
pub struct EngineFixture {
    pub engine: Engine,
    pub data: InMemoryDataLayer,
    pub ui: RecordingPresentation,
    pub transport: RecordingTransport,
    pub timers: ManualTimers,
    pub dispatcher: ScriptedDispatcher,
}

impl EngineFixture {
    pub fn new() -> Self {
        let data = InMemoryDataLayer::new();
        let ui = RecordingPresentation::new();
        let transport = RecordingTransport::new();
        let timers = ManualTimers::new();
        let dispatcher = ScriptedDispatcher::new();

        let collab = Collaborators {
            data: Box::new(data.clone()),
            ui: Box::new(ui.clone()),
            transport: Box::new(transport.clone()),
            timers: Box::new(timers.clone()),
            ..Collaborators::default()
        };
        let engine = Engine::new(collab).with_dispatcher(Box::new(dispatcher.clone()));

        Self {
            engine,
            data,
            ui,
            transport,
            timers,
            dispatcher,
        }
    }

    pub fn id(&self, tag: &str) -> TaskId {
        self.engine.task(tag).expect("task should exist")
    }
}

impl Default for EngineFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Live view with `rows` single-column records positioned at `position`.
pub fn view(position: CacheKey, rows: usize, record_size: usize) -> ViewSnapshot {
    let records = (0..rows).map(|i| vec![format!("row{i}")]).collect();
    ViewSnapshot::new(position, records, record_size)
}

pub fn alpha(value: &str) -> FieldValue {
    FieldValue::new(FieldKind::Alpha, value)
}

pub fn numeric(value: &str) -> FieldValue {
    FieldValue::new(FieldKind::Numeric, value)
}
