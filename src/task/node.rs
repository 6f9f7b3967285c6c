// src/task/node.rs

//! Per-task entity.

use std::collections::HashMap;

use crate::actions::{ActionCounter, ActionLedger};
use crate::cache::{DescriptorPart, SubformResultCache, ViewSnapshot};
use crate::collab::{ReturnResult, TimerHandle};
use crate::errors::{EngineError, Result};
use crate::event::{InternalCode, Modifier, UserEventDef};
use crate::task::TaskId;
use crate::transaction::TransId;
use crate::types::{FlowDirection, FlowMode, TaskLevel, TaskMode, TransLevel, parse_flag};

/// Composite definition id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DefinitionId {
    pub ctl_idx: u32,
    pub program_id: u32,
    pub task_id: u32,
}

/// Coarse lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskPhase {
    #[default]
    Created,
    Started,
    /// Setup returned a failure; the opener decides how to close the task.
    SetupFailed,
    Ended,
}

/// Close-protocol state.
///
/// `InEndTask` implies trying to stop; the end-task finally phase only ever
/// moves a node from `InEndTask` back to `TryingToStop` or `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopState {
    #[default]
    Running,
    TryingToStop,
    InEndTask,
}

impl StopState {
    pub fn in_end_task(self) -> bool {
        self == StopState::InEndTask
    }

    pub fn trying_to_stop(self) -> bool {
        self != StopState::Running
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordCycle {
    #[default]
    Idle,
    InRecordCycle,
}

/// Flow direction and mode.
///
/// Once either is set to a non-neutral value it can only be changed by first
/// resetting it to neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlowControl {
    direction: FlowDirection,
    mode: FlowMode,
}

impl FlowControl {
    pub fn direction(&self) -> FlowDirection {
        self.direction
    }

    pub fn mode(&self) -> FlowMode {
        self.mode
    }

    pub fn set_direction(&mut self, direction: FlowDirection) -> bool {
        let allowed = direction == FlowDirection::Neutral
            || self.direction == FlowDirection::Neutral
            || self.direction == direction;
        if allowed {
            self.direction = direction;
        }
        allowed
    }

    pub fn set_mode(&mut self, mode: FlowMode) -> bool {
        let allowed =
            mode == FlowMode::Neutral || self.mode == FlowMode::Neutral || self.mode == mode;
        if allowed {
            self.mode = mode;
        }
        allowed
    }

    pub fn reset(&mut self) {
        *self = FlowControl::default();
    }
}

/// Incremental locate state.
#[derive(Debug, Clone, Default)]
pub struct LocateQuery {
    /// Keystrokes collected since the timer was (re)armed.
    pub buffer: String,
    /// Query applied by the last timer firing; drives locate-mode caching.
    pub active_query: Option<String>,
    pub timer: Option<TimerHandle>,
}

impl LocateQuery {
    pub fn is_active(&self) -> bool {
        self.active_query.is_some()
    }
}

/// Cross-node references read from attributes, resolved once the whole
/// subtree exists.
#[derive(Debug, Clone, Default)]
pub(crate) struct PendingLinks {
    pub path_parent: Option<String>,
    pub triggering_task: Option<String>,
    pub trans_owner: bool,
    pub trans_level: Option<TransLevel>,
}

#[derive(Debug)]
pub struct TaskNode {
    pub id: TaskId,
    pub tag: String,
    pub name: String,
    pub definition: DefinitionId,

    /// Task containing the operation that created this one.
    pub parent: Option<TaskId>,
    /// Task whose handler textually contains the call.
    pub path_parent: Option<TaskId>,
    /// Task whose running handler caused this one to be created.
    pub triggering_task: Option<TaskId>,
    pub children: Vec<TaskId>,

    pub phase: TaskPhase,
    pub stop_state: StopState,
    /// Set once, never cleared.
    pub aborting: bool,
    pub record_cycle: RecordCycle,
    /// A cached view was swapped in; a record prefix/suffix must run.
    pub needs_record_cycle: bool,
    pub first_record_cycle: bool,
    pub exec_depth: usize,
    pub move_to_first_control: bool,
    pub opened_by_destination: bool,
    pub task_prefix_executed: bool,
    pub task_suffix_executed: bool,

    pub is_subform: bool,
    pub cached: bool,
    pub is_main_program: bool,
    pub interactive: bool,
    pub has_form: bool,
    pub form_refreshed: bool,
    pub modal: bool,
    pub end_condition: bool,
    pub mode: TaskMode,
    pub level: TaskLevel,
    pub flow: FlowControl,

    pub descriptor: Vec<DescriptorPart>,
    pub transaction: Option<TransId>,
    pub previous_parent_tag: Option<String>,

    pub actions: ActionLedger,
    pub cache: SubformResultCache<ViewSnapshot>,
    pub user_events: Vec<UserEventDef>,
    pub keymap: HashMap<(u16, Modifier), InternalCode>,
    pub locate: LocateQuery,
    pub last_setup_result: Option<ReturnResult>,

    pub(crate) links: PendingLinks,
}

impl TaskNode {
    pub fn new(tag: impl Into<String>, counter: ActionCounter) -> Self {
        Self {
            id: TaskId(0),
            tag: tag.into(),
            name: String::new(),
            definition: DefinitionId::default(),
            parent: None,
            path_parent: None,
            triggering_task: None,
            children: Vec::new(),
            phase: TaskPhase::Created,
            stop_state: StopState::Running,
            aborting: false,
            record_cycle: RecordCycle::Idle,
            needs_record_cycle: false,
            first_record_cycle: false,
            exec_depth: 0,
            move_to_first_control: false,
            opened_by_destination: false,
            task_prefix_executed: false,
            task_suffix_executed: false,
            is_subform: false,
            cached: false,
            is_main_program: false,
            interactive: true,
            has_form: false,
            form_refreshed: false,
            modal: false,
            end_condition: false,
            mode: TaskMode::default(),
            level: TaskLevel::default(),
            flow: FlowControl::default(),
            descriptor: Vec::new(),
            transaction: None,
            previous_parent_tag: None,
            actions: ActionLedger::new(counter),
            cache: SubformResultCache::new(),
            user_events: Vec::new(),
            keymap: HashMap::new(),
            locate: LocateQuery::default(),
            last_setup_result: None,
            links: PendingLinks::default(),
        }
    }

    pub fn is_started(&self) -> bool {
        self.phase == TaskPhase::Started
    }

    /// Whether the subform result cache is consulted for this task.
    pub fn uses_cache(&self) -> bool {
        self.is_subform && self.cached
    }

    /// Apply one protocol attribute.
    pub fn set_attribute(&mut self, key: &str, value: &str) -> Result<()> {
        let flag = |v: &str| {
            parse_flag(v).ok_or_else(|| EngineError::invalid_attribute(key, v, "expected a flag"))
        };
        let number = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| EngineError::invalid_attribute(key, v, "not a number"))
        };
        let non_empty = |v: &str| {
            let v = v.trim();
            (!v.is_empty()).then(|| v.to_string())
        };

        match key {
            "tag" => self.tag = value.trim().to_string(),
            "name" => self.name = value.to_string(),
            "ctl_idx" => self.definition.ctl_idx = number(value)?,
            "prg_id" => self.definition.program_id = number(value)?,
            "task_id" => self.definition.task_id = number(value)?,
            "mode" => {
                self.mode = value
                    .parse()
                    .map_err(|e: String| EngineError::invalid_attribute(key, value, e))?
            }
            "level" => {
                self.level = value
                    .parse()
                    .map_err(|e: String| EngineError::invalid_attribute(key, value, e))?
            }
            "subform" => self.is_subform = flag(value)?,
            "cached" => self.cached = flag(value)?,
            "main" => self.is_main_program = flag(value)?,
            "interactive" => self.interactive = flag(value)?,
            "form" => self.has_form = flag(value)?,
            "end_condition" => self.end_condition = flag(value)?,
            "descriptor" => self.descriptor = DescriptorPart::parse_list(value)?,
            "transaction" => self.transaction = non_empty(value),
            "trans_owner" => self.links.trans_owner = flag(value)?,
            "trans_level" => {
                self.links.trans_level = Some(
                    value
                        .parse()
                        .map_err(|e: String| EngineError::invalid_attribute(key, value, e))?,
                )
            }
            "prev_parent" => self.previous_parent_tag = non_empty(value),
            "path_parent" => self.links.path_parent = non_empty(value),
            "triggering_task" => self.links.triggering_task = non_empty(value),
            "user_events" => {
                self.user_events = value
                    .split(',')
                    .map(|n| UserEventDef {
                        public_name: non_empty(n),
                    })
                    .collect()
            }
            "keymap" => self.keymap = parse_keymap(value)?,
            _ => {
                return Err(EngineError::invalid_attribute(key, value, "unknown attribute"));
            }
        }
        Ok(())
    }
}

/// `"keycode:modifier=internal;..."`, e.g. `"13:N=50;115:A=2"`.
fn parse_keymap(value: &str) -> Result<HashMap<(u16, Modifier), InternalCode>> {
    let bad = |reason: &str| EngineError::invalid_attribute("keymap", value, reason);
    let mut map = HashMap::new();
    for entry in value.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (key, code) = entry.split_once('=').ok_or_else(|| bad("expected key=code"))?;
        let (key_code, modifier) = key.split_once(':').unwrap_or((key, "N"));
        let key_code = key_code
            .trim()
            .parse::<u16>()
            .map_err(|_| bad("key code is not a number"))?;
        let modifier = Modifier::parse(modifier).ok_or_else(|| bad("unknown modifier"))?;
        let code = code
            .trim()
            .parse::<InternalCode>()
            .map_err(|_| bad("internal code is not a number"))?;
        map.insert((key_code, modifier), code);
    }
    Ok(map)
}
