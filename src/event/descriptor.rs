// src/event/descriptor.rs

//! Event descriptor variants and attribute-driven construction.

use std::sync::OnceLock;

use crate::errors::{EngineError, Result};
use crate::event::internal::InternalCode;
use crate::task::TaskId;

/// Keyboard modifier bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifier(pub u8);

impl Modifier {
    pub const NONE: Modifier = Modifier(0);
    pub const SHIFT: Modifier = Modifier(1);
    pub const CTRL: Modifier = Modifier(2);
    pub const ALT: Modifier = Modifier(4);

    pub fn parse(s: &str) -> Option<Modifier> {
        let mut bits = 0u8;
        for c in s.trim().chars() {
            bits |= match c.to_ascii_uppercase() {
                'N' => 0,
                'S' => Self::SHIFT.0,
                'C' => Self::CTRL.0,
                'A' => Self::ALT.0,
                _ => return None,
            };
        }
        Some(Modifier(bits))
    }
}

/// Handle to a compiled expression owned by the (external) evaluator.
///
/// Two handles are the same expression iff their ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExpressionRef(pub u32);

/// Entry in a task's user-event table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserEventDef {
    pub public_name: Option<String>,
}

/// Identity of a user event once its owning task has been located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUserEvent {
    pub task: TaskId,
    pub index: usize,
    pub public_name: Option<String>,
}

impl ResolvedUserEvent {
    /// Identity comparison: same table slot of the same task.
    pub fn same_target(&self, other: &ResolvedUserEvent) -> bool {
        self.task == other.task && self.index == other.index
    }
}

/// Lazily resolved reference to a user event defined by another task.
#[derive(Debug)]
pub struct UserEventRef {
    pub owner_task_tag: String,
    pub index: usize,
    resolved: OnceLock<ResolvedUserEvent>,
}

impl Clone for UserEventRef {
    fn clone(&self) -> Self {
        let resolved = OnceLock::new();
        if let Some(r) = self.resolved.get() {
            let _ = resolved.set(r.clone());
        }
        Self {
            owner_task_tag: self.owner_task_tag.clone(),
            index: self.index,
            resolved,
        }
    }
}

impl UserEventRef {
    pub fn new(owner_task_tag: impl Into<String>, index: usize) -> Self {
        Self {
            owner_task_tag: owner_task_tag.into(),
            index,
            resolved: OnceLock::new(),
        }
    }

    pub fn resolved(&self) -> Option<&ResolvedUserEvent> {
        self.resolved.get()
    }

    pub(crate) fn resolve_with(
        &self,
        lookup: impl FnOnce(&str, usize) -> Option<ResolvedUserEvent>,
    ) -> Result<&ResolvedUserEvent> {
        if let Some(r) = self.resolved.get() {
            return Ok(r);
        }
        let found = lookup(&self.owner_task_tag, self.index).ok_or_else(|| {
            EngineError::UnresolvedUserEvent {
                task: self.owner_task_tag.clone(),
                index: self.index,
            }
        })?;
        Ok(self.resolved.get_or_init(|| found))
    }
}

/// Immutable, classified description of an event.
#[derive(Debug, Clone)]
pub enum EventDescriptor {
    System { key_code: u16, modifier: Modifier },
    Internal { code: InternalCode },
    Timer { seconds: u32 },
    Expression { expr: ExpressionRef },
    User { target: UserEventRef },
    UserFunction { name: String, name_hash: u32 },
    Public { name: String, expr: Option<ExpressionRef> },
}

impl EventDescriptor {
    pub fn internal(code: InternalCode) -> Self {
        EventDescriptor::Internal { code }
    }

    pub fn user(owner_task_tag: impl Into<String>, index: usize) -> Self {
        EventDescriptor::User {
            target: UserEventRef::new(owner_task_tag, index),
        }
    }

    pub fn user_function(name: impl Into<String>) -> Self {
        let name = name.into();
        let name_hash = name_hash(&name);
        EventDescriptor::UserFunction { name, name_hash }
    }

    pub fn internal_code(&self) -> Option<InternalCode> {
        match self {
            EventDescriptor::Internal { code } => Some(*code),
            _ => None,
        }
    }

    /// Materialize an event from protocol attributes.
    ///
    /// `task_ref` carries the owning task tag from an inner task-reference
    /// block; it takes precedence over a `user_tsk` attribute.
    pub fn fill(attributes: &[(String, String)], task_ref: Option<&str>) -> Result<Self> {
        let get = |key: &str| {
            attributes
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        let require = |key: &str| {
            get(key).ok_or_else(|| {
                EngineError::invalid_attribute(key, "", "required for this event type")
            })
        };

        let kind = require("type")?;
        let event = match kind.trim() {
            "S" => {
                let key_code = parse_num::<u16>("keycode", require("keycode")?)?;
                let modifier_raw = get("modifier").unwrap_or("N");
                let modifier = Modifier::parse(modifier_raw).ok_or_else(|| {
                    EngineError::invalid_attribute("modifier", modifier_raw, "unknown modifier")
                })?;
                EventDescriptor::System { key_code, modifier }
            }
            "I" => EventDescriptor::Internal {
                code: parse_num("internal", require("internal")?)?,
            },
            "T" => EventDescriptor::Timer {
                seconds: parse_num("seconds", require("seconds")?)?,
            },
            "E" => EventDescriptor::Expression {
                expr: ExpressionRef(parse_num("exp", require("exp")?)?),
            },
            "U" => {
                let owner = match task_ref {
                    Some(tag) => tag,
                    None => require("user_tsk")?,
                };
                let index = parse_num("user_idx", require("user_idx")?)?;
                EventDescriptor::user(owner, index)
            }
            "F" => EventDescriptor::user_function(require("name")?),
            "P" => EventDescriptor::Public {
                name: require("name")?.to_string(),
                expr: match get("exp") {
                    Some(v) => Some(ExpressionRef(parse_num("exp", v)?)),
                    None => None,
                },
            },
            other => {
                return Err(EngineError::invalid_attribute(
                    "type",
                    other,
                    "expected one of S, I, T, E, U, F, P",
                ));
            }
        };
        Ok(event)
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| EngineError::invalid_attribute(key, value, "not a number"))
}

/// Case-insensitive name hash used to fast-path user-function comparison.
pub(crate) fn name_hash(name: &str) -> u32 {
    let lowered = name.to_lowercase();
    let digest = blake3::hash(lowered.as_bytes());
    let bytes = digest.as_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
