use std::str::FromStr;

use serde::Deserialize;

/// Runtime mode of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    Create,
    #[default]
    Modify,
    Query,
    /// Inherit the mode of the parent task.
    AsParent,
}

impl FromStr for TaskMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "c" | "create" => Ok(TaskMode::Create),
            "m" | "modify" => Ok(TaskMode::Modify),
            "q" | "query" => Ok(TaskMode::Query),
            "p" | "as_parent" | "asparent" => Ok(TaskMode::AsParent),
            other => Err(format!(
                "invalid task mode: {other} (expected create, modify, query or as_parent)"
            )),
        }
    }
}

/// Scope a task is currently operating at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskLevel {
    #[default]
    Task,
    Record,
}

impl FromStr for TaskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "t" | "task" => Ok(TaskLevel::Task),
            "r" | "record" => Ok(TaskLevel::Record),
            other => Err(format!("invalid task level: {other}")),
        }
    }
}

/// Scope marker of a logical transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransLevel {
    #[default]
    None,
    Record,
    TaskPrefix,
}

impl FromStr for TransLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "n" | "none" => Ok(TransLevel::None),
            "r" | "record" => Ok(TransLevel::Record),
            "p" | "t" | "task_prefix" => Ok(TransLevel::TaskPrefix),
            other => Err(format!("invalid transaction level: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowDirection {
    #[default]
    Neutral,
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowMode {
    #[default]
    Neutral,
    Step,
    Fast,
}

/// What the presentation layer should redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshScope {
    None,
    Form,
    CurrentRecord,
}

pub(crate) fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "y" | "1" | "true" | "yes" => Some(true),
        "n" | "0" | "false" | "no" | "" => Some(false),
        _ => None,
    }
}
