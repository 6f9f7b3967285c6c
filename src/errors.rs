// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid attribute {key}={value:?}: {reason}")]
    InvalidAttribute {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unresolvable user event: task '{task}' index {index}")]
    UnresolvedUserEvent { task: String, index: usize },

    #[error("Data layer error: {0}")]
    DataLayer(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    pub(crate) fn invalid_attribute(key: &str, value: &str, reason: impl Into<String>) -> Self {
        EngineError::InvalidAttribute {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, EngineError>;
