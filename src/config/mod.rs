// src/config/mod.rs

//! TOML configuration.
//!
//! - [`model`] maps the file onto serde types.
//! - [`loader`] reads and deserializes it.
//! - [`validate`] checks the task tree and engine settings.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    default_config_path, load_and_validate, load_from_path, parse_str, resolve_config_path,
};
pub use model::{CacheSection, ConfigFile, EngineSection, RawConfigFile, TaskConfig};
