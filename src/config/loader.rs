// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV_VAR: &str = "TASKENGINE_CONFIG";

/// Deserialize a config document. No semantic checks.
pub fn parse_str(contents: &str) -> Result<RawConfigFile> {
    Ok(toml::from_str(contents)?)
}

/// Read and deserialize the file at `path`.
///
/// This does **not** validate the task tree; use [`load_and_validate`] for
/// that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    debug!(path = %path.display(), bytes = contents.len(), "read config file");
    parse_str(&contents)
}

/// Read, deserialize and validate the file at `path`.
///
/// Missing sections take their serde defaults. Validation rejects empty or
/// duplicate tags, unknown parents, cycles in the parent graph, attributes a
/// task node would refuse, and zero-sized engine settings.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    ConfigFile::try_from(load_from_path(&path)?)
}

/// `TaskEngine.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("TaskEngine.toml")
}

/// Config path from `--config`, then `TASKENGINE_CONFIG`, then the default.
pub fn resolve_config_path(cli: Option<&str>) -> PathBuf {
    cli.map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
        .unwrap_or_else(default_config_path)
}
