// tests/config_loader.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, TaskConfigBuilder};

use std::io::Write;
use std::time::Duration;

use taskengine::cache::CapacityPolicy;
use taskengine::config::loader::{
    default_config_path, load_and_validate, load_from_path, parse_str, resolve_config_path,
};
use taskengine::config::model::ConfigFile;
use taskengine::errors::EngineError;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn config_error(result: Result<ConfigFile, EngineError>) -> String {
    match result {
        Err(EngineError::ConfigError(msg)) => msg,
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn loads_full_config() {
    let file = write_config(
        r#"
[engine]
locate_delay_ms = 250
event_channel_capacity = 8

[cache]
max_bytes = 4096

[[task]]
tag = "main"
attributes = { main = "Y", name = "Main" }

[[task]]
tag = "sf"
parent = "main"
attributes = { subform = "Y", cached = "Y", descriptor = "main,0" }

[[task]]
tag = "other"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.settings().locate_delay, Duration::from_millis(250));
    assert_eq!(cfg.engine.event_channel_capacity, 8);
    assert_eq!(cfg.cache.max_bytes, Some(4096));
    assert!(cfg.capacity_policy().over_capacity(4097, 1));
    assert_eq!(cfg.root_tags(), vec!["main", "other"]);

    let elements = cfg.task_elements();
    assert_eq!(elements.len(), 2);
    assert_eq!(elements[0].children.len(), 1);
    assert!(
        elements[0].children[0]
            .attributes
            .contains(&("descriptor".to_string(), "main,0".to_string()))
    );
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let file = write_config("");
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.engine.locate_delay_ms, 400);
    assert_eq!(cfg.engine.event_channel_capacity, 64);
    assert_eq!(cfg.cache.max_bytes, None);
    assert!(!cfg.capacity_policy().over_capacity(usize::MAX, usize::MAX));
    assert!(cfg.task.is_empty());
}

#[test]
fn empty_parent_means_root() {
    let cfg = ConfigFileBuilder::new()
        .with_task(TaskConfigBuilder::new("a").parent("").build())
        .build();
    assert_eq!(cfg.root_tags(), vec!["a"]);
}

#[test]
fn rejects_duplicate_tags() {
    let raw = ConfigFileBuilder::new()
        .with_task(TaskConfigBuilder::new("a").build())
        .with_task(TaskConfigBuilder::new("a").build())
        .raw();
    assert!(config_error(ConfigFile::try_from(raw)).contains("duplicate task tag 'a'"));
}

#[test]
fn rejects_unknown_and_self_parents() {
    let raw = ConfigFileBuilder::new()
        .with_task(TaskConfigBuilder::new("a").parent("nope").build())
        .raw();
    assert!(config_error(ConfigFile::try_from(raw)).contains("unknown parent 'nope'"));

    let raw = ConfigFileBuilder::new()
        .with_task(TaskConfigBuilder::new("a").parent("a").build())
        .raw();
    assert!(config_error(ConfigFile::try_from(raw)).contains("cannot be its own parent"));
}

#[test]
fn rejects_parent_cycles() {
    let raw = ConfigFileBuilder::new()
        .with_task(TaskConfigBuilder::new("a").parent("b").build())
        .with_task(TaskConfigBuilder::new("b").parent("a").build())
        .raw();
    assert!(config_error(ConfigFile::try_from(raw)).contains("cycle detected"));
}

#[test]
fn rejects_bad_attributes() {
    let raw = ConfigFileBuilder::new()
        .with_task(TaskConfigBuilder::new("a").attr("mode", "sideways").build())
        .raw();
    assert!(matches!(
        ConfigFile::try_from(raw),
        Err(EngineError::InvalidAttribute { key, .. }) if key == "mode"
    ));

    let raw = ConfigFileBuilder::new()
        .with_task(TaskConfigBuilder::new("a").attr("colour", "red").build())
        .raw();
    assert!(matches!(
        ConfigFile::try_from(raw),
        Err(EngineError::InvalidAttribute { reason, .. }) if reason == "unknown attribute"
    ));

    let raw = ConfigFileBuilder::new()
        .with_task(TaskConfigBuilder::new("a").attr("tag", "b").build())
        .raw();
    assert!(config_error(ConfigFile::try_from(raw)).contains("not inside `attributes`"));
}

#[test]
fn rejects_zero_sized_settings() {
    let mut raw = ConfigFileBuilder::new().raw();
    raw.engine.event_channel_capacity = 0;
    assert!(config_error(ConfigFile::try_from(raw)).contains("event_channel_capacity"));

    let raw = ConfigFileBuilder::new().with_max_bytes(0).raw();
    assert!(config_error(ConfigFile::try_from(raw)).contains("max_bytes"));
}

#[test]
fn reports_io_and_toml_errors() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    assert!(matches!(
        load_from_path(&missing),
        Err(EngineError::IoError(_))
    ));

    let file = write_config("[engine\nlocate_delay_ms = ");
    assert!(matches!(
        load_from_path(file.path()),
        Err(EngineError::TomlError(_))
    ));
}

#[test]
fn default_path_is_in_working_directory() {
    assert_eq!(default_config_path().to_str(), Some("TaskEngine.toml"));
}

#[test]
fn explicit_path_wins_over_default() {
    assert_eq!(
        resolve_config_path(Some("elsewhere.toml")).to_str(),
        Some("elsewhere.toml")
    );
}

#[test]
fn parses_documents_without_touching_disk() {
    let raw = parse_str("[[task]]\ntag = \"a\"\nattributes = { mode = \"query\" }\n").unwrap();
    assert_eq!(raw.task.len(), 1);
    assert_eq!(raw.task[0].attributes["mode"], "query");
}
