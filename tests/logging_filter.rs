// tests/logging_filter.rs

use taskengine::cli::LogLevel;
use taskengine::logging::build_filter;

#[test]
fn cli_level_wins_over_environment() {
    let filter = build_filter(Some(LogLevel::Debug), Some("not a directive=")).unwrap();
    assert_eq!(filter.to_string(), "debug");
}

#[test]
fn environment_accepts_per_module_directives() {
    assert!(build_filter(None, Some("info,taskengine::task::end_task=debug")).is_ok());
}

#[test]
fn invalid_environment_value_is_an_error() {
    let err = build_filter(None, Some("taskengine=loud")).unwrap_err();
    assert!(err.to_string().contains("TASKENGINE_LOG"));
}

#[test]
fn blank_environment_falls_back_to_info() {
    let filter = build_filter(None, Some("  ")).unwrap();
    assert_eq!(filter.to_string(), "info");
}
