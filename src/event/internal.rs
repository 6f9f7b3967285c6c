// src/event/internal.rs

/// Code of an internal (engine-raised) event.
pub type InternalCode = u16;

pub const EXIT: InternalCode = 1;
pub const CLOSE: InternalCode = 2;
pub const TASK_PREFIX: InternalCode = 10;
pub const TASK_SUFFIX: InternalCode = 11;
pub const RECORD_PREFIX: InternalCode = 12;
pub const RECORD_SUFFIX: InternalCode = 13;
pub const CONTROL_PREFIX: InternalCode = 14;
pub const CONTROL_SUFFIX: InternalCode = 15;
pub const LOCATE: InternalCode = 20;
pub const COMMIT: InternalCode = 30;
pub const ROLLBACK: InternalCode = 31;

/// Human-readable name for logging.
pub fn name_of(code: InternalCode) -> &'static str {
    match code {
        EXIT => "exit",
        CLOSE => "close",
        TASK_PREFIX => "task-prefix",
        TASK_SUFFIX => "task-suffix",
        RECORD_PREFIX => "record-prefix",
        RECORD_SUFFIX => "record-suffix",
        CONTROL_PREFIX => "control-prefix",
        CONTROL_SUFFIX => "control-suffix",
        LOCATE => "locate",
        COMMIT => "commit",
        ROLLBACK => "rollback",
        _ => "internal",
    }
}
