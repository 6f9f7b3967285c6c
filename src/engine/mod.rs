// src/engine/mod.rs

//! Orchestration engine for the task tree.
//!
//! This module ties together:
//! - the engine state the lifecycle operates on ([`state`])
//! - the synchronous core that applies one [`EngineEvent`] at a time
//!   ([`core`], [`event_handlers`])
//! - the async shell that reads events from a channel and feeds the core
//!   ([`runtime`])
//!
//! Timers re-enter the engine by sending events back into the same channel,
//! so all task-tree mutation happens on one execution context.

/// Events flowing into the runtime from the embedding application and from
/// timers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Start a materialized task and run its first cycle.
    OpenTask { tag: String },
    /// Close a task through the end-task protocol.
    EndTask { tag: String, reversible: bool },
    /// Deliver an internal event to a task's slaves.
    Broadcast {
        tag: String,
        code: crate::event::InternalCode,
    },
    /// A keystroke for incremental locate.
    LocateKey { tag: String, ch: char },
    /// A locate debounce timer fired.
    LocateTimerFired { tag: String },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;
pub mod state;

pub use core::Engine;
pub use event_handlers::EngineStep;
pub use runtime::Runtime;
pub use state::{Collaborators, EngineFlags, EngineSettings, EngineState, HandlerTable};
