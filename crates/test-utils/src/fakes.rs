//! Recording collaborators for driving the engine in tests.
//!
//! Every fake is `Clone` and shares its log: hand one clone to the engine and
//! keep the other to assert on.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskengine::actions::ActionCode;
use taskengine::collab::{
    ClientCommand, Delivery, EventDispatcher, Presentation, TimerHandle, TimerScheduler,
    Transport,
};
use taskengine::engine::EngineState;
use taskengine::errors::{EngineError, Result};
use taskengine::event::{EventDescriptor, InternalCode};
use taskengine::task::end_task::end_task;
use taskengine::task::lifecycle::start;
use taskengine::task::materialize::materialize;
use taskengine::task::{TaskElement, TaskId};
use taskengine::types::RefreshScope;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCall {
    EnableAction { tag: String, code: ActionCode, on: bool },
    Refresh { tag: String, scope: RefreshScope },
    InitForm { tag: String },
    SaveUiState { tag: String },
    Detach { tag: String },
    ShowError { tag: String, message: String },
}

#[derive(Debug, Clone, Default)]
pub struct RecordingPresentation {
    calls: Arc<Mutex<Vec<UiCall>>>,
}

impl RecordingPresentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<UiCall> {
        self.calls.lock().unwrap().clone()
    }

    /// `(code, on)` pairs forwarded for `tag`, in order.
    pub fn enable_calls_for(&self, tag: &str) -> Vec<(ActionCode, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                UiCall::EnableAction { tag: t, code, on } if t == tag => Some((code, on)),
                _ => None,
            })
            .collect()
    }

    pub fn errors_for(&self, tag: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                UiCall::ShowError { tag: t, message } if t == tag => Some(message),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: UiCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Presentation for RecordingPresentation {
    fn enable_action(&mut self, task_tag: &str, code: ActionCode, on: bool) {
        self.push(UiCall::EnableAction {
            tag: task_tag.to_string(),
            code,
            on,
        });
    }

    fn refresh_display(&mut self, task_tag: &str, scope: RefreshScope) {
        self.push(UiCall::Refresh {
            tag: task_tag.to_string(),
            scope,
        });
    }

    fn init_form(&mut self, task_tag: &str) -> Result<()> {
        self.push(UiCall::InitForm {
            tag: task_tag.to_string(),
        });
        Ok(())
    }

    fn save_ui_state(&mut self, task_tag: &str) {
        self.push(UiCall::SaveUiState {
            tag: task_tag.to_string(),
        });
    }

    fn detach_task(&mut self, task_tag: &str) {
        self.push(UiCall::Detach {
            tag: task_tag.to_string(),
        });
    }

    fn show_error(&mut self, task_tag: &str, message: &str) {
        self.push(UiCall::ShowError {
            tag: task_tag.to_string(),
            message: message.to_string(),
        });
    }
}

/// Transport that records every command and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<ClientCommand>>>,
    failing: Arc<Mutex<bool>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<ClientCommand> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_sends(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, commands: Vec<ClientCommand>) -> Result<()> {
        if *self.failing.lock().unwrap() {
            return Err(EngineError::Transport("injected send failure".to_string()));
        }
        self.sent.lock().unwrap().extend(commands);
        Ok(())
    }
}

/// Scheduler that never fires on its own; tests fire timers explicitly.
#[derive(Debug, Clone, Default)]
pub struct ManualTimers {
    inner: Arc<Mutex<TimerLog>>,
}

#[derive(Debug, Default)]
struct TimerLog {
    next_id: u64,
    scheduled: Vec<(TimerHandle, String, Duration)>,
    cancelled: Vec<TimerHandle>,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled(&self) -> Vec<(TimerHandle, String, Duration)> {
        self.inner.lock().unwrap().scheduled.clone()
    }

    pub fn cancelled(&self) -> Vec<TimerHandle> {
        self.inner.lock().unwrap().cancelled.clone()
    }

    /// Scheduled and not cancelled.
    pub fn active(&self) -> Vec<TimerHandle> {
        let log = self.inner.lock().unwrap();
        log.scheduled
            .iter()
            .map(|(h, _, _)| *h)
            .filter(|h| !log.cancelled.contains(h))
            .collect()
    }
}

impl TimerScheduler for ManualTimers {
    fn schedule(&mut self, task_tag: &str, delay: Duration) -> TimerHandle {
        let mut log = self.inner.lock().unwrap();
        log.next_id += 1;
        let handle = TimerHandle(log.next_id);
        log.scheduled.push((handle, task_tag.to_string(), delay));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.inner.lock().unwrap().cancelled.push(handle);
    }
}

/// What a scripted handler does when its event arrives.
#[derive(Debug, Clone)]
pub enum Reaction {
    /// Answer the delivery with `Delivery::StopExecution`.
    Stop,
    /// Raise `flags.stop_execution` on the engine state and return normally.
    RaiseStopFlag,
    /// Return an error from the delivery.
    Fail,
    /// Re-enter `end_task` on the task with this tag (non-reversible).
    EndTask { tag: String },
    /// Materialize and start a child under the receiving task.
    OpenChild(TaskElement),
    /// Overwrite the dispatcher-owned topmost-end-task flag.
    SetTopmostFlag(bool),
}

#[derive(Debug, Default)]
struct Script {
    rules: Vec<(String, InternalCode, Reaction)>,
    delivered: Vec<(String, EventDescriptor)>,
    nested_end_results: Vec<bool>,
}

/// Dispatcher driven by `(tag, internal code) -> reaction` rules.
///
/// Every delivery is recorded. Deliveries without a matching rule continue.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDispatcher {
    script: Arc<Mutex<Script>>,
}

impl ScriptedDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, tag: &str, code: InternalCode, reaction: Reaction) -> &Self {
        self.script
            .lock()
            .unwrap()
            .rules
            .push((tag.to_string(), code, reaction));
        self
    }

    pub fn delivered(&self) -> Vec<(String, EventDescriptor)> {
        self.script.lock().unwrap().delivered.clone()
    }

    /// Tags that received `code`, in delivery order.
    pub fn tags_receiving(&self, code: InternalCode) -> Vec<String> {
        self.delivered()
            .into_iter()
            .filter(|(_, e)| e.internal_code() == Some(code))
            .map(|(t, _)| t)
            .collect()
    }

    /// Results of `end_task` calls made from inside handlers.
    pub fn nested_end_results(&self) -> Vec<bool> {
        self.script.lock().unwrap().nested_end_results.clone()
    }
}

impl EventDispatcher for ScriptedDispatcher {
    fn deliver(
        &mut self,
        state: &mut EngineState,
        task: TaskId,
        event: &EventDescriptor,
    ) -> Result<Delivery> {
        let tag = state.tree.tag_of(task).unwrap_or("?").to_string();
        let reactions: Vec<Reaction> = {
            let mut script = self.script.lock().unwrap();
            script.delivered.push((tag.clone(), event.clone()));
            script
                .rules
                .iter()
                .filter(|(t, c, _)| *t == tag && event.internal_code() == Some(*c))
                .map(|(_, _, r)| r.clone())
                .collect()
        };

        let mut outcome = Delivery::Continue;
        for reaction in reactions {
            match reaction {
                Reaction::Stop => outcome = Delivery::StopExecution,
                Reaction::RaiseStopFlag => state.flags.stop_execution = true,
                Reaction::Fail => {
                    return Err(EngineError::DataLayer(format!(
                        "injected handler failure in {tag}"
                    )));
                }
                Reaction::EndTask { tag: target } => {
                    let id = state.tree.id_of(&target)?;
                    let ended = end_task(state, self, id, false, false, false, false)?;
                    self.script.lock().unwrap().nested_end_results.push(ended);
                }
                Reaction::OpenChild(element) => {
                    let child = materialize(state, &element, Some(task))?;
                    start(state, self, child, false, false)?;
                }
                Reaction::SetTopmostFlag(value) => {
                    state.flags.processing_topmost_end_task = value;
                }
            }
        }
        Ok(outcome)
    }
}
