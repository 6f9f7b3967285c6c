// src/collab/timer.rs

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::collab::{TimerHandle, TimerScheduler};
use crate::engine::EngineEvent;

/// Scheduler backed by tokio tasks.
///
/// A fired timer re-enters the engine by sending
/// [`EngineEvent::LocateTimerFired`] on the runtime channel, so the callback
/// runs on the same execution context as everything else.
#[derive(Debug)]
pub struct TokioTimers {
    tx: mpsc::Sender<EngineEvent>,
    next_id: u64,
    pending: HashMap<u64, JoinHandle<()>>,
}

impl TokioTimers {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            tx,
            next_id: 0,
            pending: HashMap::new(),
        }
    }
}

impl TimerScheduler for TokioTimers {
    fn schedule(&mut self, task_tag: &str, delay: Duration) -> TimerHandle {
        self.next_id += 1;
        let id = self.next_id;
        let tx = self.tx.clone();
        let tag = task_tag.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(EngineEvent::LocateTimerFired { tag }).await;
        });
        self.pending.insert(id, handle);
        debug!(task = %task_tag, id, ?delay, "scheduled timer");
        TimerHandle(id)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(join) = self.pending.remove(&handle.0) {
            join.abort();
            debug!(id = handle.0, "cancelled timer");
        }
    }
}

/// Scheduler that never fires; the owner drives callbacks explicitly.
#[derive(Debug, Default)]
pub struct InertTimers {
    next_id: u64,
}

impl TimerScheduler for InertTimers {
    fn schedule(&mut self, _task_tag: &str, _delay: Duration) -> TimerHandle {
        self.next_id += 1;
        TimerHandle(self.next_id)
    }

    fn cancel(&mut self, _handle: TimerHandle) {}
}
