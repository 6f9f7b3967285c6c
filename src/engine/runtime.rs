// src/engine/runtime.rs

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::errors::Result;

use super::EngineEvent;
use super::core::Engine;

/// Drives the engine in response to `EngineEvent`s.
///
/// This is a pure IO shell around [`Engine`], which contains all the
/// lifecycle semantics. A failing event terminates that operation only: the
/// error is logged and the loop keeps reading.
#[derive(Debug)]
pub struct Runtime {
    engine: Engine,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl Runtime {
    pub fn new(engine: Engine, event_rx: mpsc::Receiver<EngineEvent>) -> Self {
        Self { engine, event_rx }
    }

    /// Main event loop.
    ///
    /// - Consumes `EngineEvent`s from `event_rx`.
    /// - Feeds them into the engine core.
    /// - Flushes commands the core queued for the server.
    ///
    /// Returns the engine once the core asks to stop or the channel closes.
    pub async fn run(mut self) -> Result<Engine> {
        info!("taskengine runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let keep_running = match self.engine.step(event) {
                Ok(step) => step.keep_running,
                Err(e) => {
                    error!(error = %e, "engine event failed");
                    true
                }
            };

            if let Err(e) = self.engine.flush_commands() {
                warn!(error = %e, "sending queued commands failed; keeping them queued");
            }

            if !keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        info!("runtime exiting");
        Ok(self.engine)
    }
}
