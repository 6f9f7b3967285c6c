// src/lib.rs

pub mod actions;
pub mod cache;
pub mod cli;
pub mod collab;
pub mod config;
pub mod engine;
pub mod errors;
pub mod event;
pub mod logging;
pub mod task;
pub mod transaction;
pub mod types;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::collab::TokioTimers;
use crate::config::loader::{load_and_validate, resolve_config_path};
use crate::config::model::ConfigFile;
use crate::engine::{Collaborators, Engine, EngineEvent, Runtime};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the engine core with in-memory and tracing-backed collaborators
/// - the runtime shell and its event channel
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = resolve_config_path(args.config.as_deref());
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let (tx, rx) = mpsc::channel::<EngineEvent>(cfg.engine.event_channel_capacity);

    let collab = Collaborators {
        timers: Box::new(TokioTimers::new(tx.clone())),
        ..Collaborators::default()
    };
    let mut engine = Engine::new(collab)
        .with_settings(cfg.settings())
        .with_capacity_policy(cfg.capacity_policy());

    for element in cfg.task_elements() {
        engine.materialize(&element, None)?;
    }

    // Ctrl-C → graceful shutdown.
    {
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(EngineEvent::ShutdownRequested).await;
        });
    }

    let roots: Vec<String> = cfg.root_tags().into_iter().map(str::to_string).collect();
    info!(?roots, "opening root tasks");
    for tag in &roots {
        tx.send(EngineEvent::OpenTask { tag: tag.clone() }).await?;
    }

    // Closing the application root ends every other root with it.
    if let Some(main) = roots.first() {
        tx.send(EngineEvent::EndTask {
            tag: main.clone(),
            reversible: true,
        })
        .await?;
    }
    drop(tx);

    let runtime = Runtime::new(engine, rx);
    let engine = runtime.run().await?;
    info!(remaining = engine.state().tree.len(), "engine stopped");
    Ok(())
}

/// Simple dry-run output: print engine settings and the task tree.
fn print_dry_run(cfg: &ConfigFile) {
    println!("taskengine dry-run");
    println!("  engine.locate_delay_ms = {}", cfg.engine.locate_delay_ms);
    println!(
        "  engine.event_channel_capacity = {}",
        cfg.engine.event_channel_capacity
    );
    match cfg.cache.max_bytes {
        Some(max) => println!("  cache.max_bytes = {max}"),
        None => println!("  cache.max_bytes = unbounded"),
    }
    println!();

    println!("tasks ({}):", cfg.task.len());
    for root in cfg.root_tags() {
        print_task(cfg, root, 1);
    }

    debug!("dry-run complete (no execution)");
}

fn print_task(cfg: &ConfigFile, tag: &str, depth: usize) {
    let indent = "  ".repeat(depth);
    println!("{indent}- {tag}");
    if let Some(task) = cfg.task.iter().find(|t| t.tag == tag) {
        for (key, value) in &task.attributes {
            println!("{indent}    {key}: {value}");
        }
    }
    for child in cfg.task.iter().filter(|t| t.parent_tag() == Some(tag)) {
        print_task(cfg, &child.tag, depth + 1);
    }
}
