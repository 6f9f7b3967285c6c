// tests/locate.rs

mod common;
use crate::common::builders::EngineFixture;
use crate::common::fakes::Reaction;
use crate::common::{init_tracing, small_tree};

use std::time::Duration;

use taskengine::collab::DataViewOp;
use taskengine::engine::EngineEvent;
use taskengine::event::internal;
use taskengine::task::locate::clear_locate_query;

fn opened() -> EngineFixture {
    init_tracing();
    let mut fx = EngineFixture::new();
    let main = fx.engine.materialize(&small_tree(), None).unwrap();
    fx.engine.open_task(main).unwrap();
    fx
}

#[test]
fn each_keystroke_rearms_the_debounce_timer() {
    let mut fx = opened();
    fx.engine.state_mut().settings.locate_delay = Duration::from_millis(50);
    let a = fx.id("a");

    fx.engine.locate_key(a, 'a').unwrap();
    fx.engine.locate_key(a, 'b').unwrap();

    let scheduled = fx.timers.scheduled();
    assert_eq!(scheduled.len(), 2);
    assert!(
        scheduled
            .iter()
            .all(|(_, tag, delay)| tag == "a" && *delay == Duration::from_millis(50))
    );
    assert_eq!(fx.timers.cancelled(), vec![scheduled[0].0]);
    assert_eq!(fx.timers.active(), vec![scheduled[1].0]);

    let locate = &fx.engine.state().tree.node(a).unwrap().locate;
    assert_eq!(locate.buffer, "ab");
    assert!(!locate.is_active());
}

#[test]
fn timer_applies_buffer_as_query_and_delivers_locate() {
    let mut fx = opened();
    let a = fx.id("a");
    fx.engine.locate_key(a, 'x').unwrap();
    fx.engine.locate_key(a, 'y').unwrap();

    assert!(fx.engine.on_locate_timer(a).unwrap());

    assert_eq!(
        fx.data.ops_for("a").last(),
        Some(&DataViewOp::Locate("xy".into()))
    );
    assert_eq!(fx.dispatcher.tags_receiving(internal::LOCATE), vec!["a"]);
    let locate = &fx.engine.state().tree.node(a).unwrap().locate;
    assert_eq!(locate.active_query.as_deref(), Some("xy"));
    assert!(locate.buffer.is_empty());
    assert!(locate.timer.is_none());
}

#[test]
fn stopped_locate_handler_is_reported() {
    let mut fx = opened();
    fx.dispatcher.on("a", internal::LOCATE, Reaction::Stop);
    let a = fx.id("a");
    fx.engine.locate_key(a, 'x').unwrap();

    assert!(!fx.engine.on_locate_timer(a).unwrap());
}

#[test]
fn stale_timer_without_pending_keystrokes_does_nothing() {
    let mut fx = opened();
    let a = fx.id("a");
    let ops_before = fx.data.ops_for("a").len();

    assert!(fx.engine.on_locate_timer(a).unwrap());
    assert_eq!(fx.data.ops_for("a").len(), ops_before);
    assert!(fx.dispatcher.tags_receiving(internal::LOCATE).is_empty());
}

#[test]
fn failed_reposition_skips_locate_event() {
    let mut fx = opened();
    fx.data.fail_on("a", &DataViewOp::Locate(String::new()));
    let a = fx.id("a");
    fx.engine.locate_key(a, 'x').unwrap();

    assert!(fx.engine.on_locate_timer(a).unwrap());
    assert!(fx.dispatcher.tags_receiving(internal::LOCATE).is_empty());
}

#[test]
fn free_timer_cancels_and_drops_keystrokes() {
    let mut fx = opened();
    let a = fx.id("a");
    fx.engine.locate_key(a, 'x').unwrap();

    fx.engine.free_timer(a).unwrap();

    assert!(fx.timers.active().is_empty());
    let locate = &fx.engine.state().tree.node(a).unwrap().locate;
    assert!(locate.buffer.is_empty());
    assert!(locate.timer.is_none());
}

#[test]
fn clearing_the_query_leaves_locate_mode() {
    let mut fx = opened();
    let a = fx.id("a");
    fx.engine.locate_key(a, 'x').unwrap();
    fx.engine.on_locate_timer(a).unwrap();

    clear_locate_query(fx.engine.state_mut(), a).unwrap();
    assert!(!fx.engine.state().tree.node(a).unwrap().locate.is_active());
}

#[test]
fn keystrokes_on_aborting_task_are_ignored() {
    let mut fx = opened();
    let a = fx.id("a");
    fx.engine.state_mut().tree.node_mut(a).unwrap().aborting = true;

    fx.engine.locate_key(a, 'x').unwrap();
    assert!(fx.timers.scheduled().is_empty());
}

#[test]
fn timer_for_a_discarded_task_is_ignored() {
    let mut fx = opened();

    let step = fx
        .engine
        .step(EngineEvent::LocateTimerFired {
            tag: "ghost".into(),
        })
        .unwrap();
    assert!(step.keep_running);

    let step = fx
        .engine
        .step(EngineEvent::LocateKey {
            tag: "b".into(),
            ch: 'q',
        })
        .unwrap();
    assert!(step.keep_running);
    assert_eq!(fx.timers.scheduled().len(), 1);
}
