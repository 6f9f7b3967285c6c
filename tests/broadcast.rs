// tests/broadcast.rs

mod common;
use crate::common::builders::EngineFixture;
use crate::common::fakes::Reaction;
use crate::common::init_tracing;

use taskengine::collab::DataViewOp;
use taskengine::engine::EngineEvent;
use taskengine::event::internal;
use taskengine::task::TaskElement;
use taskengine::task::broadcast::slave_tasks;

fn open(tree: TaskElement) -> EngineFixture {
    init_tracing();
    let mut fx = EngineFixture::new();
    let root = fx.engine.materialize(&tree, None).unwrap();
    fx.engine.open_task(root).unwrap();
    fx
}

fn owner() -> TaskElement {
    TaskElement::new("m")
        .attr("main", "Y")
        .attr("transaction", "T1")
        .attr("trans_owner", "Y")
}

fn sharer(tag: &str) -> TaskElement {
    TaskElement::new(tag).attr("transaction", "T1")
}

fn tags(fx: &EngineFixture, ids: Vec<taskengine::task::TaskId>) -> Vec<String> {
    ids.into_iter()
        .map(|id| fx.engine.state().tree.tag_of(id).unwrap().to_string())
        .collect()
}

#[test]
fn broadcast_stops_at_first_slave_that_stops() {
    let mut fx = open(
        owner()
            .child(sharer("A"))
            .child(sharer("B"))
            .child(sharer("C")),
    );
    fx.dispatcher.on("B", internal::COMMIT, Reaction::Stop);
    let m = fx.id("m");

    let failed = fx
        .engine
        .handle_event_on_slave_tasks(m, internal::COMMIT)
        .unwrap();

    assert_eq!(failed, Some(fx.id("B")));
    assert_eq!(fx.dispatcher.tags_receiving(internal::COMMIT), vec!["A", "B"]);
}

#[test]
fn handler_raising_the_stop_flag_aborts_the_broadcast() {
    let mut fx = open(
        owner()
            .child(sharer("A"))
            .child(sharer("B"))
            .child(sharer("C")),
    );
    fx.dispatcher.on("B", internal::COMMIT, Reaction::RaiseStopFlag);
    let m = fx.id("m");

    let failed = fx
        .engine
        .handle_event_on_slave_tasks(m, internal::COMMIT)
        .unwrap();

    assert_eq!(failed, Some(fx.id("B")));
    assert_eq!(fx.dispatcher.tags_receiving(internal::COMMIT), vec!["A", "B"]);
}

#[test]
fn stop_flag_does_not_leak_into_the_next_broadcast() {
    let mut fx = open(owner().child(sharer("A")).child(sharer("B")));
    fx.dispatcher.on("A", internal::COMMIT, Reaction::Stop);
    let m = fx.id("m");

    let first = fx
        .engine
        .handle_event_on_slave_tasks(m, internal::COMMIT)
        .unwrap();
    assert_eq!(first, Some(fx.id("A")));
    assert!(fx.engine.state().flags.stop_execution);

    let second = fx
        .engine
        .handle_event_on_slave_tasks(m, internal::ROLLBACK)
        .unwrap();
    assert_eq!(second, None);
    assert!(!fx.engine.state().flags.stop_execution);
    assert_eq!(fx.dispatcher.tags_receiving(internal::ROLLBACK), vec!["A", "B"]);
}

#[test]
fn full_broadcast_reaches_every_sharer() {
    let mut fx = open(owner().child(sharer("A")).child(sharer("B")));
    let m = fx.id("m");

    assert_eq!(
        fx.engine
            .handle_event_on_slave_tasks(m, internal::ROLLBACK)
            .unwrap(),
        None
    );
    assert_eq!(fx.dispatcher.tags_receiving(internal::ROLLBACK), vec!["A", "B"]);
}

#[test]
fn non_owner_broadcasts_to_its_subform_children() {
    let fx = open(
        TaskElement::new("m")
            .attr("main", "Y")
            .child(TaskElement::new("sf1").attr("subform", "Y"))
            .child(TaskElement::new("x"))
            .child(TaskElement::new("sf2").attr("subform", "Y")),
    );

    let slaves = slave_tasks(fx.engine.state(), fx.id("m")).unwrap();
    assert_eq!(tags(&fx, slaves), vec!["sf1", "sf2"]);
}

#[test]
fn owner_skips_subform_sharers_but_appends_orphans() {
    let fx = open(
        owner()
            .child(
                sharer("sf")
                    .attr("subform", "Y")
                    .attr("prev_parent", "gone"),
            )
            .child(sharer("inner").attr("subform", "Y"))
            .child(sharer("x"))
            .child(sharer("y").attr("prev_parent", "gone"))
            .child(sharer("z").attr("prev_parent", "m")),
    );

    let slaves = slave_tasks(fx.engine.state(), fx.id("m")).unwrap();
    assert_eq!(tags(&fx, slaves), vec!["x", "y", "z", "sf"]);
}

#[test]
fn slaves_that_are_not_started_are_skipped() {
    let mut fx = open(owner().child(sharer("A")));
    let m = fx.id("m");
    // Added after the open, so never started.
    fx.engine.materialize(&sharer("B"), Some(m)).unwrap();
    assert_eq!(tags(&fx, slave_tasks(fx.engine.state(), m).unwrap()), vec!["A", "B"]);

    fx.engine
        .handle_event_on_slave_tasks(m, internal::COMMIT)
        .unwrap();
    assert_eq!(fx.dispatcher.tags_receiving(internal::COMMIT), vec!["A"]);
}

#[test]
fn refreshed_slave_recomputes_before_record_prefix() {
    let mut fx = open(
        TaskElement::new("m")
            .attr("main", "Y")
            .child(TaskElement::new("sf1").attr("subform", "Y"))
            .child(TaskElement::new("sf2").attr("subform", "Y")),
    );
    let sf1 = fx.id("sf1");
    fx.engine.state_mut().tree.node_mut(sf1).unwrap().form_refreshed = true;

    let m = fx.id("m");
    fx.engine
        .handle_event_on_slave_tasks(m, internal::RECORD_PREFIX)
        .unwrap();

    assert_eq!(
        fx.data.ops_for("sf1").last(),
        Some(&DataViewOp::RecomputeCurrentRecord)
    );
    assert!(
        !fx.data
            .ops_for("sf2")
            .contains(&DataViewOp::RecomputeCurrentRecord)
    );
    // Once during open, once from the broadcast.
    assert_eq!(
        fx.dispatcher
            .tags_receiving(internal::RECORD_PREFIX)
            .iter()
            .filter(|t| *t == "sf1")
            .count(),
        2
    );
}

#[test]
fn broadcast_event_keeps_runtime_going() {
    let mut fx = open(owner().child(sharer("A")));

    let step = fx
        .engine
        .step(EngineEvent::Broadcast {
            tag: "m".into(),
            code: internal::COMMIT,
        })
        .unwrap();

    assert!(step.keep_running);
    assert_eq!(fx.dispatcher.tags_receiving(internal::COMMIT), vec!["A"]);
}
