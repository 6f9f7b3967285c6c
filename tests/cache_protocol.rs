// tests/cache_protocol.rs

mod common;
use crate::common::builders::{EngineFixture, alpha, view};
use crate::common::init_tracing;

use taskengine::cache::fingerprint::fingerprint_of;
use taskengine::cache::{CacheKey, MaxBytes};
use taskengine::collab::{ClientCommand, DataLayer};
use taskengine::errors::EngineError;
use taskengine::task::TaskElement;
use taskengine::task::cache_protocol::queue_eviction_report;
use taskengine::types::TaskMode;

fn cached_subform(tag: &str) -> TaskElement {
    TaskElement::new(tag)
        .attr("subform", "Y")
        .attr("cached", "Y")
        .attr("descriptor", "main,0")
}

fn open(tree: TaskElement) -> EngineFixture {
    init_tracing();
    let mut fx = EngineFixture::new();
    let root = fx.engine.materialize(&tree, None).unwrap();
    fx.engine.open_task(root).unwrap();
    fx
}

fn main_with(children: Vec<TaskElement>) -> TaskElement {
    children
        .into_iter()
        .fold(TaskElement::new("main").attr("main", "Y"), TaskElement::child)
}

fn cached_keys(fx: &EngineFixture, tag: &str) -> Vec<CacheKey> {
    fx.engine
        .state()
        .tree
        .node(fx.id(tag))
        .unwrap()
        .cache
        .keys()
        .collect()
}

#[test]
fn prepare_caches_reusable_subform_views() {
    let mut fx = open(main_with(vec![cached_subform("sf")]));
    fx.data.set_view("sf", view(CacheKey(11), 2, 10));
    let main = fx.id("main");

    assert!(fx.engine.prepare_cache(main, false).unwrap());
    assert_eq!(cached_keys(&fx, "sf"), vec![CacheKey(11)]);

    let node = fx.engine.state().tree.node(fx.id("sf")).unwrap();
    assert_eq!(node.cache.total_size(), 20);
    assert_eq!(node.cache.entry(CacheKey(11)).unwrap().mode(), TaskMode::Modify);
}

#[test]
fn view_without_first_record_is_not_cached() {
    let mut fx = open(main_with(vec![cached_subform("sf")]));
    let mut partial = view(CacheKey(11), 2, 10);
    partial.includes_first = false;
    fx.data.set_view("sf", partial);
    let main = fx.id("main");

    assert!(fx.engine.prepare_cache(main, false).unwrap());
    assert!(cached_keys(&fx, "sf").is_empty());
}

#[test]
fn changed_view_is_evicted_and_forces_a_fetch() {
    let mut fx = open(main_with(vec![cached_subform("sf")]));
    fx.data.set_view("sf", view(CacheKey(11), 2, 10));
    let main = fx.id("main");
    fx.engine.prepare_cache(main, false).unwrap();

    fx.data.mark_changed("sf", true);
    assert!(!fx.engine.prepare_cache(main, false).unwrap());

    assert!(cached_keys(&fx, "sf").is_empty());
    assert_eq!(fx.engine.deleted_list_to_wire(fx.id("sf")).unwrap(), "11");
}

#[test]
fn uncached_subform_forces_fetch_but_siblings_are_still_visited() {
    let mut fx = open(main_with(vec![
        TaskElement::new("plain").attr("subform", "Y"),
        cached_subform("sf"),
    ]));
    let sf = fx.id("sf");
    fx.engine
        .state_mut()
        .tree
        .node_mut(sf)
        .unwrap()
        .cache
        .put_in_cache(view(CacheKey(11), 1, 1), TaskMode::Modify);
    fx.data.set_view("sf", view(CacheKey(11), 1, 1));
    fx.data.mark_changed("sf", true);
    let main = fx.id("main");

    assert!(!fx.engine.prepare_cache(main, false).unwrap());
    assert!(cached_keys(&fx, "sf").is_empty());
    assert_eq!(fx.engine.deleted_list_to_wire(sf).unwrap(), "11");
}

#[test]
fn ignore_current_skips_the_task_itself() {
    let mut fx = open(main_with(vec![cached_subform("sf")]));
    fx.data.set_view("sf", view(CacheKey(11), 1, 1));
    let sf = fx.id("sf");

    assert!(fx.engine.prepare_cache(sf, true).unwrap());
    assert!(cached_keys(&fx, "sf").is_empty());
}

#[test]
fn test_and_set_swaps_in_cached_view_on_hit() {
    let mut fx = open(main_with(vec![cached_subform("sf")]));
    fx.data.set_field("main", 0, alpha("7"));
    let wanted = fingerprint_of(&[Some(alpha("7"))]);
    let cached = view(wanted, 3, 5);
    let sf = fx.id("sf");
    fx.engine
        .state_mut()
        .tree
        .node_mut(sf)
        .unwrap()
        .cache
        .put_in_cache(cached.clone(), TaskMode::Modify);
    fx.data.set_view("sf", view(CacheKey(wanted.0.wrapping_add(1)), 1, 5));
    let main = fx.id("main");

    assert!(fx.engine.test_and_set(main, false).unwrap());

    assert_eq!(fx.data.view("sf"), Some(cached));
    assert!(fx.engine.state().tree.node(sf).unwrap().needs_record_cycle);
    // The cache keeps its own copy.
    assert_eq!(cached_keys(&fx, "sf"), vec![wanted]);
}

#[test]
fn test_and_set_reports_miss() {
    let mut fx = open(main_with(vec![cached_subform("sf")]));
    fx.data.set_field("main", 0, alpha("7"));
    let wanted = fingerprint_of(&[Some(alpha("7"))]);
    fx.data.set_view("sf", view(CacheKey(wanted.0.wrapping_add(1)), 1, 5));
    let main = fx.id("main");

    assert!(!fx.engine.test_and_set(main, false).unwrap());
}

#[test]
fn test_and_set_is_a_no_op_when_already_positioned() {
    let mut fx = open(main_with(vec![cached_subform("sf")]));
    fx.data.set_field("main", 0, alpha("7"));
    let wanted = fingerprint_of(&[Some(alpha("7"))]);
    let live = view(wanted, 1, 5);
    fx.data.set_view("sf", live.clone());
    let main = fx.id("main");

    assert!(fx.engine.test_and_set(main, false).unwrap());
    assert_eq!(fx.data.view("sf"), Some(live));
    assert!(!fx.engine.state().tree.node(fx.id("sf")).unwrap().needs_record_cycle);
}

#[test]
fn test_and_set_stops_at_first_miss() {
    let mut fx = open(main_with(vec![cached_subform("sf1"), cached_subform("sf2")]));
    fx.data.set_field("main", 0, alpha("7"));
    let wanted = fingerprint_of(&[Some(alpha("7"))]);
    let stale = CacheKey(wanted.0.wrapping_add(1));
    fx.data.set_view("sf1", view(stale, 1, 5));
    fx.data.set_view("sf2", view(stale, 1, 5));
    let sf2 = fx.id("sf2");
    fx.engine
        .state_mut()
        .tree
        .node_mut(sf2)
        .unwrap()
        .cache
        .put_in_cache(view(wanted, 2, 5), TaskMode::Modify);
    let main = fx.id("main");

    assert!(!fx.engine.test_and_set(main, false).unwrap());
    assert_eq!(fx.data.view("sf2").unwrap().position, Some(stale));
    assert!(!fx.engine.state().tree.node(sf2).unwrap().needs_record_cycle);
}

#[test]
fn descriptor_owner_must_exist() {
    let mut fx = open(main_with(vec![
        TaskElement::new("sf")
            .attr("subform", "Y")
            .attr("cached", "Y")
            .attr("descriptor", "ghost,0"),
    ]));
    let sf = fx.id("sf");

    let err = fx.engine.descriptor_fingerprint(sf).unwrap_err();
    assert!(matches!(err, EngineError::TaskNotFound(tag) if tag == "ghost"));
    let main = fx.id("main");
    assert!(fx.engine.test_and_set(main, false).is_err());
}

#[test]
fn clear_cache_evicts_nested_subforms_and_marks_view_changed() {
    let mut fx = open(main_with(vec![
        cached_subform("sf").child(cached_subform("inner")),
    ]));
    let sf = fx.id("sf");
    let inner = fx.id("inner");
    for (id, key) in [(sf, 1), (inner, 2)] {
        fx.engine
            .state_mut()
            .tree
            .node_mut(id)
            .unwrap()
            .cache
            .put_in_cache(view(CacheKey(key), 1, 1), TaskMode::Modify);
    }

    let evicted = fx.engine.clear_cache(sf).unwrap();

    assert_eq!(evicted, vec![CacheKey(1), CacheKey(2)]);
    assert!(cached_keys(&fx, "sf").is_empty());
    assert!(cached_keys(&fx, "inner").is_empty());
    assert!(fx.data.is_changed("sf"));
    assert!(fx.data.is_changed("inner"));
}

#[test]
fn locate_mode_keeps_entry_only_while_first_record_matches() {
    let mut fx = open(main_with(vec![cached_subform("sf")]));
    let sf = fx.id("sf");
    fx.engine.state_mut().tree.node_mut(sf).unwrap().locate.active_query = Some("ab".into());
    let main = fx.id("main");

    let mut live = view(CacheKey(11), 2, 10);
    live.first_record_marker = Some(1);
    fx.data.set_view("sf", live.clone());
    assert!(fx.engine.prepare_cache(main, false).unwrap());
    assert_eq!(cached_keys(&fx, "sf"), vec![CacheKey(11)]);

    // Same first record: the entry survives.
    assert!(fx.engine.prepare_cache(main, false).unwrap());
    assert_eq!(cached_keys(&fx, "sf"), vec![CacheKey(11)]);

    live.first_record_marker = Some(2);
    fx.data.set_view("sf", live);
    assert!(fx.engine.prepare_cache(main, false).unwrap());
    assert!(cached_keys(&fx, "sf").is_empty());
    assert_eq!(fx.engine.deleted_list_to_wire(sf).unwrap(), "11");
}

#[test]
fn capacity_policy_evicts_oldest_after_insert() {
    let mut fx = open(main_with(vec![cached_subform("sf")]));
    fx.engine.state_mut().capacity = Box::new(MaxBytes(25));
    let main = fx.id("main");

    fx.data.set_view("sf", view(CacheKey(1), 2, 10));
    fx.engine.prepare_cache(main, false).unwrap();
    fx.data.set_view("sf", view(CacheKey(2), 2, 10));
    fx.engine.prepare_cache(main, false).unwrap();

    assert_eq!(cached_keys(&fx, "sf"), vec![CacheKey(2)]);
    assert_eq!(fx.engine.deleted_list_to_wire(fx.id("sf")).unwrap(), "1");
}

#[test]
fn eviction_report_is_queued_and_cleared_after_ack() {
    let mut fx = open(main_with(vec![cached_subform("sf")]));
    let sf = fx.id("sf");
    assert!(!queue_eviction_report(fx.engine.state_mut(), sf).unwrap());

    for key in [3, -4] {
        fx.engine
            .state_mut()
            .tree
            .node_mut(sf)
            .unwrap()
            .cache
            .put_in_cache(view(CacheKey(key), 1, 1), TaskMode::Modify);
    }
    fx.engine.clear_cache(sf).unwrap();

    assert!(queue_eviction_report(fx.engine.state_mut(), sf).unwrap());
    assert_eq!(fx.engine.flush_commands().unwrap(), 1);
    assert_eq!(
        fx.transport.sent(),
        vec![ClientCommand::CacheEvictions {
            tag: "sf".into(),
            keys: "-4,3".into()
        }]
    );

    fx.engine.clear_deleted_list(sf).unwrap();
    assert_eq!(fx.engine.deleted_list_to_wire(sf).unwrap(), "");
}
