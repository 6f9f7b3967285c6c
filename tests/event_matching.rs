// tests/event_matching.rs

mod common;
use crate::common::builders::EngineFixture;

use taskengine::errors::EngineError;
use taskengine::event::{EventDescriptor, ExpressionRef, Modifier, internal};
use taskengine::task::TaskElement;

fn attrs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Task `t1` with user events `[Alpha, <none>, Beta]` and Enter mapped to OK.
fn fixture() -> EngineFixture {
    let mut fx = EngineFixture::new();
    let element = TaskElement::new("t1")
        .attr("user_events", "Alpha,,Beta")
        .attr("keymap", "13:N=50;115:A=2");
    let id = fx.engine.materialize(&element, None).unwrap();
    fx.engine.state_mut().active_task = Some(id);
    fx
}

#[test]
fn same_kind_variants_compare_structurally() {
    let fx = fixture();
    let ctx = fx.engine.state();

    let a = EventDescriptor::internal(internal::EXIT);
    assert!(a.matches(&EventDescriptor::internal(internal::EXIT), ctx).unwrap());
    assert!(!a.matches(&EventDescriptor::internal(internal::CLOSE), ctx).unwrap());

    let t = EventDescriptor::Timer { seconds: 5 };
    assert!(t.matches(&EventDescriptor::Timer { seconds: 5 }, ctx).unwrap());
    assert!(!t.matches(&EventDescriptor::Timer { seconds: 6 }, ctx).unwrap());

    let e = EventDescriptor::Expression {
        expr: ExpressionRef(3),
    };
    assert!(e.matches(&EventDescriptor::Expression { expr: ExpressionRef(3) }, ctx).unwrap());
    assert!(!e.matches(&t, ctx).unwrap());
}

#[test]
fn identical_reference_matches_without_resolution() {
    let fx = fixture();
    let dangling = EventDescriptor::user("nobody", 9);
    assert!(dangling.matches(&dangling, fx.engine.state()).unwrap());
}

#[test]
fn user_function_names_compare_case_insensitively() {
    let fx = fixture();
    let ctx = fx.engine.state();
    let f = EventDescriptor::user_function("DoSomething");
    assert!(f.matches(&EventDescriptor::user_function("dosomething"), ctx).unwrap());
    assert!(!f.matches(&EventDescriptor::user_function("DoOther"), ctx).unwrap());
}

#[test]
fn user_events_compare_by_resolved_target() {
    let fx = fixture();
    let ctx = fx.engine.state();
    let first = EventDescriptor::user("t1", 0);
    assert!(first.matches(&EventDescriptor::user("t1", 0), ctx).unwrap());
    assert!(!first.matches(&EventDescriptor::user("t1", 2), ctx).unwrap());
}

#[test]
fn unresolvable_user_event_is_an_error() {
    let fx = fixture();
    let ctx = fx.engine.state();
    let bad = EventDescriptor::user("t1", 7);
    let result = bad.matches(&EventDescriptor::user("t1", 0), ctx);
    match result {
        Err(EngineError::UnresolvedUserEvent { task, index }) => {
            assert_eq!(task, "t1");
            assert_eq!(index, 7);
        }
        other => panic!("Expected UnresolvedUserEvent, got: {other:?}"),
    }
}

#[test]
fn public_event_matches_user_event_with_same_public_name() {
    let fx = fixture();
    let ctx = fx.engine.state();
    let public = EventDescriptor::Public {
        name: "Alpha".to_string(),
        expr: None,
    };
    assert!(public.matches(&EventDescriptor::user("t1", 0), ctx).unwrap());
    assert!(EventDescriptor::user("t1", 0).matches(&public, ctx).unwrap());
    // Slot 1 has no public name.
    assert!(!public.matches(&EventDescriptor::user("t1", 1), ctx).unwrap());
    assert!(!public.matches(&EventDescriptor::user("t1", 2), ctx).unwrap());
}

#[test]
fn public_events_compare_by_bound_expression_then_name() {
    let fx = fixture();
    let ctx = fx.engine.state();
    let bound = |name: &str, id| EventDescriptor::Public {
        name: name.to_string(),
        expr: Some(ExpressionRef(id)),
    };
    let unbound = |name: &str| EventDescriptor::Public {
        name: name.to_string(),
        expr: None,
    };

    assert!(bound("x", 1).matches(&bound("y", 1), ctx).unwrap());
    assert!(!bound("x", 1).matches(&bound("x", 2), ctx).unwrap());
    assert!(unbound("x").matches(&unbound("x"), ctx).unwrap());
    assert!(!unbound("x").matches(&bound("x", 1), ctx).unwrap());
}

#[test]
fn system_key_matches_internal_code_through_active_keymap() {
    let mut fx = fixture();
    let enter = EventDescriptor::System {
        key_code: 13,
        modifier: Modifier::NONE,
    };
    let ok = EventDescriptor::internal(50);

    assert!(enter.matches(&ok, fx.engine.state()).unwrap());
    assert!(ok.matches(&enter, fx.engine.state()).unwrap());
    assert!(!enter.matches(&EventDescriptor::internal(51), fx.engine.state()).unwrap());

    let alt_f4 = EventDescriptor::System {
        key_code: 115,
        modifier: Modifier::ALT,
    };
    assert!(alt_f4.matches(&EventDescriptor::internal(internal::CLOSE), fx.engine.state()).unwrap());

    fx.engine.state_mut().active_task = None;
    assert!(!enter.matches(&ok, fx.engine.state()).unwrap());
}

#[test]
fn fill_classifies_events_from_attributes() {
    let system = EventDescriptor::fill(&attrs(&[("type", "S"), ("keycode", "13"), ("modifier", "C")]), None)
        .unwrap();
    assert!(matches!(
        system,
        EventDescriptor::System { key_code: 13, modifier } if modifier == Modifier::CTRL
    ));

    let user = EventDescriptor::fill(
        &attrs(&[("type", "U"), ("user_tsk", "ignored"), ("user_idx", "2")]),
        Some("owner"),
    )
    .unwrap();
    match user {
        EventDescriptor::User { target } => {
            assert_eq!(target.owner_task_tag, "owner");
            assert_eq!(target.index, 2);
            assert!(target.resolved().is_none(), "resolution is lazy");
        }
        other => panic!("Expected a user event, got: {other:?}"),
    }

    let func = EventDescriptor::fill(&attrs(&[("type", "F"), ("name", "Recalc")]), None).unwrap();
    assert!(matches!(func, EventDescriptor::UserFunction { ref name, .. } if name == "Recalc"));
}

#[test]
fn fill_rejects_missing_or_unknown_type() {
    let missing = EventDescriptor::fill(&attrs(&[("internal", "1")]), None);
    assert!(matches!(missing, Err(EngineError::InvalidAttribute { ref key, .. }) if key == "type"));

    let unknown = EventDescriptor::fill(&attrs(&[("type", "X")]), None);
    assert!(matches!(unknown, Err(EngineError::InvalidAttribute { .. })));

    let bad_number = EventDescriptor::fill(&attrs(&[("type", "T"), ("seconds", "soon")]), None);
    assert!(matches!(bad_number, Err(EngineError::InvalidAttribute { ref key, .. }) if key == "seconds"));
}
