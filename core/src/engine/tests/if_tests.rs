//! Tests for if/endif blocks and skipping

use super::helpers::{build_engine, endif, if_, is_waiting_on, lit, start, var};
use crate::engine::{RenderError, SkipState, Status, Val};
use maplit::hashmap;

fn started_with(value: Val) -> Vec<String> {
    let (mut engine, output) = build_engine(vec![if_("show"), lit("inside"), endif(), lit("after")]);
    engine.set("show", value).unwrap();
    engine.attach_sink(output.clone()).unwrap();
    assert_eq!(engine.status(), &Status::Done);
    assert_eq!(engine.block_depth(), 0);
    assert_eq!(engine.skip_state(), SkipState::NotSkipping);
    output.chunks()
}

#[test]
fn test_if_true() {
    assert_eq!(started_with(Val::Bool(true)), vec!["inside", "after"]);
}

#[test]
fn test_if_false() {
    assert_eq!(started_with(Val::Bool(false)), vec!["after"]);
}

#[test]
fn test_if_truthiness() {
    assert_eq!(started_with(Val::from("Cake")), vec!["inside", "after"]);
    assert_eq!(started_with(Val::from("0")), vec!["inside", "after"]);
    assert_eq!(started_with(Val::from(42)), vec!["inside", "after"]);
    assert_eq!(started_with(Val::obj()), vec!["inside", "after"]);

    assert_eq!(started_with(Val::from("")), vec!["after"]);
    assert_eq!(started_with(Val::from(0)), vec!["after"]);
    assert_eq!(started_with(Val::Null), vec!["after"]);
}

#[test]
fn test_if_waits_for_condition() {
    let (mut engine, output) = start(vec![
        lit("<body>"),
        if_("bool"),
        lit("<p>"),
        var("bool"),
        lit("</p>"),
        endif(),
        lit("</body>"),
    ]);

    assert_eq!(output.chunks(), vec!["<body>"]);
    assert!(is_waiting_on(&engine, "bool", 1));
    // The frame is pushed before the condition is known
    assert_eq!(engine.block_depth(), 1);

    engine.set("bool", "Cake").unwrap();
    assert_eq!(output.text(), "<body><p>Cake</p></body>");
    assert_eq!(engine.block_depth(), 0);
    assert!(engine.is_finished());
}

#[test]
fn test_skipped_block_ignores_unset_variables() {
    // Nothing inside a skipped block is evaluated, so `missing` is never awaited
    let (mut engine, output) = build_engine(vec![
        if_("show"),
        var("missing"),
        if_("missing"),
        lit("never"),
        endif(),
        endif(),
        lit("end"),
    ]);
    engine.set("show", false).unwrap();
    engine.attach_sink(output.clone()).unwrap();

    assert_eq!(output.chunks(), vec!["end"]);
    assert_eq!(engine.status(), &Status::Done);
}

#[test]
fn test_nested_outer_false() {
    let (mut engine, output) = build_engine(vec![
        if_("a"),
        lit("A"),
        if_("b"),
        lit("B"),
        endif(),
        lit("A2"),
        endif(),
        lit("end"),
    ]);
    engine.set("a", false).unwrap();
    engine.attach_sink(output.clone()).unwrap();

    assert_eq!(output.chunks(), vec!["end"]);
    assert_eq!(engine.block_depth(), 0);
}

#[test]
fn test_nested_inner_false() {
    let (mut engine, output) = build_engine(vec![
        if_("flags.a"),
        lit("A"),
        if_("flags.b"),
        lit("B"),
        endif(),
        lit("A2"),
        endif(),
        lit("end"),
    ]);
    engine
        .set(
            "flags",
            hashmap! { "a".to_string() => Val::Bool(true), "b".to_string() => Val::Bool(false) },
        )
        .unwrap();
    engine.attach_sink(output.clone()).unwrap();

    assert_eq!(output.chunks(), vec!["A", "A2", "end"]);
}

#[test]
fn test_skip_depth_recorded() {
    let (mut engine, output) = start(vec![if_("outer"), if_("inner"), lit("x"), endif(), endif()]);
    assert_eq!(engine.block_depth(), 1);

    engine.set("outer", true).unwrap();
    assert_eq!(engine.block_depth(), 2);

    // Skip the inner block: skipping starts at depth 2 and ends when it closes
    engine.set("inner", false).unwrap();
    assert_eq!(engine.skip_state(), SkipState::NotSkipping);
    assert_eq!(engine.block_depth(), 0);
    assert!(output.chunks().is_empty());
    assert!(engine.is_finished());
}

#[test]
fn test_endif_without_if() {
    let (mut engine, output) = build_engine(vec![lit("a"), endif(), lit("b")]);

    let err = engine.attach_sink(output.clone()).unwrap_err();

    assert!(matches!(err, RenderError::UnbalancedBlock { index: 1 }));
    assert_eq!(engine.status(), &Status::Failed);
    assert_eq!(output.chunks(), vec!["a"]);
}
