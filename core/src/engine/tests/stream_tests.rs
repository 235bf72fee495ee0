//! Tests for piping stream values

use super::helpers::{build_engine, lit, start, start_with, var, var_with};
use crate::engine::{
    DirectiveRegistry, FilterRegistry, FilterStage, Literal, RenderError, StageOutput, Status,
    StreamValue, Wait,
};

#[test]
fn test_stream_piped_as_it_arrives() {
    let (writer, body) = StreamValue::channel();
    let (mut engine, output) = build_engine(vec![lit("<p>"), var("body"), lit("</p>")]);
    engine.set("body", body).unwrap();
    engine.attach_sink(output.clone()).unwrap();

    assert_eq!(output.chunks(), vec!["<p>"]);
    assert_eq!(
        engine.status(),
        &Status::Suspended(Wait::Stream { directive: 1 })
    );

    writer.write("a");
    engine.pump().unwrap();
    assert_eq!(output.chunks(), vec!["<p>", "a"]);

    writer.write("b");
    writer.end();
    engine.pump().unwrap();
    assert_eq!(output.chunks(), vec!["<p>", "a", "b", "</p>"]);
    assert_eq!(engine.status(), &Status::Done);
}

#[test]
fn test_stream_set_after_suspend() {
    let (mut engine, output) = start(vec![var("body"), lit("!")]);

    let (writer, body) = StreamValue::channel();
    writer.write("already buffered");
    engine.set("body", body).unwrap();
    assert_eq!(output.chunks(), vec!["already buffered"]);

    drop(writer);
    engine.pump().unwrap();
    assert_eq!(output.text(), "already buffered!");
}

#[test]
fn test_filtered_stream() {
    let (writer, body) = StreamValue::channel();
    writer.write("ab");
    writer.write("cd");
    writer.end();

    let (mut engine, output) = build_engine(vec![
        lit("<p>"),
        var_with("body", &[("uppercase", &[]), ("wrap", &["<<", ">>"])]),
        lit("</p>"),
    ]);
    engine.set("body", body).unwrap();
    engine.attach_sink(output.clone()).unwrap();

    assert_eq!(
        output.chunks(),
        vec!["<p>", "<<", "AB", "CD", ">>", "</p>"]
    );
    assert_eq!(engine.status(), &Status::Done);
}

#[test]
fn test_pump_when_not_streaming_is_noop() {
    let (mut engine, output) = start(vec![var("title")]);

    engine.pump().unwrap();

    assert!(output.chunks().is_empty());
    assert!(matches!(
        engine.status(),
        Status::Suspended(Wait::Variable { .. })
    ));
}

#[test]
fn test_stream_consumed_once() {
    let (writer, body) = StreamValue::channel();
    writer.write("x");
    writer.end();

    let (mut engine, output) = build_engine(vec![var("body"), var("body")]);
    engine.set("body", body).unwrap();
    let err = engine.attach_sink(output.clone()).unwrap_err();

    assert!(matches!(err, RenderError::StreamConsumed { ref path } if path.to_string() == "body"));
    assert_eq!(output.chunks(), vec!["x"]);
    assert_eq!(engine.status(), &Status::Failed);
}

#[test]
fn test_stalled_filter_on_stream() {
    struct Stall;
    impl FilterStage for Stall {
        fn accept(&mut self, chunk: &str, out: &mut StageOutput) {
            out.push(chunk);
        }
        fn finish(&mut self, _out: &mut StageOutput) {}
    }

    let mut filters = FilterRegistry::with_builtins();
    filters.register("stall", |_: &[Literal]| Ok(Box::new(Stall) as Box<dyn FilterStage>));
    let (mut engine, output) = start_with(
        vec![var_with("body", &[("stall", &[])])],
        DirectiveRegistry::with_builtins(),
        filters,
    );

    let (writer, body) = StreamValue::channel();
    engine.set("body", body).unwrap();
    writer.write("partial");
    engine.pump().unwrap();
    assert_eq!(output.chunks(), vec!["partial"]);

    writer.end();
    let err = engine.pump().unwrap_err();
    assert!(matches!(err, RenderError::FilterStalled));
    assert_eq!(engine.status(), &Status::Failed);
}
