//! Test helpers for engine tests
//!
//! Instruction shorthands and engines wired to an in-memory sink

use crate::engine::{
    Argument, ChunkCollector, DirectiveRegistry, Engine, FilterRegistry, Instruction, Literal,
    Status, Template, Wait,
};

pub fn lit(text: &str) -> Instruction {
    Instruction::lit(text)
}

pub fn var(path: &str) -> Instruction {
    Instruction::directive("var", vec![Argument::path(path)])
}

/// `var(path, ...filters)` with each filter given as `(name, args)`
pub fn var_with(path: &str, filters: &[(&str, &[&str])]) -> Instruction {
    let mut args = vec![Argument::path(path)];
    args.extend(filters.iter().map(|(name, filter_args)| {
        Argument::filter(*name, filter_args.iter().map(|a| Literal::from(*a)).collect())
    }));
    Instruction::directive("var", args)
}

pub fn if_(path: &str) -> Instruction {
    Instruction::directive("if", vec![Argument::path(path)])
}

pub fn endif() -> Instruction {
    Instruction::directive("endif", vec![])
}

/// Engine with the built-in directives and filters, not started yet
pub fn build_engine(instructions: Vec<Instruction>) -> (Engine, ChunkCollector) {
    (Engine::with_builtins(Template::new(instructions)), ChunkCollector::new())
}

/// Engine with custom registries, started against a collector
///
/// Panics if the render fails while starting.
pub fn start_with(
    instructions: Vec<Instruction>,
    directives: DirectiveRegistry,
    filters: FilterRegistry,
) -> (Engine, ChunkCollector) {
    let output = ChunkCollector::new();
    let engine = Engine::with_sink(
        Template::new(instructions),
        directives,
        filters,
        output.clone(),
    )
    .expect("Render failed to start");
    (engine, output)
}

/// Engine with the built-ins, started against a collector
pub fn start(instructions: Vec<Instruction>) -> (Engine, ChunkCollector) {
    start_with(
        instructions,
        DirectiveRegistry::with_builtins(),
        FilterRegistry::with_builtins(),
    )
}

/// Whether the engine is parked on `path` at instruction `directive`
pub fn is_waiting_on(engine: &Engine, expected_path: &str, expected_directive: usize) -> bool {
    match engine.status() {
        Status::Suspended(Wait::Variable {
            path, directive, ..
        }) => path.to_string() == expected_path && *directive == expected_directive,
        _ => false,
    }
}
