//! # Engine - Resumable Streaming Template Interpreter
//!
//! Renders a compiled template (literal fragments and directives) into an
//! [`OutputSink`], tolerating variables whose values are not known yet.
//!
//! ## Core Principles
//!
//! 1. **Cursor-driven execution**: one cursor over an immutable instruction list
//! 2. **Directive-driven progress**: a directive's [`Flow`] decides when the
//!    cursor moves on; the engine never advances speculatively
//! 3. **Wake-on-set**: an unresolved variable parks the engine; the `set` that
//!    makes it resolvable resumes it
//! 4. **Block bookkeeping lives in the engine**: handlers only declare
//!    `opens_block` / `closes_block`
//!
//! ## Example
//!
//! ```rust
//! use rill_core::engine::{Argument, ChunkCollector, Engine, Instruction, Template, Val};
//!
//! let template = Template::new(vec![
//!     Instruction::lit("<h1>"),
//!     Instruction::directive("var", vec![Argument::path("title")]),
//!     Instruction::lit("</h1>"),
//! ]);
//! let output = ChunkCollector::new();
//! let mut engine = Engine::with_builtins(template);
//! engine.attach_sink(output.clone()).unwrap();
//! assert_eq!(output.text(), "<h1>");
//!
//! engine.set("title", Val::from("Test page")).unwrap();
//! assert_eq!(output.text(), "<h1>Test page</h1>");
//! ```

pub mod blocks;
pub mod directives;
pub mod errors;
pub mod exec_loop;
pub mod filters;
pub mod pipe;
pub mod sink;
pub mod store;
pub mod types;
pub mod vm;

#[cfg(test)]
mod tests;

// Re-export commonly used items
pub use directives::{Directive, DirectiveRegistry, Flow};
pub use errors::RenderError;
pub use filters::{FilterChain, FilterRegistry, FilterStage, StageHandle, StageOutput};
pub use sink::{ChunkCollector, OutputSink, WriterSink};
pub use types::{
    Argument, FilterSpec, Instruction, Literal, SkipState, Status, Step, StreamValue,
    StreamWriter, Template, Val, VarPath, Wait,
};
pub use vm::Engine;
