//! `var(path, ...filters)`

use super::{filter_specs, path_arg, Directive, Flow};
use crate::engine::errors::RenderError;
use crate::engine::pipe::Pipe;
use crate::engine::types::{Argument, Val};
use crate::engine::vm::Engine;

/// Emits a variable, optionally through a filter chain
///
/// - scalar, no filters: emitted as one chunk, advances immediately
/// - stream, no filters: piped chunk by chunk, advances when the stream ends
/// - with filters: the value (one chunk, or the stream's chunks) runs through
///   the chain and execution advances only after the chain has ended, which
///   may happen after the input is complete
#[derive(Debug, Default)]
pub struct Var;

impl Directive for Var {
    fn call(&self, engine: &mut Engine, args: &[Argument]) -> Result<Flow, RenderError> {
        let path = path_arg("var", args, 0)?;
        // Unknown filters fail here, before the value is even available
        engine.filters().build_chain(filter_specs(args))?;
        Ok(Flow::Await(path.clone()))
    }

    fn resume(
        &self,
        engine: &mut Engine,
        args: &[Argument],
        value: Val,
    ) -> Result<Flow, RenderError> {
        let path = path_arg("var", args, 0)?;
        let specs = filter_specs(args);
        let chain = if specs.is_empty() {
            None
        } else {
            Some(engine.filters().build_chain(specs)?)
        };

        match (value, chain) {
            (Val::Stream(stream), chain) => Ok(Flow::Pipe(Pipe::open(&stream, path, chain)?)),
            (value, None) => {
                engine.emit(&value.to_string())?;
                Ok(Flow::Advance)
            }
            (value, Some(mut chain)) => {
                let mut chunks = chain.accept(&value.to_string());
                chunks.extend(chain.finish());
                for chunk in &chunks {
                    engine.emit(chunk)?;
                }
                if chain.is_ended() {
                    Ok(Flow::Advance)
                } else {
                    // A stage may still end later; the pipe fails if none can
                    Ok(Flow::Pipe(Pipe::draining(chain)))
                }
            }
        }
    }
}
