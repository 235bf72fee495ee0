//! `if` / `endif`

use super::{path_arg, Directive, Flow};
use crate::engine::errors::RenderError;
use crate::engine::types::{Argument, Val};
use crate::engine::vm::Engine;

/// `if(path)` - opens a block, skipped when the value is falsy
#[derive(Debug, Default)]
pub struct If;

impl Directive for If {
    fn opens_block(&self) -> bool {
        true
    }

    fn call(&self, _engine: &mut Engine, args: &[Argument]) -> Result<Flow, RenderError> {
        Ok(Flow::Await(path_arg("if", args, 0)?.clone()))
    }

    fn resume(
        &self,
        engine: &mut Engine,
        _args: &[Argument],
        value: Val,
    ) -> Result<Flow, RenderError> {
        if !value.is_truthy() {
            engine.skip_current_block();
        }
        Ok(Flow::Advance)
    }
}

/// `endif()` - closes the block
#[derive(Debug, Default)]
pub struct EndIf;

impl Directive for EndIf {
    fn closes_block(&self) -> bool {
        true
    }

    fn call(&self, _engine: &mut Engine, _args: &[Argument]) -> Result<Flow, RenderError> {
        Ok(Flow::Advance)
    }
}
