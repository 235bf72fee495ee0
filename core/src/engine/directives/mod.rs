//! Directive handlers
//!
//! A directive is a named handler plus two flags the engine consults before the
//! body runs: `opens_block` (push a frame) and `closes_block` (pop one). The
//! body never touches the block stack for those; it only decides how execution
//! moves on by returning a [`Flow`].

pub mod conditional;
pub mod var;

use super::errors::RenderError;
use super::pipe::Pipe;
use super::types::{Argument, FilterSpec, Val, VarPath};
use super::vm::Engine;
use std::collections::HashMap;
use std::sync::Arc;

/* ===================== Handler Interface ===================== */

/// How execution continues after a directive body
#[derive(Debug)]
pub enum Flow {
    /// Move on to the next instruction
    Advance,
    /// Resolve this path, then call [`Directive::resume`] with its value.
    /// Resolution is synchronous when the value is already set; otherwise the
    /// engine suspends until a `set` makes the path resolvable.
    Await(VarPath),
    /// Forward a stream to the output; advance once it ends
    Pipe(Pipe),
}

pub trait Directive {
    fn opens_block(&self) -> bool {
        false
    }

    fn closes_block(&self) -> bool {
        false
    }

    /// Run the directive body
    fn call(&self, engine: &mut Engine, args: &[Argument]) -> Result<Flow, RenderError>;

    /// Continue after an [`Flow::Await`] resolved
    fn resume(
        &self,
        engine: &mut Engine,
        args: &[Argument],
        value: Val,
    ) -> Result<Flow, RenderError> {
        let _ = (engine, args, value);
        Ok(Flow::Advance)
    }
}

/* ===================== Registry ===================== */

pub type DirectiveHandler = Arc<dyn Directive + Send + Sync>;

/// Directive name to handler
#[derive(Clone, Default)]
pub struct DirectiveRegistry {
    handlers: HashMap<String, DirectiveHandler>,
}

impl DirectiveRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `if`, `endif` and `var`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("if", conditional::If);
        registry.register("endif", conditional::EndIf);
        registry.register("var", var::Var);
        registry
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: impl Directive + Send + Sync + 'static,
    ) {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    pub fn get(&self, name: &str) -> Option<DirectiveHandler> {
        self.handlers.get(name).cloned()
    }
}

impl std::fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("DirectiveRegistry")
            .field("directives", &names)
            .finish()
    }
}

/* ===================== Argument Helpers ===================== */

/// The variable path at `position`
pub fn path_arg<'a>(
    directive: &str,
    args: &'a [Argument],
    position: usize,
) -> Result<&'a VarPath, RenderError> {
    match args.get(position) {
        Some(Argument::Path { path }) if !path.is_empty() => Ok(path),
        _ => Err(RenderError::MissingArgument {
            directive: directive.to_string(),
            position,
            expected: "path",
        }),
    }
}

/// Every filter spec among the arguments, in order
pub fn filter_specs(args: &[Argument]) -> Vec<&FilterSpec> {
    args.iter()
        .filter_map(|arg| match arg {
            Argument::Filter(spec) => Some(spec),
            _ => None,
        })
        .collect()
}
