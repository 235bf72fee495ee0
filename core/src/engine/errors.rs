//! Render errors
//!
//! Structural errors (unknown directive or filter, unbalanced blocks, broken
//! filter chains) abort the render. `UnresolvedVariable` and `MalformedPath`
//! leave the engine intact: a timed-out wait stays registered, and a rejected
//! `set` never touches the store.

use super::types::VarPath;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unknown directive '{name}' at instruction {index}")]
    UnknownDirective { name: String, index: usize },

    #[error("unknown filter '{name}'")]
    UnknownFilter { name: String },

    #[error("malformed path '{path}': {reason}")]
    MalformedPath { path: VarPath, reason: String },

    #[error("variable '{path}' still unresolved after {waited:?}")]
    UnresolvedVariable { path: VarPath, waited: Duration },

    #[error("block closed at instruction {index} without a matching open")]
    UnbalancedBlock { index: usize },

    #[error("invalid arguments for filter '{filter}': {reason}")]
    InvalidFilterArgs { filter: String, reason: String },

    #[error("directive '{directive}' expects a {expected} argument at position {position}")]
    MissingArgument {
        directive: String,
        position: usize,
        expected: &'static str,
    },

    #[error("filter chain did not signal end after finish")]
    FilterStalled,

    #[error("stream at '{path}' was already consumed")]
    StreamConsumed { path: VarPath },

    #[error("instruction {index} is invalid: {reason}")]
    InvalidInstruction { index: usize, reason: String },

    #[error("template JSON: {0}")]
    TemplateJson(#[from] serde_json::Error),

    #[error("sink error: {0}")]
    Sink(#[from] std::io::Error),
}

impl RenderError {
    /// Whether the render can continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RenderError::UnresolvedVariable { .. } | RenderError::MalformedPath { .. }
        )
    }
}
