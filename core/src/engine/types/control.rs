//! Control state for the interpreter

use super::instruction::VarPath;
use std::time::Instant;

/* ===================== Skipping ===================== */

/// Whether the engine is currently suppressing a block
///
/// `SkippingSince(depth)` records the block depth at the moment skipping
/// began. Skipping ends exactly when a close leaves the depth below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkipState {
    #[default]
    NotSkipping,
    SkippingSince(usize),
}

impl SkipState {
    pub fn is_skipping(&self) -> bool {
        matches!(self, SkipState::SkippingSince(_))
    }
}

/* ===================== Engine Status ===================== */

/// What a suspended engine is waiting for
#[derive(Debug, Clone, PartialEq)]
pub enum Wait {
    /// A directive needs a variable that is not resolvable yet
    Variable {
        path: VarPath,
        /// Index of the parked directive
        directive: usize,
        since: Instant,
    },
    /// A directive is piping a stream that has no chunk ready
    Stream { directive: usize },
    /// A directive's input is complete but its filter chain has not ended
    Filter { directive: usize },
}

/// Engine lifecycle
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Status {
    /// No sink attached yet
    #[default]
    Idle,
    Running,
    Suspended(Wait),
    Done,
    /// A structural error aborted the render
    Failed,
}

impl Status {
    pub fn is_finished(&self) -> bool {
        matches!(self, Status::Done | Status::Failed)
    }
}

/* ===================== Step Result ===================== */

/// Result of executing one instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Continue to next instruction
    Continue,
    /// A directive parked the engine
    Suspended,
    /// Cursor has passed the last instruction
    Done,
}
