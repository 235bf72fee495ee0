//! Type definitions for the engine
//!
//! This module contains the core types the interpreter works with:
//! - Compiled template instructions (Instruction, Argument, FilterSpec, VarPath)
//! - Runtime values (Val, StreamValue)
//! - Control state (SkipState, Status, Wait, Step)

pub mod control;
pub mod instruction;
pub mod values;

// Re-export all types for convenient access
pub use control::{SkipState, Status, Step, Wait};
pub use instruction::{Argument, FilterSpec, Instruction, Literal, Template, VarPath};
pub use values::{StreamValue, StreamWriter, Val};
