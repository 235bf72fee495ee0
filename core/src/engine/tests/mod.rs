//! Tests for the engine
//!
//! Organized by feature area

mod helpers;
mod if_tests;
mod stream_tests;
