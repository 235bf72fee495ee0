pub mod cli;
pub mod config;
pub mod engine;
pub mod host;

// Re-export main types
pub use config::{Config, EngineConfig};
pub use engine::{Engine, RenderError, Template, Val};
pub use host::{drive, RenderHandle};
