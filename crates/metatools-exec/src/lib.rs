//! Execution backend for catalog tools.
//!
//! # Main entry points
//!
//! - [`Runner`] — the trait the A2A layer invokes skills through.
//! - [`ToolRunner`] — resolves a tool's backend from a [`ToolIndex`] and
//!   dispatches to an in-process [`LocalHandler`] or an HTTP endpoint.
//! - [`register_builtins()`] — registers the built-in local handlers.
//!
//! [`ToolIndex`]: metatools_discovery::ToolIndex

/// In-process handlers and the built-in set.
pub mod handler;
/// HTTP backend dispatch.
pub mod http;
/// The runner trait and its catalog-backed implementation.
pub mod runner;
/// Argument validation against declared input schemas.
pub mod validate;

pub use handler::{EchoHandler, LocalHandler};
pub use runner::{RunResult, Runner, ToolRunner};

/// Register the built-in local handlers on a runner.
pub fn register_builtins(runner: &mut ToolRunner) {
    runner.register_handler(std::sync::Arc::new(EchoHandler));
}
