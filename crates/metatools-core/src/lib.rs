//! Core types and error definitions shared by every metatools crate.
//!
//! # Main types
//!
//! - [`MetatoolsError`] — Every failure a metatools crate can report.
//! - [`MetatoolsResult`] — `Result` alias over [`MetatoolsError`].
//! - [`Tool`] / [`ToolBackend`] / [`DocEntry`] — what gets registered in a catalog.
//! - [`ToolSummary`] / [`ToolDoc`] — what discovery hands back.
//! - [`Content`] / [`InvokeResult`] — typed content blocks returned from an invocation.

/// Typed content blocks produced by skill invocations.
pub mod content;
/// Error taxonomy.
pub mod error;
/// Tool model: definitions, backends, summaries and documentation.
pub mod tool;

pub use content::{Content, InvokeResult};
pub use error::{MetatoolsError, MetatoolsResult};
pub use tool::{
    DetailLevel, DocEntry, Tool, ToolBackend, ToolDoc, ToolExample, ToolSummary,
};
