//! Tool catalog for metatools.
//!
//! [`Discovery`] is the read side consumed by the A2A layer; [`ToolIndex`] is
//! the in-memory catalog that implements it, and [`bootstrap`] fills an index
//! from a declarative file at startup.

pub mod bootstrap;
pub mod discovery;
pub mod index;

pub use bootstrap::{load_bootstrap, BootstrapFile, ToolRegistration};
pub use discovery::{Discovery, SearchResult};
pub use index::ToolIndex;
