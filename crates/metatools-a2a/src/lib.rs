//! A2A protocol adaptation layer.
//!
//! Exposes a tool catalog to remote agents: an agent card, a skill listing,
//! skill invocation and asynchronous tasks with per-task event streams.
//!
//! # Main entry points
//!
//! - [`Agent`] — identity, skill listing and invocation over a
//!   [`Discovery`](metatools_discovery::Discovery) and a
//!   [`Runner`](metatools_exec::Runner).
//! - [`A2aHandler`] — JSON-RPC dispatch and the HTTP operations.
//! - [`build_router()`] — mounts the handler under a base path.
//! - [`A2aServer`] — binds, serves and shuts down on cancellation.

/// Canonical provider/tool model and agent card rendering.
pub mod adapter;
/// The agent facade.
pub mod agent;
/// JSON-RPC dispatch and HTTP handlers.
pub mod handler;
/// Input schema normalization.
pub mod normalize;
/// Wire types.
pub mod protocol;
/// URL layout and task path parsing.
pub mod router;
/// Listener lifecycle.
pub mod server;

pub use adapter::{choose_description, A2aAdapter, CanonicalProvider, CanonicalTool};
pub use agent::{stringify, Agent, AgentIdentity, DEFAULT_MAX_SKILLS};
pub use handler::{A2aHandler, ApiError};
pub use normalize::normalize_schema;
pub use protocol::{AgentCard, WireTool, A2A_PROTOCOL_VERSION};
pub use router::{build_router, normalize_base_path, parse_task_path, TaskRoute};
pub use server::{A2aServer, BoundServer, ServerConfig, SHUTDOWN_GRACE};
