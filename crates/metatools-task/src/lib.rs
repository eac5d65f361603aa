//! Task lifecycle for long-running skill invocations.
//!
//! A [`Task`] moves through [`TaskState`]s under a [`TaskManager`]; every
//! change is broadcast as a [`TaskEvent`] to subscribers of that task.

pub mod manager;
pub mod types;

pub use manager::{TaskManager, TaskSubscription, DEFAULT_RETENTION};
pub use types::{Artifact, Task, TaskEvent, TaskEventKind, TaskState, TaskStatus};
