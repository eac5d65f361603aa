use crate::types::{Artifact, Task, TaskEvent, TaskEventKind, TaskState, TaskStatus};
use chrono::Utc;
use futures_util::stream::{self, Stream};
use metatools_core::{MetatoolsError, MetatoolsResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_EVENT_CAPACITY: usize = 64;

/// How long a finished task stays queryable before it may be pruned.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

struct TaskEntry {
    task: Task,
    sequence: u64,
    /// Dropped once the final event is sent, which closes every receiver.
    events: Option<broadcast::Sender<TaskEvent>>,
    cancel: CancellationToken,
}

impl TaskEntry {
    fn emit(&mut self, kind: TaskEventKind, is_final: bool) {
        self.sequence += 1;
        let event = TaskEvent {
            task_id: self.task.id.clone(),
            sequence: self.sequence,
            kind,
            is_final,
            timestamp: self.task.updated_at,
        };
        if let Some(events) = &self.events {
            // No subscribers is not an error.
            let _ = events.send(event);
        }
        if is_final {
            self.events = None;
        }
    }
}

/// Owns every task record and its event channel.
///
/// Events for a task are sent while its entry is write-locked, so
/// subscribers observe them in the order the changes were applied.
pub struct TaskManager {
    tasks: RwLock<HashMap<String, TaskEntry>>,
    event_capacity: usize,
    retention: Duration,
}

impl TaskManager {
    /// Empty manager with the default event buffer and retention.
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Per-task event buffer size; slower subscribers skip events.
    pub fn with_event_capacity(event_capacity: usize) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            event_capacity: event_capacity.max(1),
            retention: DEFAULT_RETENTION,
        }
    }

    /// How long finished tasks are kept before [`prune_finished`] drops them.
    ///
    /// [`prune_finished`]: Self::prune_finished
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Creates a task in the `submitted` state.
    pub fn create(&self, skill_id: Option<String>) -> Task {
        let task = Task::new(skill_id);
        let (events, _) = broadcast::channel(self.event_capacity);
        let mut entry = TaskEntry {
            task: task.clone(),
            sequence: 0,
            events: Some(events),
            cancel: CancellationToken::new(),
        };
        entry.emit(
            TaskEventKind::Status {
                state: TaskState::Submitted,
                message: None,
            },
            false,
        );

        info!(task_id = %task.id, skill = ?task.skill_id, "Task created");
        self.prune_finished();
        self.tasks.write().insert(task.id.clone(), entry);
        task
    }

    /// Drops finished tasks last updated longer ago than the retention
    /// window. Runs on every [`create`](Self::create).
    pub fn prune_finished(&self) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(self.retention)
            .ok()
            .and_then(|retention| Utc::now().checked_sub_signed(retention))
        else {
            return 0;
        };

        let mut tasks = self.tasks.write();
        let before = tasks.len();
        tasks.retain(|_, e| !(e.task.status.state.is_terminal() && e.task.updated_at <= cutoff));
        let pruned = before - tasks.len();
        if pruned > 0 {
            debug!(pruned, "Pruned finished tasks");
        }
        pruned
    }

    /// Current record of a task.
    pub fn get(&self, id: &str) -> Option<Task> {
        self.tasks.read().get(id).map(|e| e.task.clone())
    }

    /// All tasks, oldest first.
    pub fn list(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.read().values().map(|e| e.task.clone()).collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        tasks
    }

    /// Number of tasks currently held, finished ones included.
    pub fn task_count(&self) -> usize {
        self.tasks.read().len()
    }

    /// Moves a task to `state`, rejecting transitions the state machine does
    /// not allow.
    pub fn transition(
        &self,
        id: &str,
        state: TaskState,
        message: Option<String>,
    ) -> MetatoolsResult<Task> {
        let mut tasks = self.tasks.write();
        let entry = tasks
            .get_mut(id)
            .ok_or_else(|| MetatoolsError::NotFound(format!("task '{id}'")))?;

        let current = entry.task.status.state;
        if !current.can_transition_to(state) {
            return Err(MetatoolsError::InvalidRequest(format!(
                "task '{id}' cannot move from {current} to {state}"
            )));
        }

        let now = Utc::now();
        entry.task.status = TaskStatus {
            state,
            message: message.clone(),
            timestamp: now,
        };
        entry.task.updated_at = now;
        entry.emit(TaskEventKind::Status { state, message }, state.is_terminal());

        info!(task_id = %id, from = %current, to = %state, "Task transitioned");
        Ok(entry.task.clone())
    }

    /// Attaches an artifact to a task that has not finished yet.
    pub fn add_artifact(&self, id: &str, artifact: Artifact) -> MetatoolsResult<Task> {
        let mut tasks = self.tasks.write();
        let entry = tasks
            .get_mut(id)
            .ok_or_else(|| MetatoolsError::NotFound(format!("task '{id}'")))?;

        if entry.task.status.state.is_terminal() {
            return Err(MetatoolsError::InvalidRequest(format!(
                "task '{id}' is already {}",
                entry.task.status.state
            )));
        }

        entry.task.artifacts.push(artifact.clone());
        entry.task.updated_at = Utc::now();
        entry.emit(TaskEventKind::Artifact { artifact }, false);
        Ok(entry.task.clone())
    }

    /// Cancels a task and signals its worker through the task's token.
    pub fn cancel(&self, id: &str) -> MetatoolsResult<Task> {
        let task = self.transition(id, TaskState::Canceled, Some("canceled by client".into()))?;
        if let Some(token) = self.cancellation_token(id) {
            token.cancel();
        }
        Ok(task)
    }

    /// Token that fires when the task is canceled.
    pub fn cancellation_token(&self, id: &str) -> Option<CancellationToken> {
        self.tasks.read().get(id).map(|e| e.cancel.clone())
    }

    /// Subscribes to a task's events, starting with a snapshot of its status.
    pub fn subscribe(&self, id: &str) -> MetatoolsResult<TaskSubscription> {
        let tasks = self.tasks.read();
        let entry = tasks
            .get(id)
            .ok_or_else(|| MetatoolsError::NotFound(format!("task '{id}'")))?;

        Ok(TaskSubscription {
            snapshot: TaskEvent::status_of(&entry.task, entry.sequence),
            receiver: entry.events.as_ref().map(broadcast::Sender::subscribe),
        })
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

/// A live view of one task's events.
pub struct TaskSubscription {
    /// Current status at the moment of subscribing.
    pub snapshot: TaskEvent,
    /// `None` once the task has finished.
    receiver: Option<broadcast::Receiver<TaskEvent>>,
}

enum Phase {
    Snapshot(TaskEvent, Option<broadcast::Receiver<TaskEvent>>),
    Live(broadcast::Receiver<TaskEvent>),
    Done,
}

impl TaskSubscription {
    /// Snapshot first, then live events in order; ends after a final event.
    pub fn into_stream(self) -> impl Stream<Item = TaskEvent> + Send + 'static {
        stream::unfold(
            Phase::Snapshot(self.snapshot, self.receiver),
            |phase| async move {
                match phase {
                    Phase::Snapshot(event, rx) => {
                        let next = match rx {
                            Some(rx) if !event.is_final => Phase::Live(rx),
                            _ => Phase::Done,
                        };
                        Some((event, next))
                    }
                    Phase::Live(mut rx) => loop {
                        match rx.recv().await {
                            Ok(event) => {
                                let next = if event.is_final {
                                    Phase::Done
                                } else {
                                    Phase::Live(rx)
                                };
                                return Some((event, next));
                            }
                            Err(RecvError::Lagged(skipped)) => {
                                warn!(skipped, "Task event subscriber lagged");
                            }
                            Err(RecvError::Closed) => return None,
                        }
                    },
                    Phase::Done => None,
                }
            },
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use metatools_core::Content;

    #[test]
    fn test_empty_manager() {
        let manager = TaskManager::new();
        assert_eq!(manager.task_count(), 0);
        assert!(manager.list().is_empty());
        assert!(manager.get("missing").is_none());
    }

    #[test]
    fn test_create_and_get() {
        let manager = TaskManager::new();
        let task = manager.create(Some("echo".into()));
        let fetched = manager.get(&task.id).unwrap();
        assert_eq!(fetched.state(), TaskState::Submitted);
        assert_eq!(manager.task_count(), 1);
    }

    #[test]
    fn test_list_oldest_first() {
        let manager = TaskManager::new();
        let first = manager.create(None);
        let second = manager.create(None);
        let ids: Vec<String> = manager.list().into_iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first.id) && ids.contains(&second.id));
        let listed = manager.list();
        assert!(listed[0].created_at <= listed[1].created_at);
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let manager = TaskManager::new();
        let task = manager.create(None);
        let err = manager
            .transition(&task.id, TaskState::Completed, None)
            .unwrap_err();
        assert!(matches!(err, MetatoolsError::InvalidRequest(_)));
        assert_eq!(manager.get(&task.id).unwrap().state(), TaskState::Submitted);
    }

    #[test]
    fn test_unknown_task_not_found() {
        let manager = TaskManager::new();
        assert!(matches!(
            manager.transition("x", TaskState::Working, None),
            Err(MetatoolsError::NotFound(_))
        ));
        assert!(matches!(manager.subscribe("x"), Err(MetatoolsError::NotFound(_))));
    }

    #[test]
    fn test_cancel_fires_token() {
        let manager = TaskManager::new();
        let task = manager.create(None);
        let token = manager.cancellation_token(&task.id).unwrap();
        assert!(!token.is_cancelled());

        let canceled = manager.cancel(&task.id).unwrap();
        assert_eq!(canceled.state(), TaskState::Canceled);
        assert!(token.is_cancelled());

        // Terminal: a second cancel is rejected.
        assert!(manager.cancel(&task.id).is_err());
    }

    #[test]
    fn test_artifact_rejected_after_completion() {
        let manager = TaskManager::new();
        let task = manager.create(None);
        manager.transition(&task.id, TaskState::Working, None).unwrap();
        manager
            .add_artifact(&task.id, Artifact::new(vec![Content::text("partial")]))
            .unwrap();
        manager.transition(&task.id, TaskState::Completed, None).unwrap();

        let err = manager
            .add_artifact(&task.id, Artifact::new(vec![Content::text("late")]))
            .unwrap_err();
        assert!(err.to_string().contains("completed"));
        assert_eq!(manager.get(&task.id).unwrap().artifacts.len(), 1);
    }

    #[tokio::test]
    async fn test_subscription_streams_in_order_until_final() {
        let manager = TaskManager::new();
        let task = manager.create(Some("echo".into()));
        let stream = manager.subscribe(&task.id).unwrap().into_stream();

        manager.transition(&task.id, TaskState::Working, None).unwrap();
        manager
            .add_artifact(&task.id, Artifact::new(vec![Content::text("ok")]))
            .unwrap();
        manager.transition(&task.id, TaskState::Completed, None).unwrap();

        let events: Vec<TaskEvent> = stream.collect().await;
        assert_eq!(events.len(), 4);
        assert_eq!(
            events.iter().map(|e| e.sequence).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert!(matches!(
            events[0].kind,
            TaskEventKind::Status { state: TaskState::Submitted, .. }
        ));
        assert!(matches!(events[2].kind, TaskEventKind::Artifact { .. }));
        assert!(events[3].is_final);
    }

    #[test]
    fn test_prune_finished_keeps_active_tasks() {
        let manager = TaskManager::new().with_retention(Duration::ZERO);
        let done = manager.create(None);
        let active = manager.create(None);
        manager.cancel(&done.id).unwrap();

        assert_eq!(manager.prune_finished(), 1);
        assert!(manager.get(&done.id).is_none());
        assert!(manager.get(&active.id).is_some());
    }

    #[test]
    fn test_recent_finished_tasks_survive_create() {
        let manager = TaskManager::new();
        let done = manager.create(None);
        manager.cancel(&done.id).unwrap();
        manager.create(None);
        assert_eq!(manager.prune_finished(), 0);
        assert_eq!(manager.get(&done.id).unwrap().state(), TaskState::Canceled);
    }

    #[tokio::test]
    async fn test_final_event_closes_channel() {
        let manager = TaskManager::new();
        let task = manager.create(None);
        let mut receiver = manager.subscribe(&task.id).unwrap().receiver.unwrap();

        manager.cancel(&task.id).unwrap();
        assert!(receiver.recv().await.unwrap().is_final);
        assert!(matches!(receiver.recv().await, Err(RecvError::Closed)));
        assert!(manager.subscribe(&task.id).unwrap().receiver.is_none());
    }

    #[tokio::test]
    async fn test_subscription_to_finished_task_yields_snapshot_only() {
        let manager = TaskManager::new();
        let task = manager.create(None);
        manager.cancel(&task.id).unwrap();

        let events: Vec<TaskEvent> = manager
            .subscribe(&task.id)
            .unwrap()
            .into_stream()
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_final);
        assert!(matches!(
            events[0].kind,
            TaskEventKind::Status { state: TaskState::Canceled, .. }
        ));
    }
}
