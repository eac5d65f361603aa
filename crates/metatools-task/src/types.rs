use chrono::{DateTime, Utc};
use metatools_core::Content;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    Completed,
    Failed,
    Canceled,
}

impl TaskState {
    /// Completed, failed and canceled tasks never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Canceled
        )
    }

    /// States reachable from this one in a single step.
    pub fn valid_transitions(&self) -> &'static [TaskState] {
        match self {
            TaskState::Submitted => &[TaskState::Working, TaskState::Canceled, TaskState::Failed],
            TaskState::Working => &[
                TaskState::InputRequired,
                TaskState::Completed,
                TaskState::Failed,
                TaskState::Canceled,
            ],
            TaskState::InputRequired => {
                &[TaskState::Working, TaskState::Failed, TaskState::Canceled]
            }
            TaskState::Completed | TaskState::Failed | TaskState::Canceled => &[],
        }
    }

    /// Whether the state machine allows moving to `next`.
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Submitted => write!(f, "submitted"),
            TaskState::Working => write!(f, "working"),
            TaskState::InputRequired => write!(f, "input-required"),
            TaskState::Completed => write!(f, "completed"),
            TaskState::Failed => write!(f, "failed"),
            TaskState::Canceled => write!(f, "canceled"),
        }
    }
}

/// Current status of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Output produced by a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: Vec<Content>,
}

impl Artifact {
    /// Unnamed artifact with a fresh id.
    pub fn new(content: Vec<Content>) -> Self {
        Self {
            artifact_id: Uuid::new_v4().to_string(),
            name: None,
            content,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A unit of asynchronous work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    /// Skill this task invokes, if it was created for one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_id: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// New task in the `submitted` state.
    pub fn new(skill_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            skill_id,
            status: TaskStatus {
                state: TaskState::Submitted,
                message: None,
                timestamp: now,
            },
            artifacts: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Shorthand for `status.state`.
    pub fn state(&self) -> TaskState {
        self.status.state
    }
}

/// What changed in a [`TaskEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TaskEventKind {
    /// The task's status changed (or, for a snapshot, currently is).
    Status {
        state: TaskState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// An artifact was attached.
    Artifact { artifact: Artifact },
}

/// A change notification for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    pub task_id: String,
    /// Monotonic per task, starting at 1 for the submission.
    pub sequence: u64,
    #[serde(flatten)]
    pub kind: TaskEventKind,
    /// Set on the event that moves the task into a terminal state.
    #[serde(rename = "final")]
    pub is_final: bool,
    pub timestamp: DateTime<Utc>,
}

impl TaskEvent {
    /// Status event describing `task` as it is now.
    pub fn status_of(task: &Task, sequence: u64) -> Self {
        Self {
            task_id: task.id.clone(),
            sequence,
            kind: TaskEventKind::Status {
                state: task.status.state,
                message: task.status.message.clone(),
            },
            is_final: task.status.state.is_terminal(),
            timestamp: task.status.timestamp,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_submitted() {
        let task = Task::new(Some("demo:echo".into()));
        assert_eq!(task.state(), TaskState::Submitted);
        assert!(task.artifacts.is_empty());
        assert_eq!(task.skill_id.as_deref(), Some("demo:echo"));
    }

    #[test]
    fn test_terminal_states_have_no_transitions() {
        for state in [TaskState::Completed, TaskState::Failed, TaskState::Canceled] {
            assert!(state.is_terminal());
            assert!(state.valid_transitions().is_empty());
        }
    }

    #[test]
    fn test_transitions() {
        assert!(TaskState::Submitted.can_transition_to(TaskState::Working));
        assert!(TaskState::Submitted.can_transition_to(TaskState::Canceled));
        assert!(!TaskState::Submitted.can_transition_to(TaskState::Completed));
        assert!(TaskState::Working.can_transition_to(TaskState::InputRequired));
        assert!(TaskState::InputRequired.can_transition_to(TaskState::Working));
        assert!(!TaskState::Completed.can_transition_to(TaskState::Working));
    }

    #[test]
    fn test_state_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&TaskState::InputRequired).unwrap(),
            "\"input-required\""
        );
        assert_eq!(TaskState::InputRequired.to_string(), "input-required");
    }

    #[test]
    fn test_event_wire_shape() {
        let mut task = Task::new(None);
        task.status.state = TaskState::Completed;
        let event = TaskEvent::status_of(&task, 3);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "status");
        assert_eq!(json["state"], "completed");
        assert_eq!(json["final"], true);
        assert_eq!(json["sequence"], 3);
        assert_eq!(json["taskId"], task.id);
    }
}
