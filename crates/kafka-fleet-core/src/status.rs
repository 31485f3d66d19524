use crate::TaskId;
use serde::{Deserialize, Serialize};

/// Task state reported by the framework driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    Staging,
    Starting,
    Running,
    Finished,
    Failed,
    Killed,
    Lost,
    Error,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Staging => "TASK_STAGING",
            TaskState::Starting => "TASK_STARTING",
            TaskState::Running => "TASK_RUNNING",
            TaskState::Finished => "TASK_FINISHED",
            TaskState::Failed => "TASK_FAILED",
            TaskState::Killed => "TASK_KILLED",
            TaskState::Lost => "TASK_LOST",
            TaskState::Error => "TASK_ERROR",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "TASK_STAGING" => Some(TaskState::Staging),
            "TASK_STARTING" => Some(TaskState::Starting),
            "TASK_RUNNING" => Some(TaskState::Running),
            "TASK_FINISHED" => Some(TaskState::Finished),
            "TASK_FAILED" => Some(TaskState::Failed),
            "TASK_KILLED" => Some(TaskState::Killed),
            "TASK_LOST" => Some(TaskState::Lost),
            "TASK_ERROR" => Some(TaskState::Error),
            _ => None,
        }
    }

    /// True once the task can never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Finished
                | TaskState::Failed
                | TaskState::Killed
                | TaskState::Lost
                | TaskState::Error
        )
    }

    /// Terminal states that do not count as a broker failure
    pub fn is_clean_exit(&self) -> bool {
        matches!(self, TaskState::Finished | TaskState::Killed)
    }
}

/// A status update delivered by the driver for one task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub task_id: TaskId,
    pub state: TaskState,
    pub message: Option<String>,
    /// Driver-level acknowledgement token; opaque to the reconciler
    pub uuid: Option<String>,
}

impl StatusUpdate {
    pub fn new(task_id: impl Into<TaskId>, state: TaskState) -> Self {
        StatusUpdate {
            task_id: task_id.into(),
            state,
            message: None,
            uuid: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_name_roundtrip() {
        for state in [
            TaskState::Staging,
            TaskState::Starting,
            TaskState::Running,
            TaskState::Finished,
            TaskState::Failed,
            TaskState::Killed,
            TaskState::Lost,
            TaskState::Error,
        ] {
            assert_eq!(TaskState::from_str(state.as_str()), Some(state));
        }
        assert_eq!(TaskState::from_str("TASK_BOGUS"), None);
    }

    #[test]
    fn test_terminal_classification() {
        assert!(!TaskState::Running.is_terminal());
        assert!(!TaskState::Staging.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Lost.is_terminal());

        assert!(TaskState::Finished.is_clean_exit());
        assert!(TaskState::Killed.is_clean_exit());
        assert!(!TaskState::Failed.is_clean_exit());
        assert!(!TaskState::Lost.is_clean_exit());
    }
}
