//! Durable task records kept in the coordination store.
//!
//! Values are JSON-serialized into the persister's byte payloads.

use serde::{Deserialize, Serialize};

/// Last reported status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Staging,
    Running,
    Finished,
    Failed,
    Killed,
    Lost,
}

impl TaskStatus {
    /// True once the task has stopped for good, successfully or not.
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Staging | TaskStatus::Running)
    }
}

/// Persisted state of one task of one pod instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskState {
    /// Full task name, e.g. `hello-0-server`.
    pub name: String,
    pub pod_type: String,
    pub pod_index: u32,
    pub status: TaskStatus,
    /// Set by an operator when the task's host is gone for good.
    #[serde(default)]
    pub permanently_failed: bool,
    /// Unix timestamp (seconds) of the last update.
    pub updated_at: u64,
}

impl TaskState {
    pub fn new(pod_type: &str, pod_index: u32, task: &str, status: TaskStatus) -> Self {
        Self {
            name: task_name(pod_type, pod_index, task),
            pod_type: pod_type.to_string(),
            pod_index,
            status,
            permanently_failed: false,
            updated_at: 0,
        }
    }
}

/// Full task name for a task of a pod instance: `<pod>-<index>-<task>`.
pub fn task_name(pod_type: &str, pod_index: u32, task: &str) -> String {
    format!("{pod_type}-{pod_index}-{task}")
}
