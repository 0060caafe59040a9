//! Types used by the task scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Live status of a registered task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Idle,
    Running,
}

/// Live and persisted state of one registered task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskState {
    pub task_id: String,
    pub name: String,
    pub interval_secs: u64,
    /// None until the task has completed once.
    pub last_execution: Option<DateTime<Utc>>,
    pub last_duration_ms: u64,
    pub status: TaskStatus,
}

impl TaskState {
    pub fn idle(task_id: &str, name: &str, interval_secs: u64) -> Self {
        Self {
            task_id: task_id.to_string(),
            name: name.to_string(),
            interval_secs,
            last_execution: None,
            last_duration_ms: 0,
            status: TaskStatus::Idle,
        }
    }
}

/// Outcome of one recorded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Only produced by startup recovery: the run's fate is unknown.
    Queued,
    Running,
    Success,
    Failed,
}

/// One entry of the capped run history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunRecord {
    pub task_id: String,
    pub queued_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
