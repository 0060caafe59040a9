//! In-memory task states, owned by the scheduler behind one lock.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::types::{TaskState, TaskStatus};

/// Registered task states keyed by id; `snapshot` keeps registration order.
#[derive(Debug)]
pub struct TaskStates {
    order: Vec<String>,
    inner: Mutex<HashMap<String, TaskState>>,
}

impl TaskStates {
    pub fn new(states: Vec<TaskState>) -> Self {
        let order = states.iter().map(|s| s.task_id.clone()).collect();
        let inner = states.into_iter().map(|s| (s.task_id.clone(), s)).collect();
        Self {
            order,
            inner: Mutex::new(inner),
        }
    }

    pub fn get(&self, id: &str) -> Option<TaskState> {
        self.lock().get(id).cloned()
    }

    pub fn snapshot(&self) -> Vec<TaskState> {
        let inner = self.lock();
        self.order
            .iter()
            .filter_map(|id| inner.get(id).cloned())
            .collect()
    }

    /// Flip one task to running. Returns false for unknown ids.
    pub fn mark_running(&self, id: &str) -> bool {
        match self.lock().get_mut(id) {
            Some(state) => {
                state.status = TaskStatus::Running;
                true
            }
            None => false,
        }
    }

    /// Back to idle after a run that ended at `ended`. `last_execution` never moves backwards.
    pub fn mark_finished(&self, id: &str, ended: DateTime<Utc>, duration_ms: u64) {
        if let Some(state) = self.lock().get_mut(id) {
            state.status = TaskStatus::Idle;
            state.last_duration_ms = duration_ms;
            state.last_execution = Some(match state.last_execution {
                Some(prev) if prev > ended => prev,
                _ => ended,
            });
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TaskState>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
