//! Periodic task scheduler with one cross-task ordering rule.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broadcast::{Broadcaster, Subscription};
use crate::config::SchedulerConfig;
use crate::store::Store;
use crate::util::sleep_or_cancel;

use super::history::RunHistory;
use super::state::TaskStates;
use super::types::{RunStatus, TaskRunRecord, TaskState};

/// Scalar key holding every task's persisted state.
pub const TASKS_KEY: &str = "scheduler:tasks";

/// Work performed by one scheduled task.
#[async_trait]
pub trait TaskBody: Send + Sync {
    /// Run once. Long bodies should check `cancel` between units of work.
    async fn run(&self, cancel: CancellationToken) -> Result<()>;
}

/// Static registration of one task.
#[derive(Clone)]
pub struct TaskSpec {
    pub id: String,
    pub name: String,
    pub interval: Duration,
    /// Position in snapshots (lower first).
    pub order: u32,
    pub body: Arc<dyn TaskBody>,
}

/// `downstream` never starts a scheduled run before both `upstream` tasks
/// have completed at least once.
#[derive(Debug, Clone)]
pub struct OrderingRule {
    pub downstream: String,
    pub upstream: [String; 2],
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("unknown task: {0}")]
    UnknownTask(String),
}

/// Answer to a manual run request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceRun {
    Started,
    /// A run of the same task is in flight; nothing was started.
    AlreadyRunning,
}

pub struct Scheduler {
    store: Store,
    cfg: SchedulerConfig,
    specs: Vec<TaskSpec>,
    rule: Option<OrderingRule>,
    states: TaskStates,
    guards: HashMap<String, Arc<Mutex<()>>>,
    history: RunHistory,
    feed: Arc<Broadcaster>,
    cancel: CancellationToken,
}

impl Scheduler {
    /// Build the scheduler from its registrations and persisted state.
    ///
    /// Persisted states are matched by id; unknown persisted ids are dropped and
    /// new ids start idle with no last execution. History records left
    /// `running` by a previous process are rewritten to `queued`.
    pub async fn load(
        store: Store,
        cfg: SchedulerConfig,
        mut specs: Vec<TaskSpec>,
        rule: Option<OrderingRule>,
        feed: Arc<Broadcaster>,
        cancel: CancellationToken,
    ) -> Result<Arc<Self>> {
        specs.sort_by_key(|s| s.order);

        let persisted = match store.get(TASKS_KEY).await {
            Ok(bytes) => match serde_json::from_slice::<Vec<TaskState>>(&bytes) {
                Ok(states) => states,
                Err(e) => {
                    tracing::warn!("ignoring undecodable task states: {}", e);
                    Vec::new()
                }
            },
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e).context("read task states"),
        };
        let mut persisted: HashMap<String, TaskState> = persisted
            .into_iter()
            .map(|s| (s.task_id.clone(), s))
            .collect();

        let states = specs
            .iter()
            .map(|spec| {
                let mut state = TaskState::idle(&spec.id, &spec.name, spec.interval.as_secs());
                if let Some(prev) = persisted.remove(&spec.id) {
                    state.last_execution = prev.last_execution;
                    state.last_duration_ms = prev.last_duration_ms;
                }
                state
            })
            .collect();

        let history = RunHistory::new(store.clone(), cfg.history_cap);
        let recovered = history
            .recover_running()
            .await
            .context("recover run history")?;
        if recovered > 0 {
            tracing::info!("marked {} interrupted task run(s) as queued", recovered);
        }

        let guards = specs
            .iter()
            .map(|s| (s.id.clone(), Arc::new(Mutex::new(()))))
            .collect();

        let scheduler = Arc::new(Self {
            store,
            cfg,
            specs,
            rule,
            states: TaskStates::new(states),
            guards,
            history,
            feed,
            cancel,
        });
        scheduler.persist_states().await;
        Ok(scheduler)
    }

    /// Spawn one worker per registered task.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        self.specs
            .iter()
            .map(|spec| {
                let this = Arc::clone(self);
                let id = spec.id.clone();
                tokio::spawn(async move { this.task_worker(id).await })
            })
            .collect()
    }

    pub fn snapshot(&self) -> Vec<TaskState> {
        self.states.snapshot()
    }

    pub fn state(&self, id: &str) -> Option<TaskState> {
        self.states.get(id)
    }

    pub fn subscribe(&self) -> Subscription {
        self.feed.subscribe(&self.snapshot())
    }

    pub fn feed(&self) -> &Arc<Broadcaster> {
        &self.feed
    }

    pub async fn history(&self) -> Result<Vec<TaskRunRecord>> {
        self.history.list().await
    }

    /// Run a task now, outside its interval. Returns as soon as the run is
    /// launched; completion shows up in the feed and the history.
    pub fn force_run(self: &Arc<Self>, id: &str) -> Result<ForceRun, SchedulerError> {
        let spec = self
            .spec(id)
            .ok_or_else(|| SchedulerError::UnknownTask(id.to_string()))?;
        tracing::info!(task = id, "manual run requested");
        Ok(self.launch(spec))
    }

    fn spec(&self, id: &str) -> Option<&TaskSpec> {
        self.specs.iter().find(|s| s.id == id)
    }

    /// Claim the task's run guard, flip it to running and spawn the body.
    fn launch(self: &Arc<Self>, spec: &TaskSpec) -> ForceRun {
        let Some(guard) = self
            .guards
            .get(&spec.id)
            .and_then(|g| Arc::clone(g).try_lock_owned().ok())
        else {
            tracing::info!(task = %spec.id, "task already running, skipped");
            return ForceRun::AlreadyRunning;
        };
        let queued_at = Utc::now();
        self.states.mark_running(&spec.id);
        self.feed.broadcast(&self.snapshot());

        let this = Arc::clone(self);
        let id = spec.id.clone();
        let body = Arc::clone(&spec.body);
        tokio::spawn(async move { this.run_async(id, body, queued_at, guard).await });
        ForceRun::Started
    }

    /// Execute one run of an already-claimed task and record its outcome.
    /// `queued_at` is when the tick or force-run claimed the guard.
    async fn run_async(
        &self,
        id: String,
        body: Arc<dyn TaskBody>,
        queued_at: DateTime<Utc>,
        _guard: OwnedMutexGuard<()>,
    ) {
        let started = Instant::now();
        let mut record = TaskRunRecord {
            task_id: id.clone(),
            queued_at,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            status: RunStatus::Running,
            error: None,
        };
        let stored = match self.history.append(&record).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(task = %id, "record run start: {:#}", e);
                None
            }
        };

        tracing::info!(task = %id, "task started");
        // Own task so a panicking body still lands as a failed run.
        let cancel = self.cancel.child_token();
        let outcome = match tokio::spawn(async move { body.run(cancel).await }).await {
            Ok(result) => result,
            Err(join) => Err(anyhow::anyhow!("task body aborted: {}", join)),
        };

        let ended = Utc::now();
        let duration_ms = started.elapsed().as_millis() as u64;
        self.states.mark_finished(&id, ended, duration_ms);
        self.persist_states().await;

        record.ended_at = Some(ended);
        record.duration_ms = Some(duration_ms);
        match outcome {
            Ok(()) => {
                record.status = RunStatus::Success;
                tracing::info!(task = %id, duration_ms, "task finished");
            }
            Err(e) => {
                record.status = RunStatus::Failed;
                record.error = Some(format!("{:#}", e));
                tracing::warn!(task = %id, duration_ms, "task failed: {:#}", e);
            }
        }
        let saved = match &stored {
            Some(prev) => self.history.update(prev, &record).await,
            None => self.history.append(&record).await.map(|_| ()),
        };
        if let Err(e) = saved {
            tracing::warn!(task = %id, "record run end: {:#}", e);
        }

        self.feed.broadcast(&self.snapshot());
    }

    async fn persist_states(&self) {
        let states = self.snapshot();
        let bytes = match serde_json::to_vec(&states) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("encode task states: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.set(TASKS_KEY, &bytes).await {
            tracing::warn!("persist task states: {}", e);
        }
    }

    /// Delay before the first scheduled run: what is left of the interval
    /// since the last execution, or zero.
    pub(crate) fn initial_delay(&self, id: &str, interval: Duration) -> Duration {
        let Some(last) = self.states.get(id).and_then(|s| s.last_execution) else {
            return Duration::ZERO;
        };
        let elapsed = (Utc::now() - last).to_std().unwrap_or(Duration::ZERO);
        interval.saturating_sub(elapsed)
    }

    /// True when `id` is gated and at least one upstream task has never run.
    pub(crate) fn blocked_by_ordering(&self, id: &str) -> bool {
        let Some(rule) = self.rule.as_ref().filter(|r| r.downstream == id) else {
            return false;
        };
        rule.upstream.iter().any(|up| {
            self.states
                .get(up)
                .map_or(true, |s| s.last_execution.is_none())
        })
    }

    async fn task_worker(self: Arc<Self>, id: String) {
        let Some(spec) = self.spec(&id).cloned() else {
            return;
        };
        let delay = self.initial_delay(&id, spec.interval);
        tracing::debug!(task = %id, delay_secs = delay.as_secs(), "task worker started");
        if sleep_or_cancel(delay, &self.cancel).await {
            return;
        }

        loop {
            let mut announced = false;
            while self.blocked_by_ordering(&id) {
                if !announced {
                    tracing::info!(task = %id, "waiting for upstream tasks to run once");
                    announced = true;
                }
                if sleep_or_cancel(self.cfg.dependency_poll(), &self.cancel).await {
                    return;
                }
            }

            self.launch(&spec);

            if sleep_or_cancel(spec.interval, &self.cancel).await {
                return;
            }
        }
    }

    /// True while any run is in flight, including its history bookkeeping.
    pub fn any_running(&self) -> bool {
        self.guards.values().any(|g| g.try_lock().is_err())
    }

    /// Wait for in-flight runs to finish, polling up to `limit`. Used on
    /// shutdown after cancelling so bodies can record their outcome.
    /// Returns false if some task was still running at the deadline.
    pub async fn wait_idle(&self, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while self.any_running() {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        true
    }
}
