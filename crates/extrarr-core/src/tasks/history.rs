//! Capped run history persisted as a store list.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::store::Store;

use super::types::{RunStatus, TaskRunRecord};

/// List key of the run history.
pub const HISTORY_KEY: &str = "scheduler:history";

/// Writes are serialized so a lookup-then-`lset` never races another run's append.
#[derive(Clone)]
pub struct RunHistory {
    store: Store,
    cap: usize,
    writes: Arc<Mutex<()>>,
}

impl RunHistory {
    pub fn new(store: Store, cap: usize) -> Self {
        Self {
            store,
            cap: cap.max(1),
            writes: Arc::new(Mutex::new(())),
        }
    }

    /// Append a record and evict the oldest beyond the cap. Returns the stored bytes.
    pub async fn append(&self, record: &TaskRunRecord) -> Result<Vec<u8>> {
        let _w = self.writes.lock().await;
        self.push(record).await
    }

    async fn push(&self, record: &TaskRunRecord) -> Result<Vec<u8>> {
        let bytes = serde_json::to_vec(record).context("encode run record")?;
        let len = self.store.rpush(HISTORY_KEY, &bytes).await?;
        if len > self.cap {
            self.store.ltrim(HISTORY_KEY, -(self.cap as i64), -1).await?;
        }
        Ok(bytes)
    }

    /// Replace a previously appended record (found by its stored bytes).
    /// If it was evicted meanwhile, the finished record is appended instead.
    pub async fn update(&self, previous: &[u8], record: &TaskRunRecord) -> Result<()> {
        let _w = self.writes.lock().await;
        let bytes = serde_json::to_vec(record).context("encode run record")?;
        let all = self.store.lrange(HISTORY_KEY, 0, -1).await?;
        match all.iter().position(|b| b == previous) {
            Some(pos) => self.store.lset(HISTORY_KEY, pos as i64, &bytes).await?,
            None => {
                self.push(record).await?;
            }
        }
        Ok(())
    }

    /// All records, oldest first. Undecodable entries are skipped.
    pub async fn list(&self) -> Result<Vec<TaskRunRecord>> {
        let raw = self.store.lrange(HISTORY_KEY, 0, -1).await?;
        Ok(raw
            .iter()
            .filter_map(|b| match serde_json::from_slice(b) {
                Ok(r) => Some(r),
                Err(e) => {
                    tracing::warn!("skipping undecodable run record: {}", e);
                    None
                }
            })
            .collect())
    }

    /// Rewrite records left `running` by a previous process to `queued`.
    /// Returns the number of records rewritten.
    pub async fn recover_running(&self) -> Result<usize> {
        let _w = self.writes.lock().await;
        let raw = self.store.lrange(HISTORY_KEY, 0, -1).await?;
        let mut rewritten = 0;
        for (pos, bytes) in raw.iter().enumerate() {
            let Ok(mut record) = serde_json::from_slice::<TaskRunRecord>(bytes) else {
                continue;
            };
            if record.status != RunStatus::Running {
                continue;
            }
            record.status = RunStatus::Queued;
            let updated = serde_json::to_vec(&record).context("encode run record")?;
            self.store.lset(HISTORY_KEY, pos as i64, &updated).await?;
            rewritten += 1;
        }
        Ok(rewritten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(task_id: &str, status: RunStatus) -> TaskRunRecord {
        let now = Utc::now();
        TaskRunRecord {
            task_id: task_id.to_string(),
            queued_at: now,
            started_at: now,
            ended_at: None,
            duration_ms: None,
            status,
            error: None,
        }
    }

    #[tokio::test]
    async fn cap_evicts_oldest() {
        let store = Store::open_memory().await.unwrap();
        let history = RunHistory::new(store, 3);
        for i in 0..5 {
            history
                .append(&record(&format!("t{i}"), RunStatus::Success))
                .await
                .unwrap();
        }
        let ids: Vec<String> = history
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.task_id)
            .collect();
        assert_eq!(ids, ["t2", "t3", "t4"]);
    }

    #[tokio::test]
    async fn update_replaces_in_place() {
        let store = Store::open_memory().await.unwrap();
        let history = RunHistory::new(store, 10);
        history.append(&record("a", RunStatus::Success)).await.unwrap();
        let mut running = record("b", RunStatus::Running);
        let stored = history.append(&running).await.unwrap();
        history.append(&record("c", RunStatus::Success)).await.unwrap();

        running.status = RunStatus::Failed;
        running.error = Some("boom".into());
        history.update(&stored, &running).await.unwrap();

        let all = history.list().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].task_id, "b");
        assert_eq!(all[1].status, RunStatus::Failed);
        assert_eq!(all[1].error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn update_of_evicted_record_appends() {
        let store = Store::open_memory().await.unwrap();
        let history = RunHistory::new(store, 1);
        let mut running = record("a", RunStatus::Running);
        let stored = history.append(&running).await.unwrap();
        history.append(&record("b", RunStatus::Success)).await.unwrap();

        running.status = RunStatus::Success;
        history.update(&stored, &running).await.unwrap();
        let all = history.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].task_id, "a");
        assert_eq!(all[0].status, RunStatus::Success);
    }

    #[tokio::test]
    async fn recover_rewrites_running_to_queued() {
        let store = Store::open_memory().await.unwrap();
        let history = RunHistory::new(store, 10);
        history.append(&record("a", RunStatus::Success)).await.unwrap();
        history.append(&record("b", RunStatus::Running)).await.unwrap();
        history.append(&record("c", RunStatus::Failed)).await.unwrap();

        assert_eq!(history.recover_running().await.unwrap(), 1);
        let statuses: Vec<RunStatus> = history
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.status)
            .collect();
        assert_eq!(
            statuses,
            [RunStatus::Success, RunStatus::Queued, RunStatus::Failed]
        );
        assert_eq!(history.recover_running().await.unwrap(), 0);
    }
}
