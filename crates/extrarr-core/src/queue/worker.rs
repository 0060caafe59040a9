//! The single sequential download worker.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::util::sleep_or_cancel;

use super::engine::{DownloadQueue, QUEUE_KEY};
use super::primitive::DownloadError;
use super::types::{DownloadStatus, QueueItem};

/// What one pass of the worker did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Nothing queued (or the queue could not be read).
    Idle,
    /// One item reached a terminal status and left the queue.
    Processed,
    /// The primitive signalled a rate limit; the item is back to `queued`.
    RateLimited,
}

impl DownloadQueue {
    /// Spawn the worker loop. It runs until `cancel` fires.
    pub fn spawn_worker(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        tokio::spawn(async move { queue.run_worker(cancel).await })
    }

    async fn run_worker(&self, cancel: CancellationToken) {
        tracing::info!("download worker started");
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let cancelled = match self.process_next(&cancel).await {
                Step::Processed => false,
                Step::Idle => sleep_or_cancel(self.cfg.poll_interval(), &cancel).await,
                Step::RateLimited => self.rate_limit_pause(&cancel).await,
            };
            if cancelled {
                break;
            }
        }
        tracing::info!("download worker stopped");
    }

    /// Take the first `queued` item through its state machine.
    pub(crate) async fn process_next(&self, cancel: &CancellationToken) -> Step {
        let entries = match self.raw_items().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("download worker: {:#}", e);
                return Step::Idle;
            }
        };
        let Some((index, stored, mut item)) = entries
            .into_iter()
            .enumerate()
            .find_map(|(i, (bytes, item))| match item {
                Some(item) if item.status == DownloadStatus::Queued => Some((i, bytes, item)),
                _ => None,
            })
        else {
            return Step::Idle;
        };

        match self
            .is_rejected(&item.youtube_id, item.media_type, item.media_id)
            .await
        {
            Ok(true) => {
                tracing::info!(youtube_id = %item.youtube_id, "extra was rejected, dropping without download");
                item.status = DownloadStatus::Rejected;
                item.reason = "rejected".to_string();
                self.record(&item);
                self.remove(&stored).await;
                self.forget(&item).await;
                return Step::Processed;
            }
            Ok(false) => {}
            Err(e) => tracing::warn!("rejection check failed, downloading anyway: {:#}", e),
        }

        item.status = DownloadStatus::Downloading;
        let stored = self.replace(index, stored, &item).await;
        self.record(&item);

        tracing::info!(
            youtube_id = %item.youtube_id,
            media_type = %item.media_type,
            media_id = item.media_id,
            extra = %item.extra_title,
            "downloading extra"
        );
        match self.primitive.download(&item.request()).await {
            Err(DownloadError::RateLimited(msg)) => {
                tracing::warn!(youtube_id = %item.youtube_id, "rate limited: {}", msg);
                item.status = DownloadStatus::Queued;
                item.reason = String::new();
                self.replace(index, stored, &item).await;
                self.record(&item);
                return Step::RateLimited;
            }
            Err(DownloadError::Failed(reason)) => {
                item.status = DownloadStatus::Failed;
                item.reason = reason;
            }
            Ok(outcome) if outcome.status.is_terminal() => {
                item.status = outcome.status;
                item.reason = outcome.reason;
            }
            Ok(outcome) => {
                item.status = DownloadStatus::Failed;
                item.reason = format!(
                    "download returned no usable result (status {})",
                    outcome.status.as_str()
                );
            }
        }

        tracing::info!(
            youtube_id = %item.youtube_id,
            status = item.status.as_str(),
            reason = %item.reason,
            "download finished"
        );
        let stored = self.replace(index, stored, &item).await;
        self.record(&item);

        // Let subscribers see the terminal state before the entry disappears.
        // On shutdown the entry is still removed, just without the delay.
        sleep_or_cancel(self.cfg.grace_delay(), cancel).await;
        self.remove(&stored).await;
        self.forget(&item).await;
        Step::Processed
    }

    /// Hold the worker for the configured rate-limit window, logging the
    /// remaining time periodically. Returns true if cancelled.
    async fn rate_limit_pause(&self, cancel: &CancellationToken) -> bool {
        let deadline = Instant::now() + self.cfg.rate_limit_pause();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::info!("rate-limit pause over, resuming downloads");
                return false;
            }
            tracing::info!(
                remaining_secs = remaining.as_secs(),
                "download worker paused by rate limit"
            );
            if sleep_or_cancel(remaining.min(self.cfg.rate_limit_log_every()), cancel).await {
                return true;
            }
        }
    }

    /// Overwrite the slot holding `stored` with `item`. The slot is `index`
    /// unless the list shifted, in which case the first equal entry is used.
    /// Returns the bytes now in the store (the old ones if the write failed).
    async fn replace(&self, index: usize, stored: Vec<u8>, item: &QueueItem) -> Vec<u8> {
        let bytes = match item.encode() {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("encode queue item: {}", e);
                return stored;
            }
        };
        let slot = match self.store.lrange(QUEUE_KEY, 0, -1).await {
            Ok(all) if all.get(index) == Some(&stored) => Some(index),
            Ok(all) => all.iter().position(|b| *b == stored),
            Err(e) => {
                tracing::warn!("read download queue: {}", e);
                None
            }
        };
        let Some(slot) = slot else {
            tracing::warn!(youtube_id = %item.youtube_id, "queue entry vanished, status not persisted");
            return stored;
        };
        match self.store.lset(QUEUE_KEY, slot as i64, &bytes).await {
            Ok(()) => bytes,
            Err(e) => {
                tracing::warn!("persist queue item: {}", e);
                stored
            }
        }
    }

    async fn remove(&self, stored: &[u8]) {
        if let Err(e) = self.store.lrem(QUEUE_KEY, 1, stored).await {
            tracing::warn!("remove queue entry: {}", e);
        }
    }
}
