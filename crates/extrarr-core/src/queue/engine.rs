//! Queue state: persisted list, in-memory status cache, rejection markers.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::broadcast::{Broadcaster, Subscription};
use crate::config::QueueConfig;
use crate::store::Store;

use super::primitive::{DownloadPrimitive, TitleLookup};
use super::types::{identity, DownloadRequest, DownloadStatus, MediaType, QueueItem};

/// List key holding the persisted download queue.
pub const QUEUE_KEY: &str = "download:queue";
/// Hash key of rejection markers, field = item identity.
pub const REJECTED_KEY: &str = "download:rejected";

/// Durable download queue plus its single worker's dependencies.
///
/// The store is authoritative; the status cache (identity -> last known item)
/// only feeds the live snapshot and `status_of`. It holds exactly the
/// identities still persisted, and `load_cache` rebuilds it after a restart.
pub struct DownloadQueue {
    pub(super) store: Store,
    pub(super) cfg: QueueConfig,
    pub(super) primitive: Arc<dyn DownloadPrimitive>,
    titles: Arc<dyn TitleLookup>,
    feed: Arc<Broadcaster>,
    status: Mutex<HashMap<String, QueueItem>>,
}

impl DownloadQueue {
    pub fn new(
        store: Store,
        cfg: QueueConfig,
        primitive: Arc<dyn DownloadPrimitive>,
        titles: Arc<dyn TitleLookup>,
        feed: Arc<Broadcaster>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            cfg,
            primitive,
            titles,
            feed,
            status: Mutex::new(HashMap::new()),
        })
    }

    /// Append a download request. Always appends, even if the same extra is
    /// already queued; `source` is only logged.
    pub async fn enqueue(&self, req: DownloadRequest, source: &str) -> Result<QueueItem> {
        let mut item = QueueItem::queued(req);
        if item.media_title.is_none() {
            item.media_title = self.titles.media_title(item.media_type, item.media_id).await;
        }
        let bytes = item.encode().context("encode queue item")?;
        self.store
            .rpush(QUEUE_KEY, &bytes)
            .await
            .context("persist queue item")?;
        tracing::info!(
            source,
            youtube_id = %item.youtube_id,
            media_type = %item.media_type,
            media_id = item.media_id,
            extra = %item.extra_title,
            "download queued"
        );
        self.record(&item);
        Ok(item)
    }

    /// Current status snapshot, oldest first.
    pub fn snapshot(&self) -> Vec<QueueItem> {
        let mut items: Vec<QueueItem> = self.cache().values().cloned().collect();
        items.sort_by(|a, b| {
            a.queued_at
                .cmp(&b.queued_at)
                .then_with(|| a.youtube_id.cmp(&b.youtube_id))
        });
        items
    }

    /// Last known status of an identity (`youtubeId:mediaType:mediaId`).
    pub fn status_of(&self, identity: &str) -> Option<DownloadStatus> {
        self.cache().get(identity).map(|i| i.status)
    }

    /// Join the live feed; the current snapshot is delivered first.
    pub fn subscribe(&self) -> Subscription {
        self.feed.subscribe(&self.snapshot())
    }

    pub fn feed(&self) -> &Arc<Broadcaster> {
        &self.feed
    }

    /// Every persisted item, in queue order. Undecodable entries are skipped.
    pub async fn items(&self) -> Result<Vec<QueueItem>> {
        Ok(self
            .raw_items()
            .await?
            .into_iter()
            .filter_map(|(_, item)| item)
            .collect())
    }

    /// Persisted items still waiting for the worker.
    pub async fn pending(&self) -> Result<Vec<QueueItem>> {
        Ok(self
            .items()
            .await?
            .into_iter()
            .filter(|i| i.status == DownloadStatus::Queued)
            .collect())
    }

    pub async fn has_queued(&self) -> Result<bool> {
        Ok(!self.pending().await?.is_empty())
    }

    /// Persist a rejection marker; matching items are dropped instead of downloaded.
    pub async fn mark_rejected(
        &self,
        youtube_id: &str,
        media_type: MediaType,
        media_id: i64,
    ) -> Result<()> {
        let marker = serde_json::json!({ "rejectedAt": Utc::now() });
        self.store
            .hset(
                REJECTED_KEY,
                &identity(youtube_id, media_type, media_id),
                marker.to_string().as_bytes(),
            )
            .await
            .context("persist rejection marker")?;
        Ok(())
    }

    pub async fn is_rejected(
        &self,
        youtube_id: &str,
        media_type: MediaType,
        media_id: i64,
    ) -> Result<bool> {
        match self
            .store
            .hget(REJECTED_KEY, &identity(youtube_id, media_type, media_id))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e).context("read rejection marker"),
        }
    }

    /// Raw entries with their decoded form (None if the bytes don't decode).
    pub(super) async fn raw_items(&self) -> Result<Vec<(Vec<u8>, Option<QueueItem>)>> {
        let raw = self
            .store
            .lrange(QUEUE_KEY, 0, -1)
            .await
            .context("read download queue")?;
        Ok(raw
            .into_iter()
            .map(|bytes| {
                let item = match QueueItem::decode(&bytes) {
                    Ok(item) => Some(item),
                    Err(e) => {
                        tracing::warn!("skipping undecodable queue entry: {}", e);
                        None
                    }
                };
                (bytes, item)
            })
            .collect())
    }

    /// Rebuild the status cache from the persisted queue and publish it.
    /// When an identity is queued more than once, the entry nearest the head wins.
    /// Returns the number of cached identities.
    pub async fn load_cache(&self) -> Result<usize> {
        let items = self.items().await?;
        let mut rebuilt: HashMap<String, QueueItem> = HashMap::with_capacity(items.len());
        for item in items {
            rebuilt.entry(item.identity()).or_insert(item);
        }
        let count = rebuilt.len();
        *self.cache() = rebuilt;
        self.feed.broadcast(&self.snapshot());
        tracing::debug!(count, "download status cache loaded");
        Ok(count)
    }

    /// Drop `item`'s identity from the cache after its entry left the queue.
    /// If a duplicate with the same identity is still persisted, the cache
    /// follows that entry instead.
    pub(super) async fn forget(&self, item: &QueueItem) {
        let id = item.identity();
        let remaining = match self.items().await {
            Ok(items) => items.into_iter().find(|i| i.identity() == id),
            Err(e) => {
                tracing::warn!("download status cache: {:#}", e);
                None
            }
        };
        {
            let mut cache = self.cache();
            // A concurrent enqueue already replaced the entry; leave it.
            if cache.get(&id) != Some(item) {
                return;
            }
            match remaining {
                Some(next) => cache.insert(id, next),
                None => cache.remove(&id),
            };
        }
        self.feed.broadcast(&self.snapshot());
    }

    /// Update the status cache and push the full snapshot to subscribers.
    pub(super) fn record(&self, item: &QueueItem) {
        self.cache().insert(item.identity(), item.clone());
        self.feed.broadcast(&self.snapshot());
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, QueueItem>> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
