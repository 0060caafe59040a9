//! Extras search: the downstream task that feeds the download queue.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::queue::{DownloadQueue, DownloadRequest, MediaType};
use crate::store::Store;
use crate::util::sleep_or_cancel;

use super::scheduler::TaskBody;

/// Hash key of wanted extras, field = `<mediaType>:<mediaId>`.
pub const WANTED_KEY: &str = "extras:wanted";

/// One extra a provider search turned up for a media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraCandidate {
    pub extra_type: String,
    pub extra_title: String,
    pub youtube_id: String,
}

/// A media item with the extras still wanted for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WantedMedia {
    pub media_type: MediaType,
    pub media_id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub extras: Vec<ExtraCandidate>,
}

/// Where the extras search gets its work from.
#[async_trait]
pub trait ExtrasSource: Send + Sync {
    async fn wanted(&self) -> Result<Vec<WantedMedia>>;
}

/// Reads wanted extras from the store, as written by the sync collaborators.
#[derive(Clone)]
pub struct StoreExtrasSource {
    store: Store,
}

impl StoreExtrasSource {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn field(media_type: MediaType, media_id: i64) -> String {
        format!("{media_type}:{media_id}")
    }

    /// Record the wanted extras for one media item (replaces earlier ones).
    pub async fn put(&self, media: &WantedMedia) -> Result<()> {
        let bytes = serde_json::to_vec(media).context("encode wanted media")?;
        self.store
            .hset(WANTED_KEY, &Self::field(media.media_type, media.media_id), &bytes)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ExtrasSource for StoreExtrasSource {
    async fn wanted(&self) -> Result<Vec<WantedMedia>> {
        let raw = self.store.hvals(WANTED_KEY).await?;
        Ok(raw
            .iter()
            .filter_map(|b| match serde_json::from_slice(b) {
                Ok(m) => Some(m),
                Err(e) => {
                    tracing::warn!("skipping undecodable wanted entry: {}", e);
                    None
                }
            })
            .collect())
    }
}

/// Walks wanted media and enqueues their extras, one media item at a time.
///
/// Before each media item it polls until the download queue holds no
/// `queued` entries, so a run never floods the queue. Cancellation is
/// checked between media items and between extras; anything already
/// enqueued stays enqueued.
pub struct ExtrasSearch {
    source: Arc<dyn ExtrasSource>,
    queue: Arc<DownloadQueue>,
    drain_poll: Duration,
}

impl ExtrasSearch {
    pub fn new(source: Arc<dyn ExtrasSource>, queue: Arc<DownloadQueue>, drain_poll: Duration) -> Self {
        Self {
            source,
            queue,
            drain_poll,
        }
    }

    /// Poll until nothing is `queued`. Returns false if cancelled first.
    async fn wait_for_drain(&self, cancel: &CancellationToken) -> bool {
        loop {
            match self.queue.has_queued().await {
                Ok(false) => return true,
                Ok(true) => {}
                Err(e) => tracing::warn!("extras search: queue check failed: {:#}", e),
            }
            if sleep_or_cancel(self.drain_poll, cancel).await {
                return false;
            }
        }
    }
}

#[async_trait]
impl TaskBody for ExtrasSearch {
    async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let wanted = self.source.wanted().await.context("list wanted extras")?;
        tracing::info!(media = wanted.len(), "extras search started");
        let mut enqueued = 0usize;

        for media in wanted {
            if cancel.is_cancelled() {
                tracing::info!("extras search cancelled");
                return Ok(());
            }
            if media.extras.is_empty() {
                continue;
            }
            if !self.wait_for_drain(&cancel).await {
                tracing::info!("extras search cancelled while waiting for queue");
                return Ok(());
            }

            for extra in &media.extras {
                if cancel.is_cancelled() {
                    tracing::info!("extras search cancelled");
                    return Ok(());
                }
                match self
                    .queue
                    .is_rejected(&extra.youtube_id, media.media_type, media.media_id)
                    .await
                {
                    Ok(true) => continue,
                    Ok(false) => {}
                    Err(e) => tracing::warn!("extras search: rejection check: {:#}", e),
                }
                let req = DownloadRequest {
                    media_type: media.media_type,
                    media_id: media.media_id,
                    media_title: media.title.clone(),
                    extra_type: extra.extra_type.clone(),
                    extra_title: extra.extra_title.clone(),
                    youtube_id: extra.youtube_id.clone(),
                };
                self.queue.enqueue(req, "extras_search").await?;
                enqueued += 1;
            }
        }

        tracing::info!(enqueued, "extras search finished");
        Ok(())
    }
}
