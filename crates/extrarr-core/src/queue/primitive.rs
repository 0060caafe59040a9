//! Collaborator seams: the download primitive and the media title lookup.

use async_trait::async_trait;
use thiserror::Error;

use crate::store::Store;

use super::types::{DownloadOutcome, DownloadRequest, MediaType};

/// Error returned by a download attempt.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The remote side asked us to back off. Pauses the whole worker.
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Any other failure; the message becomes the item's `reason`.
    #[error("{0}")]
    Failed(String),
}

/// Performs the actual fetch of one extra.
#[async_trait]
pub trait DownloadPrimitive: Send + Sync {
    async fn download(&self, req: &DownloadRequest) -> Result<DownloadOutcome, DownloadError>;
}

/// Resolves a display title for a media item, used to fill `mediaTitle` on enqueue.
#[async_trait]
pub trait TitleLookup: Send + Sync {
    async fn media_title(&self, media_type: MediaType, media_id: i64) -> Option<String>;
}

/// Title lookup backed by the hash `media:titles:<mediaType>` (field = media id),
/// which the catalog sync collaborators maintain.
#[derive(Clone)]
pub struct StoreTitles {
    store: Store,
}

impl StoreTitles {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn key(media_type: MediaType) -> String {
        format!("media:titles:{media_type}")
    }
}

#[async_trait]
impl TitleLookup for StoreTitles {
    async fn media_title(&self, media_type: MediaType, media_id: i64) -> Option<String> {
        match self
            .store
            .hget(&Self::key(media_type), &media_id.to_string())
            .await
        {
            Ok(bytes) => String::from_utf8(bytes).ok(),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                tracing::debug!(%media_type, media_id, "title lookup: {}", e);
                None
            }
        }
    }
}
