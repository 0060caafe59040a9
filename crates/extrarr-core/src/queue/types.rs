//! Types used by the download queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of media an extra belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaType::Movie),
            "tv" => Ok(MediaType::Tv),
            other => Err(format!("unknown media type: {other}")),
        }
    }
}

/// Per-item download state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Queued,
    Downloading,
    Downloaded,
    Failed,
    Rejected,
    Exists,
    Missing,
}

impl DownloadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DownloadStatus::Queued => "queued",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Downloaded => "downloaded",
            DownloadStatus::Failed => "failed",
            DownloadStatus::Rejected => "rejected",
            DownloadStatus::Exists => "exists",
            DownloadStatus::Missing => "missing",
        }
    }

    /// No further automatic transition happens from a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DownloadStatus::Downloaded
                | DownloadStatus::Failed
                | DownloadStatus::Rejected
                | DownloadStatus::Exists
        )
    }
}

/// What callers hand to the queue, and what the download primitive receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub media_type: MediaType,
    pub media_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_title: Option<String>,
    pub extra_type: String,
    pub extra_title: String,
    pub youtube_id: String,
}

/// Result reported by the download primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub status: DownloadStatus,
    pub reason: String,
}

impl DownloadOutcome {
    pub fn new(status: DownloadStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }
}

/// One persisted entry of the download queue.
///
/// Stored as camelCase JSON. The identity `(youtubeId, mediaType, mediaId)`
/// is not unique: the same extra may be queued twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub media_type: MediaType,
    pub media_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_title: Option<String>,
    pub extra_type: String,
    pub extra_title: String,
    pub youtube_id: String,
    pub queued_at: DateTime<Utc>,
    pub status: DownloadStatus,
    #[serde(default)]
    pub reason: String,
}

impl QueueItem {
    /// A fresh `queued` item stamped with the current time.
    pub fn queued(req: DownloadRequest) -> Self {
        Self {
            media_type: req.media_type,
            media_id: req.media_id,
            media_title: req.media_title,
            extra_type: req.extra_type,
            extra_title: req.extra_title,
            youtube_id: req.youtube_id,
            queued_at: Utc::now(),
            status: DownloadStatus::Queued,
            reason: String::new(),
        }
    }

    /// Identity key: `youtubeId:mediaType:mediaId`.
    pub fn identity(&self) -> String {
        identity(&self.youtube_id, self.media_type, self.media_id)
    }

    pub fn request(&self) -> DownloadRequest {
        DownloadRequest {
            media_type: self.media_type,
            media_id: self.media_id,
            media_title: self.media_title.clone(),
            extra_type: self.extra_type.clone(),
            extra_title: self.extra_title.clone(),
            youtube_id: self.youtube_id.clone(),
        }
    }

    pub(crate) fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub(crate) fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

pub(crate) fn identity(youtube_id: &str, media_type: MediaType, media_id: i64) -> String {
    format!("{youtube_id}:{media_type}:{media_id}")
}
