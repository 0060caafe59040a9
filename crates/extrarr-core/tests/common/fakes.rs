//! Fake download primitive that records when each call started and ended.

use async_trait::async_trait;
use extrarr_core::queue::{
    DownloadError, DownloadOutcome, DownloadPrimitive, DownloadRequest, DownloadStatus,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Call {
    pub youtube_id: String,
    pub started: Instant,
    pub ended: Instant,
}

/// Downloads take `work` each. Ids listed in `rate_limit_once` are
/// rate limited on their first attempt only.
pub struct RecordingPrimitive {
    work: Duration,
    rate_limit_once: Mutex<HashMap<String, bool>>,
    calls: Mutex<Vec<Call>>,
}

impl RecordingPrimitive {
    pub fn new(work: Duration) -> Self {
        Self {
            work,
            rate_limit_once: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn rate_limit_first_attempt(self, youtube_id: &str) -> Self {
        self.rate_limit_once
            .lock()
            .unwrap()
            .insert(youtube_id.to_string(), false);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, youtube_id: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.youtube_id == youtube_id)
            .collect()
    }
}

#[async_trait]
impl DownloadPrimitive for RecordingPrimitive {
    async fn download(&self, req: &DownloadRequest) -> Result<DownloadOutcome, DownloadError> {
        let started = Instant::now();
        tokio::time::sleep(self.work).await;
        let limited = match self.rate_limit_once.lock().unwrap().get_mut(&req.youtube_id) {
            Some(tripped) if !*tripped => {
                *tripped = true;
                true
            }
            _ => false,
        };
        self.calls.lock().unwrap().push(Call {
            youtube_id: req.youtube_id.clone(),
            started,
            ended: Instant::now(),
        });
        if limited {
            return Err(DownloadError::RateLimited("HTTP Error 429: Too Many Requests".into()));
        }
        Ok(DownloadOutcome::new(DownloadStatus::Downloaded, ""))
    }
}
