//! Fan-out of full status snapshots to live subscribers.
//!
//! Each subscriber owns a bounded outbox. Publishing serializes the snapshot
//! once and offers it to every outbox with `try_send`, so a slow or dead peer
//! never stalls the component that changed state. A full outbox loses that
//! snapshot (the next one supersedes it); a closed outbox is dropped.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Identifier handed out on subscribe.
pub type SubscriberId = u64;

/// A registered subscriber: receives one serialized snapshot per change.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub rx: mpsc::Receiver<Arc<str>>,
}

/// Publisher for one watched domain (download queue or task scheduler).
#[derive(Debug)]
pub struct Broadcaster {
    domain: &'static str,
    buffer: usize,
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<Arc<str>>>>,
}

impl Broadcaster {
    /// `buffer` is the per-subscriber outbox capacity (at least 1).
    pub fn new(domain: &'static str, buffer: usize) -> Self {
        Self {
            domain,
            buffer: buffer.max(1),
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Register a subscriber and queue `current` as its first message.
    pub fn subscribe<T: Serialize>(&self, current: &T) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer);
        match serde_json::to_string(current) {
            Ok(json) => {
                // Fresh channel with capacity >= 1: cannot be full.
                let _ = tx.try_send(Arc::from(json));
            }
            Err(e) => tracing::warn!(domain = self.domain, "serialize initial snapshot: {}", e),
        }
        self.lock().insert(id, tx);
        tracing::debug!(domain = self.domain, subscriber = id, "subscriber connected");
        Subscription { id, rx }
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.lock().remove(&id).is_some() {
            tracing::debug!(domain = self.domain, subscriber = id, "subscriber disconnected");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Serialize `snapshot` once and offer it to every live subscriber.
    pub fn broadcast<T: Serialize>(&self, snapshot: &T) {
        let json: Arc<str> = match serde_json::to_string(snapshot) {
            Ok(s) => Arc::from(s),
            Err(e) => {
                tracing::warn!(domain = self.domain, "serialize snapshot: {}", e);
                return;
            }
        };
        let mut subscribers = self.lock();
        subscribers.retain(|id, tx| match tx.try_send(Arc::clone(&json)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    domain = self.domain,
                    subscriber = *id,
                    "subscriber outbox full, snapshot dropped"
                );
                true
            }
            Err(TrySendError::Closed(_)) => {
                tracing::info!(domain = self.domain, subscriber = *id, "subscriber gone, removing");
                false
            }
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<Arc<str>>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
