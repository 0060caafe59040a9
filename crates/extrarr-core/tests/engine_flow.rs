//! Integration tests: download worker and scheduler driven end to end against
//! a real store with a recording fake primitive.

mod common;

use common::fakes::RecordingPrimitive;
use extrarr_core::broadcast::Broadcaster;
use extrarr_core::config::{ExtrarrConfig, QueueConfig};
use extrarr_core::queue::{DownloadQueue, DownloadRequest, DownloadStatus, MediaType, StoreTitles};
use extrarr_core::store::Store;
use extrarr_core::tasks::{
    default_tasks, ExtraCandidate, RunStatus, Scheduler, StoreExtrasSource, WantedMedia,
    EXTRAS_SEARCH,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

fn request(youtube_id: &str) -> DownloadRequest {
    DownloadRequest {
        media_type: MediaType::Movie,
        media_id: 603,
        media_title: Some("The Matrix".into()),
        extra_type: "Trailers".into(),
        extra_title: format!("Trailer {youtube_id}"),
        youtube_id: youtube_id.into(),
    }
}

fn queue_with(store: &Store, cfg: QueueConfig, primitive: Arc<RecordingPrimitive>) -> Arc<DownloadQueue> {
    DownloadQueue::new(
        store.clone(),
        cfg,
        primitive,
        Arc::new(StoreTitles::new(store.clone())),
        Arc::new(Broadcaster::new("downloads", 64)),
    )
}

/// Poll until the persisted queue is empty (or give up after `limit`).
async fn wait_empty(queue: &DownloadQueue, limit: Duration) {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if queue.items().await.unwrap().is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("queue did not drain in {:?}", limit);
}

#[tokio::test]
async fn items_are_served_one_at_a_time_with_grace() {
    let dir = tempdir().unwrap();
    let store = Store::open_at(dir.path().join("store.db")).await.unwrap();
    let primitive = Arc::new(RecordingPrimitive::new(Duration::from_millis(30)));
    let cfg = QueueConfig {
        poll_interval_ms: 10,
        grace_delay_ms: 80,
        ..QueueConfig::default()
    };
    let queue = queue_with(&store, cfg, primitive.clone());
    queue.enqueue(request("A"), "test").await.unwrap();
    queue.enqueue(request("B"), "test").await.unwrap();

    let cancel = CancellationToken::new();
    let worker = queue.spawn_worker(cancel.clone());
    wait_empty(&queue, Duration::from_secs(5)).await;
    cancel.cancel();
    worker.await.unwrap();

    let calls = primitive.calls();
    let order: Vec<&str> = calls.iter().map(|c| c.youtube_id.as_str()).collect();
    assert_eq!(order, ["A", "B"]);
    assert!(calls[0].ended <= calls[1].started, "A finished before B began");
    assert!(calls[1].started - calls[0].ended >= Duration::from_millis(80));

    assert_eq!(queue.status_of("A:movie:603"), None);
    assert!(queue.snapshot().is_empty());
}

#[tokio::test]
async fn rate_limit_pauses_the_whole_queue() {
    let store = Store::open_memory().await.unwrap();
    let primitive =
        Arc::new(RecordingPrimitive::new(Duration::from_millis(5)).rate_limit_first_attempt("A"));
    let cfg = QueueConfig {
        poll_interval_ms: 10,
        grace_delay_ms: 0,
        rate_limit_pause_secs: 1,
        rate_limit_log_secs: 1,
    };
    let queue = queue_with(&store, cfg, primitive.clone());
    queue.enqueue(request("A"), "test").await.unwrap();
    queue.enqueue(request("B"), "test").await.unwrap();

    let cancel = CancellationToken::new();
    let worker = queue.spawn_worker(cancel.clone());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(primitive.calls_for("B").is_empty(), "B must wait out the pause");
    assert_eq!(queue.status_of("A:movie:603"), Some(DownloadStatus::Queued));

    wait_empty(&queue, Duration::from_secs(5)).await;
    cancel.cancel();
    worker.await.unwrap();

    let a = primitive.calls_for("A");
    let b = primitive.calls_for("B");
    assert_eq!(a.len(), 2, "A retried after the pause");
    assert_eq!(b.len(), 1);
    assert!(a[1].started - a[0].ended >= Duration::from_secs(1));
    assert!(b[0].started >= a[1].ended);
}

#[tokio::test]
async fn items_enqueued_during_pause_wait_their_turn() {
    let store = Store::open_memory().await.unwrap();
    let primitive =
        Arc::new(RecordingPrimitive::new(Duration::from_millis(5)).rate_limit_first_attempt("A"));
    let cfg = QueueConfig {
        poll_interval_ms: 10,
        grace_delay_ms: 0,
        rate_limit_pause_secs: 1,
        rate_limit_log_secs: 1,
    };
    let queue = queue_with(&store, cfg, primitive.clone());
    queue.enqueue(request("A"), "test").await.unwrap();
    queue.enqueue(request("B"), "test").await.unwrap();

    let cancel = CancellationToken::new();
    let worker = queue.spawn_worker(cancel.clone());

    // Wait until A has been rate limited, then add C inside the pause window.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while primitive.calls_for("A").is_empty() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    queue.enqueue(request("C"), "test").await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(primitive.calls_for("C").is_empty(), "C must wait out the pause");
    assert_eq!(queue.status_of("C:movie:603"), Some(DownloadStatus::Queued));
    assert_eq!(primitive.calls().len(), 1);

    wait_empty(&queue, Duration::from_secs(5)).await;
    cancel.cancel();
    worker.await.unwrap();

    let calls = primitive.calls();
    let order: Vec<&str> = calls.iter().map(|c| c.youtube_id.as_str()).collect();
    assert_eq!(order, ["A", "A", "B", "C"]);
    assert!(calls[1].started - calls[0].ended >= Duration::from_secs(1));
}

#[tokio::test]
async fn queue_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.db");
    let primitive = Arc::new(RecordingPrimitive::new(Duration::ZERO));
    {
        let store = Store::open_at(&path).await.unwrap();
        let queue = queue_with(&store, QueueConfig::default(), primitive.clone());
        queue.enqueue(request("A"), "test").await.unwrap();
        queue.mark_rejected("R", MediaType::Movie, 603).await.unwrap();
    }

    let store = Store::open_at(&path).await.unwrap();
    let queue = queue_with(&store, QueueConfig::default(), primitive);
    let items = queue.items().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].youtube_id, "A");
    assert_eq!(items[0].status, DownloadStatus::Queued);
    assert!(queue.is_rejected("R", MediaType::Movie, 603).await.unwrap());

    assert_eq!(queue.status_of("A:movie:603"), None);
    queue.load_cache().await.unwrap();
    assert_eq!(queue.status_of("A:movie:603"), Some(DownloadStatus::Queued));
}

#[tokio::test]
async fn extras_search_feeds_the_worker_after_syncs() {
    let store = Store::open_memory().await.unwrap();
    let mut cfg = ExtrarrConfig::default();
    cfg.queue.poll_interval_ms = 10;
    cfg.queue.grace_delay_ms = 0;
    cfg.scheduler.dependency_poll_ms = 10;
    cfg.scheduler.drain_poll_ms = 10;

    let source = Arc::new(StoreExtrasSource::new(store.clone()));
    source
        .put(&WantedMedia {
            media_type: MediaType::Movie,
            media_id: 603,
            title: Some("The Matrix".into()),
            extras: vec![
                ExtraCandidate {
                    extra_type: "Trailers".into(),
                    extra_title: "Official Trailer".into(),
                    youtube_id: "m8e-FF8MsqU".into(),
                },
                ExtraCandidate {
                    extra_type: "Featurettes".into(),
                    extra_title: "Making Of".into(),
                    youtube_id: "rejected-one".into(),
                },
            ],
        })
        .await
        .unwrap();

    let primitive = Arc::new(RecordingPrimitive::new(Duration::ZERO));
    let queue = queue_with(&store, cfg.queue.clone(), primitive.clone());
    queue
        .mark_rejected("rejected-one", MediaType::Movie, 603)
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let (specs, rule) = default_tasks(&cfg, Arc::clone(&queue), source);
    let scheduler = Scheduler::load(
        store.clone(),
        cfg.scheduler.clone(),
        specs,
        Some(rule),
        Arc::new(Broadcaster::new("tasks", 64)),
        cancel.clone(),
    )
    .await
    .unwrap();
    let mut workers = scheduler.start();
    workers.push(queue.spawn_worker(cancel.clone()));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while primitive.calls().is_empty() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    wait_empty(&queue, Duration::from_secs(5)).await;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let done = scheduler
            .history()
            .await
            .unwrap()
            .iter()
            .any(|r| r.task_id == EXTRAS_SEARCH && r.status == RunStatus::Success);
        if done || tokio::time::Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cancel.cancel();
    for w in workers {
        w.await.unwrap();
    }

    let ids: Vec<String> = primitive.calls().into_iter().map(|c| c.youtube_id).collect();
    assert_eq!(ids, ["m8e-FF8MsqU"]);

    let history = scheduler.history().await.unwrap();
    let extras: Vec<_> = history.iter().filter(|r| r.task_id == EXTRAS_SEARCH).collect();
    assert_eq!(extras.len(), 1);
    assert_eq!(extras[0].status, RunStatus::Success);
    assert!(scheduler.state(EXTRAS_SEARCH).unwrap().last_execution.is_some());
}
