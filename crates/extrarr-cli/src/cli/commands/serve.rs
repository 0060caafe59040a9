//! `extrarr serve` – run the download worker, the scheduler and the control socket.

use anyhow::{Context, Result};
use extrarr_core::broadcast::Broadcaster;
use extrarr_core::config::ExtrarrConfig;
use extrarr_core::control::default_control_socket_path;
use extrarr_core::queue::{CommandDownloader, DownloadQueue, DownloadStatus, StoreTitles};
use extrarr_core::store::Store;
use extrarr_core::tasks::{default_tasks, Scheduler, StoreExtrasSource};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cli::control_socket::{self, ControlServices};

/// How long shutdown waits for cancelled task bodies to record their outcome.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub async fn run_serve(cfg: &ExtrarrConfig, store: Store) -> Result<()> {
    let cancel = CancellationToken::new();

    let queue = DownloadQueue::new(
        store.clone(),
        cfg.queue.clone(),
        Arc::new(CommandDownloader::new(cfg.downloader.clone())),
        Arc::new(StoreTitles::new(store.clone())),
        Arc::new(Broadcaster::new("downloads", cfg.subscriber_buffer)),
    );
    let cached = queue.load_cache().await?;
    tracing::debug!(cached, "download queue restored");
    let stuck = queue
        .snapshot()
        .iter()
        .filter(|i| i.status == DownloadStatus::Downloading)
        .count();
    if stuck > 0 {
        tracing::warn!(
            "{} queue item(s) were left downloading by a previous run and will not be retried",
            stuck
        );
    }

    let source = Arc::new(StoreExtrasSource::new(store.clone()));
    let (specs, rule) = default_tasks(cfg, Arc::clone(&queue), source);
    let scheduler = Scheduler::load(
        store,
        cfg.scheduler.clone(),
        specs,
        Some(rule),
        Arc::new(Broadcaster::new("tasks", cfg.subscriber_buffer)),
        cancel.clone(),
    )
    .await?;

    let mut workers = scheduler.start();
    workers.push(queue.spawn_worker(cancel.clone()));

    let socket_path = default_control_socket_path().context("control socket path")?;
    let services = Arc::new(ControlServices {
        queue: Arc::clone(&queue),
        scheduler: Arc::clone(&scheduler),
    });
    let listener = control_socket::spawn_control_listener(services, &socket_path, cancel.clone())?;
    println!("extrarr running, control socket at {}", socket_path.display());
    tracing::info!(tasks = scheduler.snapshot().len(), "engine started");

    tokio::signal::ctrl_c()
        .await
        .context("wait for shutdown signal")?;
    tracing::info!("shutdown requested");
    cancel.cancel();

    for worker in workers {
        let _ = worker.await;
    }
    if !scheduler.wait_idle(SHUTDOWN_GRACE).await {
        tracing::warn!("some task runs did not finish before shutdown");
    }
    let _ = listener.await;
    println!("extrarr stopped.");
    Ok(())
}
