//! CLI command handlers, one file per command.

mod enqueue;
mod force;
mod history;
mod queue;
mod reject;
mod serve;
mod watch;

pub use enqueue::{run_enqueue, EnqueueArgs};
pub use force::run_force;
pub use history::run_history;
pub use queue::run_queue;
pub use reject::run_reject;
pub use serve::run_serve;
pub use watch::run_watch;

use extrarr_core::broadcast::Broadcaster;
use extrarr_core::config::ExtrarrConfig;
use extrarr_core::queue::{CommandDownloader, DownloadQueue, StoreTitles};
use extrarr_core::store::Store;
use std::sync::Arc;

/// Queue handle over the persisted queue, for commands that read or write it
/// without running the worker.
fn offline_queue(cfg: &ExtrarrConfig, store: Store) -> Arc<DownloadQueue> {
    DownloadQueue::new(
        store.clone(),
        cfg.queue.clone(),
        Arc::new(CommandDownloader::new(cfg.downloader.clone())),
        Arc::new(StoreTitles::new(store)),
        Arc::new(Broadcaster::new("downloads", cfg.subscriber_buffer)),
    )
}
