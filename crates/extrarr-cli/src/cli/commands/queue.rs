//! `extrarr queue` – show the persisted download queue.

use anyhow::Result;
use extrarr_core::config::ExtrarrConfig;
use extrarr_core::store::Store;

use super::offline_queue;

pub async fn run_queue(cfg: &ExtrarrConfig, store: Store) -> Result<()> {
    let items = offline_queue(cfg, store).items().await?;
    if items.is_empty() {
        println!("Download queue is empty.");
        return Ok(());
    }
    println!(
        "{:<12} {:<14} {:<6} {:<10} {}",
        "STATUS", "YOUTUBE ID", "TYPE", "MEDIA ID", "EXTRA"
    );
    for i in items {
        println!(
            "{:<12} {:<14} {:<6} {:<10} {} / {}",
            i.status.as_str(),
            i.youtube_id,
            i.media_type,
            i.media_id,
            i.extra_type,
            i.extra_title
        );
    }
    Ok(())
}
