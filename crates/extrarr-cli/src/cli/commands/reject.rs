//! `extrarr reject` – mark an extra as rejected.

use anyhow::Result;
use extrarr_core::config::ExtrarrConfig;
use extrarr_core::queue::MediaType;
use extrarr_core::store::Store;

use super::offline_queue;

pub async fn run_reject(
    cfg: &ExtrarrConfig,
    store: Store,
    youtube_id: &str,
    media_type: MediaType,
    media_id: i64,
) -> Result<()> {
    offline_queue(cfg, store)
        .mark_rejected(youtube_id, media_type, media_id)
        .await?;
    println!("Rejected {youtube_id} for {media_type} {media_id}");
    Ok(())
}
