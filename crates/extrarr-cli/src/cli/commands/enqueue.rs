//! `extrarr enqueue` – queue one extra. Goes through the running engine when
//! there is one, so its live feed sees the item; otherwise writes the store.

use anyhow::{bail, Result};
use extrarr_core::config::ExtrarrConfig;
use extrarr_core::control::{ControlRequest, ACCEPTED};
use extrarr_core::queue::{DownloadRequest, MediaType};
use extrarr_core::store::Store;

use super::offline_queue;
use crate::cli::control_socket;

#[derive(Debug, Clone)]
pub struct EnqueueArgs {
    pub youtube_id: String,
    pub media_type: MediaType,
    pub media_id: i64,
    pub extra_type: String,
    pub extra_title: String,
    pub title: Option<String>,
    pub source: String,
}

impl EnqueueArgs {
    pub fn into_request(self) -> (String, DownloadRequest) {
        let req = DownloadRequest {
            media_type: self.media_type,
            media_id: self.media_id,
            media_title: self.title,
            extra_type: self.extra_type,
            extra_title: self.extra_title,
            youtube_id: self.youtube_id,
        };
        (self.source, req)
    }
}

pub async fn run_enqueue(cfg: &ExtrarrConfig, args: EnqueueArgs) -> Result<()> {
    let (source, request) = args.into_request();
    let youtube_id = request.youtube_id.clone();

    if let Some(path) = control_socket::live_socket_path() {
        let msg = ControlRequest::Enqueue {
            source: source.clone(),
            request: request.clone(),
        };
        match control_socket::send_request(&path, &msg).await {
            Ok(reply) if reply == ACCEPTED => {
                println!("Queued {youtube_id}");
                return Ok(());
            }
            Ok(reply) => bail!("engine refused enqueue: {}", reply),
            Err(e) => tracing::debug!("engine not reachable, writing the store directly: {:#}", e),
        }
    }
    enqueue_offline(cfg, source, request).await
}

async fn enqueue_offline(cfg: &ExtrarrConfig, source: String, request: DownloadRequest) -> Result<()> {
    let store = Store::open_default().await?;
    let item = offline_queue(cfg, store).enqueue(request, &source).await?;
    println!("Queued {} (picked up when `extrarr serve` runs)", item.youtube_id);
    Ok(())
}
