//! `extrarr watch downloads|tasks` – print live snapshots, one JSON line each.

use anyhow::{anyhow, Result};
use extrarr_core::control::Feed;

use crate::cli::control_socket;

pub async fn run_watch(feed: Feed) -> Result<()> {
    let path = control_socket::live_socket_path()
        .ok_or_else(|| anyhow!("extrarr serve is not running"))?;
    tokio::select! {
        res = control_socket::watch(&path, feed, |line| println!("{line}")) => res,
        _ = tokio::signal::ctrl_c() => Ok(()),
    }
}
