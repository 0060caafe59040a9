//! Small async helpers shared by the worker loops.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleep for `d` unless `cancel` fires first. Returns true if cancelled.
pub(crate) async fn sleep_or_cancel(d: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(d) => false,
    }
}
