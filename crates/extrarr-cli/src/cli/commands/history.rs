//! `extrarr history` – show recent task runs.

use anyhow::Result;
use extrarr_core::config::ExtrarrConfig;
use extrarr_core::store::Store;
use extrarr_core::tasks::RunHistory;

pub async fn run_history(cfg: &ExtrarrConfig, store: Store, limit: Option<usize>) -> Result<()> {
    let records = RunHistory::new(store, cfg.scheduler.history_cap).list().await?;
    if records.is_empty() {
        println!("No task runs recorded.");
        return Ok(());
    }
    let skip = limit.map_or(0, |n| records.len().saturating_sub(n));
    println!(
        "{:<16} {:<8} {:<26} {:>10}  {}",
        "TASK", "STATUS", "STARTED", "DURATION", "ERROR"
    );
    for r in records.into_iter().skip(skip) {
        let duration = r
            .duration_ms
            .map(|ms| format!("{ms}ms"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<16} {:<8} {:<26} {:>10}  {}",
            r.task_id,
            format!("{:?}", r.status).to_lowercase(),
            r.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            duration,
            r.error.unwrap_or_default()
        );
    }
    Ok(())
}
