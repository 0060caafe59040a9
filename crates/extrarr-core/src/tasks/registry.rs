//! The statically registered task set.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ExtrarrConfig;
use crate::queue::DownloadQueue;

use super::command::CommandTask;
use super::extras::{ExtrasSearch, ExtrasSource};
use super::scheduler::{OrderingRule, TaskSpec};

pub const RADARR_SYNC: &str = "radarr_sync";
pub const SONARR_SYNC: &str = "sonarr_sync";
pub const EXTRAS_SEARCH: &str = "extras_search";

fn minutes(m: u64) -> Duration {
    Duration::from_secs(m.max(1) * 60)
}

/// Build the three tasks and the rule that the extras search waits for both syncs.
pub fn default_tasks(
    cfg: &ExtrarrConfig,
    queue: Arc<DownloadQueue>,
    source: Arc<dyn ExtrasSource>,
) -> (Vec<TaskSpec>, OrderingRule) {
    let sched = &cfg.scheduler;
    let specs = vec![
        TaskSpec {
            id: RADARR_SYNC.to_string(),
            name: "Sync Radarr".to_string(),
            interval: minutes(sched.radarr_sync_interval_mins),
            order: 1,
            body: Arc::new(CommandTask::new(RADARR_SYNC, cfg.sync.radarr_command.clone())),
        },
        TaskSpec {
            id: SONARR_SYNC.to_string(),
            name: "Sync Sonarr".to_string(),
            interval: minutes(sched.sonarr_sync_interval_mins),
            order: 2,
            body: Arc::new(CommandTask::new(SONARR_SYNC, cfg.sync.sonarr_command.clone())),
        },
        TaskSpec {
            id: EXTRAS_SEARCH.to_string(),
            name: "Search for missing extras".to_string(),
            interval: minutes(sched.extras_search_interval_mins),
            order: 3,
            body: Arc::new(ExtrasSearch::new(source, queue, sched.drain_poll())),
        },
    ];
    let rule = OrderingRule {
        downstream: EXTRAS_SEARCH.to_string(),
        upstream: [RADARR_SYNC.to_string(), SONARR_SYNC.to_string()],
    };
    (specs, rule)
}
