use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Download worker timing (`[queue]` in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Sleep between scans when nothing is queued.
    pub poll_interval_ms: u64,
    /// Delay after a terminal status before the item leaves the queue,
    /// so subscribers get to see the final state.
    pub grace_delay_ms: u64,
    /// Global pause after the download command reports a rate limit.
    pub rate_limit_pause_secs: u64,
    /// How often the remaining pause time is logged.
    pub rate_limit_log_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            grace_delay_ms: 10_000,
            rate_limit_pause_secs: 3_600,
            rate_limit_log_secs: 300,
        }
    }
}

impl QueueConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn grace_delay(&self) -> Duration {
        Duration::from_millis(self.grace_delay_ms)
    }

    pub fn rate_limit_pause(&self) -> Duration {
        Duration::from_secs(self.rate_limit_pause_secs)
    }

    pub fn rate_limit_log_every(&self) -> Duration {
        Duration::from_secs(self.rate_limit_log_secs.max(1))
    }
}

/// Task scheduler settings (`[scheduler]` in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum run-history records kept; older ones are evicted.
    pub history_cap: usize,
    /// Poll interval while the extras search waits for both syncs to have run.
    pub dependency_poll_ms: u64,
    /// Poll interval while the extras search waits for the queue to drain.
    pub drain_poll_ms: u64,
    pub radarr_sync_interval_mins: u64,
    pub sonarr_sync_interval_mins: u64,
    pub extras_search_interval_mins: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            history_cap: 1_000,
            dependency_poll_ms: 5_000,
            drain_poll_ms: 5_000,
            radarr_sync_interval_mins: 15,
            sonarr_sync_interval_mins: 15,
            extras_search_interval_mins: 360,
        }
    }
}

impl SchedulerConfig {
    pub fn dependency_poll(&self) -> Duration {
        Duration::from_millis(self.dependency_poll_ms)
    }

    pub fn drain_poll(&self) -> Duration {
        Duration::from_millis(self.drain_poll_ms)
    }
}

/// External download command (`[downloader]` in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Program to run, e.g. `yt-dlp`.
    pub command: String,
    /// Extra arguments placed before the video URL.
    pub args: Vec<String>,
    /// Root directory for downloaded extras. None = current directory.
    pub output_dir: Option<PathBuf>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            command: "yt-dlp".to_string(),
            args: vec!["--no-playlist".to_string()],
            output_dir: None,
        }
    }
}

/// Commands run by the two sync tasks (`[sync]` in config.toml).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub radarr_command: Option<String>,
    #[serde(default)]
    pub sonarr_command: Option<String>,
}

/// Global configuration loaded from `~/.config/extrarr/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtrarrConfig {
    /// Per-subscriber outbox capacity for the live status feed.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub downloader: DownloaderConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

fn default_subscriber_buffer() -> usize {
    64
}

impl Default for ExtrarrConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: default_subscriber_buffer(),
            queue: QueueConfig::default(),
            scheduler: SchedulerConfig::default(),
            downloader: DownloaderConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("extrarr")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ExtrarrConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ExtrarrConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: ExtrarrConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ExtrarrConfig::default();
        assert_eq!(cfg.subscriber_buffer, 64);
        assert_eq!(cfg.queue.poll_interval(), Duration::from_secs(1));
        assert_eq!(cfg.queue.grace_delay(), Duration::from_secs(10));
        assert_eq!(cfg.queue.rate_limit_pause(), Duration::from_secs(3_600));
        assert_eq!(cfg.scheduler.history_cap, 1_000);
        assert_eq!(cfg.downloader.command, "yt-dlp");
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = ExtrarrConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ExtrarrConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.queue.grace_delay_ms, cfg.queue.grace_delay_ms);
        assert_eq!(parsed.scheduler.history_cap, cfg.scheduler.history_cap);
        assert_eq!(parsed.downloader.args, cfg.downloader.args);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg: ExtrarrConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.subscriber_buffer, 64);
        assert_eq!(cfg.queue.rate_limit_log_secs, 300);
        assert!(cfg.sync.radarr_command.is_none());
    }

    #[test]
    fn config_toml_partial_sections() {
        let toml = r#"
            subscriber_buffer = 8

            [queue]
            rate_limit_pause_secs = 60

            [scheduler]
            extras_search_interval_mins = 30

            [downloader]
            command = "/usr/local/bin/yt-dlp"
            output_dir = "/srv/extras"

            [sync]
            radarr_command = "extrarr-sync radarr"
        "#;
        let cfg: ExtrarrConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.subscriber_buffer, 8);
        assert_eq!(cfg.queue.rate_limit_pause(), Duration::from_secs(60));
        assert_eq!(cfg.queue.poll_interval_ms, 1_000);
        assert_eq!(cfg.scheduler.extras_search_interval_mins, 30);
        assert_eq!(cfg.scheduler.radarr_sync_interval_mins, 15);
        assert_eq!(cfg.downloader.command, "/usr/local/bin/yt-dlp");
        assert_eq!(cfg.downloader.args, ["--no-playlist"]);
        assert_eq!(
            cfg.downloader.output_dir.as_deref(),
            Some(std::path::Path::new("/srv/extras"))
        );
        assert_eq!(cfg.sync.radarr_command.as_deref(), Some("extrarr-sync radarr"));
        assert!(cfg.sync.sonarr_command.is_none());
    }
}
