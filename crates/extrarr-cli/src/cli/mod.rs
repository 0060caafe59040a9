//! CLI for the extrarr background engine.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand};
use extrarr_core::config;
use extrarr_core::control::Feed;
use extrarr_core::logging::LogTarget;
use extrarr_core::queue::MediaType;
use extrarr_core::store::Store;

use commands::{
    run_enqueue, run_force, run_history, run_queue, run_reject, run_serve, run_watch,
    EnqueueArgs,
};

/// Top-level CLI for extrarr.
#[derive(Debug, Parser)]
#[command(name = "extrarr")]
#[command(about = "extrarr: download queue and task scheduler for media extras", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the download worker, the task scheduler and the control socket.
    Serve,

    /// Queue one extra for download.
    Enqueue {
        /// YouTube video id of the extra.
        youtube_id: String,
        /// movie or tv.
        #[arg(long, value_name = "TYPE")]
        media_type: MediaType,
        /// Library id of the media item.
        #[arg(long, value_name = "ID")]
        media_id: i64,
        /// Extra category, e.g. Trailers or Featurettes.
        #[arg(long, default_value = "Trailers")]
        extra_type: String,
        /// Title used for the downloaded file.
        #[arg(long)]
        extra_title: String,
        /// Media title; looked up from the store when omitted.
        #[arg(long)]
        title: Option<String>,
        /// Label recorded in the log for this request.
        #[arg(long, default_value = "cli")]
        source: String,
    },

    /// Run a scheduled task now (requires `extrarr serve`).
    Force {
        /// Task id, e.g. radarr_sync or extras_search.
        task_id: String,
    },

    /// Stream live status snapshots (requires `extrarr serve`).
    Watch {
        /// downloads or tasks.
        feed: Feed,
    },

    /// Show the persisted download queue.
    Queue,

    /// Show the task run history, newest last.
    History {
        /// Only show the last N runs.
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Mark an extra as rejected so it is never downloaded.
    Reject {
        /// YouTube video id of the extra.
        youtube_id: String,
        #[arg(long, value_name = "TYPE")]
        media_type: MediaType,
        #[arg(long, value_name = "ID")]
        media_id: i64,
    },
}

impl CliCommand {
    /// `serve` keeps a log file; everything else is short-lived and logs to stderr.
    pub fn log_target(&self) -> LogTarget {
        match self {
            CliCommand::Serve => LogTarget::File,
            _ => LogTarget::Stderr,
        }
    }

    pub async fn run(self) -> Result<()> {
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match self {
            CliCommand::Serve => {
                let store = Store::open_default().await?;
                run_serve(&cfg, store).await?;
            }
            CliCommand::Enqueue {
                youtube_id,
                media_type,
                media_id,
                extra_type,
                extra_title,
                title,
                source,
            } => {
                let args = EnqueueArgs {
                    youtube_id,
                    media_type,
                    media_id,
                    extra_type,
                    extra_title,
                    title,
                    source,
                };
                run_enqueue(&cfg, args).await?;
            }
            CliCommand::Force { task_id } => run_force(&task_id).await?,
            CliCommand::Watch { feed } => run_watch(feed).await?,
            CliCommand::Queue => {
                let store = Store::open_default().await?;
                run_queue(&cfg, store).await?;
            }
            CliCommand::History { limit } => {
                let store = Store::open_default().await?;
                run_history(&cfg, store, limit).await?;
            }
            CliCommand::Reject {
                youtube_id,
                media_type,
                media_id,
            } => {
                let store = Store::open_default().await?;
                run_reject(&cfg, store, &youtube_id, media_type, media_id).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
