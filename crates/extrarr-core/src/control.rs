//! Control protocol shared by `extrarr serve` and the CLI client.
//!
//! One command per line:
//! - `enqueue <source> <json request>` answers `accepted`
//! - `force <task-id>` answers `started`, `already-running` or `error ...`
//! - `watch downloads|tasks` streams one JSON snapshot per line

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::queue::DownloadRequest;

/// Which live feed a `watch` follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Downloads,
    Tasks,
}

impl Feed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feed::Downloads => "downloads",
            Feed::Tasks => "tasks",
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feed {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "downloads" => Ok(Feed::Downloads),
            "tasks" => Ok(Feed::Tasks),
            other => Err(ControlError::UnknownFeed(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    Enqueue {
        source: String,
        request: DownloadRequest,
    },
    Force {
        task_id: String,
    },
    Watch(Feed),
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing argument for {0}")]
    MissingArgument(&'static str),
    #[error("unknown feed: {0}")]
    UnknownFeed(String),
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] serde_json::Error),
}

pub const ACCEPTED: &str = "accepted";
pub const STARTED: &str = "started";
pub const ALREADY_RUNNING: &str = "already-running";

impl ControlRequest {
    pub fn parse(line: &str) -> Result<Self, ControlError> {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((c, r)) => (c, r.trim()),
            None => (line, ""),
        };
        match command {
            "" => Err(ControlError::Empty),
            "enqueue" => {
                let (source, json) = rest
                    .split_once(char::is_whitespace)
                    .ok_or(ControlError::MissingArgument("enqueue"))?;
                Ok(ControlRequest::Enqueue {
                    source: source.to_string(),
                    request: serde_json::from_str(json.trim())?,
                })
            }
            "force" if !rest.is_empty() => Ok(ControlRequest::Force {
                task_id: rest.to_string(),
            }),
            "force" => Err(ControlError::MissingArgument("force")),
            "watch" if !rest.is_empty() => Ok(ControlRequest::Watch(rest.parse()?)),
            "watch" => Err(ControlError::MissingArgument("watch")),
            other => Err(ControlError::UnknownCommand(other.to_string())),
        }
    }

    /// The line a client sends for this request (without the newline).
    pub fn to_line(&self) -> Result<String, ControlError> {
        Ok(match self {
            ControlRequest::Enqueue { source, request } => {
                format!("enqueue {} {}", source, serde_json::to_string(request)?)
            }
            ControlRequest::Force { task_id } => format!("force {task_id}"),
            ControlRequest::Watch(feed) => format!("watch {feed}"),
        })
    }
}

/// Path of the control socket for a running `extrarr serve`.
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    xdg::BaseDirectories::with_prefix("extrarr")?.place_state_file("control.sock")
}
