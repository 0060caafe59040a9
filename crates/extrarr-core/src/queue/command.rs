//! Download primitive that shells out to an external downloader (yt-dlp by default).

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;

use crate::config::DownloaderConfig;

use super::primitive::{DownloadError, DownloadPrimitive};
use super::types::{DownloadOutcome, DownloadRequest, DownloadStatus};

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Runs `<command> <args..> -o <template> <url>` once per request.
///
/// Exit 0 means `downloaded`, or `exists` when the tool reports the file was
/// already there. A non-zero exit whose output mentions HTTP 429 or rate
/// limiting becomes [`DownloadError::RateLimited`]; anything else is a
/// failure carrying the last line of stderr.
#[derive(Debug, Clone)]
pub struct CommandDownloader {
    cfg: DownloaderConfig,
}

impl CommandDownloader {
    pub fn new(cfg: DownloaderConfig) -> Self {
        Self { cfg }
    }

    fn output_template(&self, req: &DownloadRequest) -> PathBuf {
        let root = self
            .cfg
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let media_dir = match &req.media_title {
            Some(title) => sanitize_segment(title),
            None => req.media_id.to_string(),
        };
        root.join(req.media_type.as_str())
            .join(media_dir)
            .join(sanitize_segment(&req.extra_type))
            .join(format!("{}.%(ext)s", sanitize_segment(&req.extra_title)))
    }
}

#[async_trait]
impl DownloadPrimitive for CommandDownloader {
    async fn download(&self, req: &DownloadRequest) -> Result<DownloadOutcome, DownloadError> {
        let template = self.output_template(req);
        let url = format!("{WATCH_URL}{}", req.youtube_id);
        tracing::debug!(command = %self.cfg.command, %url, "running download command");

        let output = Command::new(&self.cfg.command)
            .args(&self.cfg.args)
            .arg("-o")
            .arg(&template)
            .arg(&url)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DownloadError::Failed(format!("spawn {}: {}", self.cfg.command, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        classify_output(output.status.success(), output.status.code(), &stdout, &stderr)
    }
}

/// Map the downloader's exit status and output to an outcome.
pub(crate) fn classify_output(
    success: bool,
    code: Option<i32>,
    stdout: &str,
    stderr: &str,
) -> Result<DownloadOutcome, DownloadError> {
    if success {
        if stdout.contains("has already been downloaded") {
            return Ok(DownloadOutcome::new(DownloadStatus::Exists, "already on disk"));
        }
        return Ok(DownloadOutcome::new(DownloadStatus::Downloaded, ""));
    }

    let last_line = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| match code {
            Some(c) => format!("download command exited with status {c}"),
            None => "download command terminated by signal".to_string(),
        });

    let lower = stderr.to_ascii_lowercase();
    if lower.contains("http error 429")
        || lower.contains("too many requests")
        || lower.contains("rate-limit")
        || lower.contains("rate limit")
    {
        return Err(DownloadError::RateLimited(last_line));
    }
    Err(DownloadError::Failed(last_line))
}

/// Make a string safe as one path segment: separators and control characters
/// become `_`, surrounding dots and whitespace are trimmed.
fn sanitize_segment(s: &str) -> String {
    let replaced: String = s
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c == '\0' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MediaType;

    fn request() -> DownloadRequest {
        DownloadRequest {
            media_type: MediaType::Movie,
            media_id: 7,
            media_title: Some("Alien: Director's Cut".into()),
            extra_type: "Trailers".into(),
            extra_title: "Teaser / 1979".into(),
            youtube_id: "xyz".into(),
        }
    }

    #[test]
    fn success_is_downloaded() {
        let out = classify_output(true, Some(0), "[download] 100%", "").unwrap();
        assert_eq!(out.status, DownloadStatus::Downloaded);
    }

    #[test]
    fn already_downloaded_is_exists() {
        let out = classify_output(
            true,
            Some(0),
            "[download] Teaser.mkv has already been downloaded",
            "",
        )
        .unwrap();
        assert_eq!(out.status, DownloadStatus::Exists);
    }

    #[test]
    fn http_429_is_rate_limited() {
        let err = classify_output(
            false,
            Some(1),
            "",
            "WARNING: retrying\nERROR: unable to download webpage: HTTP Error 429: Too Many Requests\n",
        )
        .unwrap_err();
        match err {
            DownloadError::RateLimited(msg) => assert!(msg.contains("429")),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn other_failure_keeps_last_stderr_line() {
        let err = classify_output(false, Some(1), "", "ERROR: Video unavailable\n\n").unwrap_err();
        match err {
            DownloadError::Failed(msg) => assert_eq!(msg, "ERROR: Video unavailable"),
            other => panic!("expected Failed, got {other:?}"),
        }
        let err = classify_output(false, Some(2), "", "").unwrap_err();
        assert_eq!(err.to_string(), "download command exited with status 2");
    }

    #[test]
    fn template_layout_is_sanitized() {
        let d = CommandDownloader::new(DownloaderConfig {
            output_dir: Some(PathBuf::from("/srv/extras")),
            ..DownloaderConfig::default()
        });
        assert_eq!(
            d.output_template(&request()),
            PathBuf::from("/srv/extras/movie/Alien: Director's Cut/Trailers/Teaser _ 1979.%(ext)s")
        );
    }

    #[tokio::test]
    async fn missing_binary_is_failure() {
        let d = CommandDownloader::new(DownloaderConfig {
            command: "/nonexistent/extrarr-test-downloader".into(),
            ..DownloaderConfig::default()
        });
        match d.download(&request()).await {
            Err(DownloadError::Failed(msg)) => assert!(msg.starts_with("spawn ")),
            other => panic!("expected spawn failure, got {other:?}"),
        }
    }
}
