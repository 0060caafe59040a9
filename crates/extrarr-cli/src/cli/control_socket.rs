//! Control socket: server (during `extrarr serve`) and client (for `enqueue`,
//! `force` and `watch`). Protocol lives in `extrarr_core::control`.

use anyhow::{anyhow, bail, Context, Result};
use extrarr_core::broadcast::Subscription;
use extrarr_core::control::{
    ControlRequest, Feed, ACCEPTED, ALREADY_RUNNING, STARTED,
};
use extrarr_core::queue::DownloadQueue;
use extrarr_core::tasks::{ForceRun, Scheduler};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

/// What the control socket can reach inside a running engine.
pub struct ControlServices {
    pub queue: Arc<DownloadQueue>,
    pub scheduler: Arc<Scheduler>,
}

impl ControlServices {
    /// Answer a one-shot request with a single reply line.
    async fn reply(&self, request: ControlRequest) -> String {
        match request {
            ControlRequest::Enqueue { source, request } => {
                match self.queue.enqueue(request, &source).await {
                    Ok(_) => ACCEPTED.to_string(),
                    Err(e) => format!("error {:#}", e),
                }
            }
            ControlRequest::Force { task_id } => match self.scheduler.force_run(&task_id) {
                Ok(ForceRun::Started) => STARTED.to_string(),
                Ok(ForceRun::AlreadyRunning) => ALREADY_RUNNING.to_string(),
                Err(e) => format!("error {}", e),
            },
            ControlRequest::Watch(_) => "error watch takes over the connection".to_string(),
        }
    }

    fn subscribe(&self, feed: Feed) -> Subscription {
        match feed {
            Feed::Downloads => self.queue.subscribe(),
            Feed::Tasks => self.scheduler.subscribe(),
        }
    }

    fn unsubscribe(&self, feed: Feed, sub: &Subscription) {
        match feed {
            Feed::Downloads => self.queue.feed().unsubscribe(sub.id),
            Feed::Tasks => self.scheduler.feed().unsubscribe(sub.id),
        }
    }
}

/// Bind `path` and serve connections until `cancel` fires. A stale socket
/// file from an earlier run is replaced.
pub fn spawn_control_listener(
    services: Arc<ControlServices>,
    path: impl AsRef<Path>,
    cancel: CancellationToken,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("bind control socket {}", path.display()))?;
    tracing::debug!(path = %path.display(), "control socket listening");

    let handle = tokio::spawn(async move {
        loop {
            let accepted = tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, _)) => {
                    let services = Arc::clone(&services);
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(services, stream, cancel).await {
                            tracing::debug!("control connection: {:#}", e);
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
        let _ = std::fs::remove_file(&path);
    });
    Ok(handle)
}

async fn serve_connection(
    services: Arc<ControlServices>,
    stream: UnixStream,
    cancel: CancellationToken,
) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request = match ControlRequest::parse(&line) {
            Ok(r) => r,
            Err(e) => {
                write_line(&mut write, &format!("error {}", e)).await?;
                continue;
            }
        };
        if let ControlRequest::Watch(feed) = request {
            let mut sub = services.subscribe(feed);
            tracing::debug!(feed = %feed, subscriber = sub.id, "watch started");
            let result = forward(&mut sub, &mut write, &cancel).await;
            services.unsubscribe(feed, &sub);
            return result;
        }
        let reply = services.reply(request).await;
        write_line(&mut write, &reply).await?;
    }
    Ok(())
}

/// Copy snapshots to the peer until it hangs up or the engine stops.
async fn forward<W: AsyncWrite + Unpin>(
    sub: &mut Subscription,
    write: &mut W,
    cancel: &CancellationToken,
) -> Result<()> {
    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            msg = sub.rx.recv() => msg,
        };
        match msg {
            Some(snapshot) => write_line(write, &snapshot).await?,
            None => return Ok(()),
        }
    }
}

async fn write_line<W: AsyncWrite + Unpin>(write: &mut W, line: &str) -> Result<()> {
    write.write_all(line.as_bytes()).await?;
    write.write_all(b"\n").await?;
    write.flush().await?;
    Ok(())
}

/// Path of the running engine's socket, if it looks like one is up.
pub fn live_socket_path() -> Option<PathBuf> {
    extrarr_core::control::default_control_socket_path()
        .ok()
        .filter(|p| p.exists())
}

/// Send one request and return the reply line.
pub async fn send_request(socket_path: &Path, request: &ControlRequest) -> Result<String> {
    let mut stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("connect {}", socket_path.display()))?;
    let line = request.to_line()?;
    write_line(&mut stream, &line).await?;
    let mut lines = BufReader::new(stream).lines();
    lines
        .next_line()
        .await?
        .ok_or_else(|| anyhow!("control socket closed without a reply"))
}

/// Send a `watch` request and hand every snapshot line to `on_line` until
/// the server hangs up.
pub async fn watch(socket_path: &Path, feed: Feed, mut on_line: impl FnMut(&str)) -> Result<()> {
    let mut stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("connect {}", socket_path.display()))?;
    write_line(&mut stream, &ControlRequest::Watch(feed).to_line()?).await?;
    let mut lines = BufReader::new(stream).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(err) = line.strip_prefix("error ") {
            bail!("{}", err);
        }
        on_line(&line);
    }
    Ok(())
}
