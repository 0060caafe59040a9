//! Tracing setup: `serve` logs to a file under the XDG state dir, one-shot
//! commands log to stderr. File setup failures fall back to stderr.

use anyhow::Result;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,extrarr=debug,extrarr_core=debug";

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// `~/.local/state/extrarr/extrarr.log`, for the long-running engine.
    File,
    /// Standard error, for short CLI invocations.
    Stderr,
}

/// Per-event writer: a handle on the shared log file, or stderr if cloning it failed.
enum LogSink {
    File(File),
    Stderr,
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogSink::File(f) => f.write(buf),
            LogSink::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogSink::File(f) => f.flush(),
            LogSink::Stderr => io::stderr().lock().flush(),
        }
    }
}

struct SharedLogFile(File);

impl<'a> MakeWriter<'a> for SharedLogFile {
    type Writer = LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(LogSink::File)
            .unwrap_or(LogSink::Stderr)
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("extrarr")?;
    Ok(xdg_dirs.get_state_home().join("extrarr.log"))
}

fn open_log_file() -> Result<(File, PathBuf)> {
    let path = log_file_path()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((file, path))
}

/// Install the global subscriber for `target`.
///
/// A `File` target that cannot be opened degrades to stderr and says so once
/// the subscriber is up.
pub fn init(target: LogTarget) {
    let (writer, opened) = match target {
        LogTarget::Stderr => (BoxMakeWriter::new(io::stderr), Ok(None)),
        LogTarget::File => match open_log_file() {
            Ok((file, path)) => (BoxMakeWriter::new(SharedLogFile(file)), Ok(Some(path))),
            Err(e) => (BoxMakeWriter::new(io::stderr), Err(e)),
        },
    };

    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    if installed.is_err() {
        // Already installed (tests, embedding); keep the existing one.
        return;
    }

    match opened {
        Ok(Some(path)) => tracing::info!("extrarr logging initialized at {}", path.display()),
        Ok(None) => {}
        Err(e) => tracing::warn!("log file unavailable ({:#}), logging to stderr", e),
    }
}
