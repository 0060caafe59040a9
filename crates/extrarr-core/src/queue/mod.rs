//! Download queue engine.
//!
//! Requests are appended to a persisted list in the store and serviced by a
//! single sequential worker: scan for the first `queued` item, mark it
//! `downloading` in its slot, run the download primitive, write the terminal
//! status back into the slot, wait a grace delay so subscribers see it, then
//! remove it by value. A rate-limit signal pauses the whole worker.
//!
//! Items found `downloading` at startup are left as they are.

mod command;
mod engine;
mod primitive;
mod types;
mod worker;

pub use command::CommandDownloader;
pub use engine::{DownloadQueue, QUEUE_KEY, REJECTED_KEY};
pub use primitive::{DownloadError, DownloadPrimitive, StoreTitles, TitleLookup};
pub use types::{DownloadOutcome, DownloadRequest, DownloadStatus, MediaType, QueueItem};
