//! Background task scheduler.
//!
//! Each registered task runs on its own fixed interval. The extras search is
//! gated on both catalog syncs having completed once. Every run updates the
//! live task states (persisted under `scheduler:tasks`) and appends to a
//! capped run history (`scheduler:history`).

mod command;
mod extras;
mod history;
mod registry;
mod scheduler;
mod state;
mod types;

pub use command::CommandTask;
pub use extras::{ExtraCandidate, ExtrasSearch, ExtrasSource, StoreExtrasSource, WantedMedia, WANTED_KEY};
pub use history::{RunHistory, HISTORY_KEY};
pub use registry::{default_tasks, EXTRAS_SEARCH, RADARR_SYNC, SONARR_SYNC};
pub use scheduler::{ForceRun, OrderingRule, Scheduler, SchedulerError, TaskBody, TaskSpec, TASKS_KEY};
pub use state::TaskStates;
pub use types::{RunStatus, TaskRunRecord, TaskState, TaskStatus};
