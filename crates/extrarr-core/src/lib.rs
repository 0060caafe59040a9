pub mod broadcast;
pub mod config;
pub mod control;
pub mod logging;
pub mod queue;
pub mod store;
pub mod tasks;

mod util;
