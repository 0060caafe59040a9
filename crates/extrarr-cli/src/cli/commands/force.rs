//! `extrarr force <task-id>` – ask the running engine to run a task now.

use anyhow::{anyhow, bail, Result};
use extrarr_core::control::{ControlRequest, ALREADY_RUNNING, STARTED};

use crate::cli::control_socket;

pub async fn run_force(task_id: &str) -> Result<()> {
    let path = control_socket::live_socket_path()
        .ok_or_else(|| anyhow!("extrarr serve is not running"))?;
    let reply = control_socket::send_request(
        &path,
        &ControlRequest::Force {
            task_id: task_id.to_string(),
        },
    )
    .await?;
    match reply.as_str() {
        STARTED => println!("Started {task_id}"),
        ALREADY_RUNNING => println!("{task_id} is already running"),
        other => bail!("{}", other.strip_prefix("error ").unwrap_or(other)),
    }
    Ok(())
}
